//! JSON bodies for error responses.
//!
//! Responses a handler built on purpose (no attached error) pass through.

use actix_web::body::EitherBody;
use actix_web::dev::ServiceResponse;
use actix_web::middleware::ErrorHandlerResponse;
use actix_web::{HttpResponse, Result};
use serde::Serialize;

#[derive(Serialize)]
struct ErrorBody {
    status: u16,
    error: String,
}

pub fn render_400<B>(res: ServiceResponse<B>) -> Result<ErrorHandlerResponse<B>> {
    render_json(res, "Bad request", true)
}

pub fn render_404<B>(res: ServiceResponse<B>) -> Result<ErrorHandlerResponse<B>> {
    render_json(res, "Not found", true)
}

/// Internal errors never expose their message.
pub fn render_500<B>(res: ServiceResponse<B>) -> Result<ErrorHandlerResponse<B>> {
    if let Some(err) = res.response().error() {
        log::error!("{} {}: {}", res.request().method(), res.request().path(), err);
    }
    render_json(res, "Internal server error", false)
}

/// Any other status, keeping the handler's message.
pub fn render_error<B>(res: ServiceResponse<B>) -> Result<ErrorHandlerResponse<B>> {
    let fallback = res
        .status()
        .canonical_reason()
        .unwrap_or("Error")
        .to_owned();
    render_json(res, &fallback, true)
}

fn render_json<B>(
    res: ServiceResponse<B>,
    fallback: &str,
    expose_message: bool,
) -> Result<ErrorHandlerResponse<B>> {
    let message = match res.response().error() {
        Some(err) if expose_message => err.to_string(),
        Some(_) => fallback.to_owned(),
        None => {
            let res: ServiceResponse<EitherBody<B>> = res.map_into_left_body();
            return Ok(ErrorHandlerResponse::Response(res));
        }
    };

    let status = res.status();
    let (req, _) = res.into_parts();
    let response = HttpResponse::build(status).json(ErrorBody {
        status: status.as_u16(),
        error: message,
    });

    Ok(ErrorHandlerResponse::Response(
        ServiceResponse::new(req, response).map_into_right_body(),
    ))
}
