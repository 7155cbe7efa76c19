use crate::db::{get_db_pool, is_initialized};
use crate::orm::users;
use actix_session::Session;
use actix_web::dev::{
    self, Extensions, Payload, Service, ServiceRequest, ServiceResponse, Transform,
};
use actix_web::{web::Data, Error, FromRequest, HttpMessage, HttpRequest};
use futures::future::{ready, LocalBoxFuture, Ready};
use sea_orm::EntityTrait;
use std::rc::Rc;
use std::time::Instant;

/// Session key holding the signed-in user's id.
pub const SESSION_USER_KEY: &str = "user_id";
/// Session key set when Telegram's `initData` signature was checked at sign-in.
pub const SESSION_VERIFIED_KEY: &str = "verified";

/// Client data stored for a single request cycle.
/// Distinct from ClientCtx because it is defined through request data.
#[derive(Clone, Debug)]
pub struct ClientCtxInner {
    /// User data. None is a guest.
    pub client: Option<users::Model>,
    /// Whether the sign-in was signed by Telegram.
    pub verified: bool,
    /// Time the request started.
    pub request_start: Instant,
}

impl Default for ClientCtxInner {
    fn default() -> Self {
        Self {
            client: None,
            verified: false,
            request_start: Instant::now(),
        }
    }
}

impl ClientCtxInner {
    /// Resolves the session's user. Any failure degrades to a guest.
    pub async fn from_session(session: &Session) -> Self {
        let user_id = match session.get::<i32>(SESSION_USER_KEY) {
            Ok(Some(id)) => id,
            Ok(None) => return Self::default(),
            Err(e) => {
                log::warn!("Unreadable session, treating as guest: {}", e);
                return Self::default();
            }
        };

        if !is_initialized() {
            return Self::default();
        }

        let client = match users::Entity::find_by_id(user_id).one(get_db_pool()).await {
            Ok(Some(user)) => Some(user),
            Ok(None) => {
                session.remove(SESSION_USER_KEY);
                None
            }
            Err(e) => {
                log::error!("Failed to load user {} for session: {}", user_id, e);
                None
            }
        };

        let verified = client.is_some()
            && matches!(session.get::<bool>(SESSION_VERIFIED_KEY), Ok(Some(true)));

        ClientCtxInner {
            client,
            verified,
            ..Default::default()
        }
    }
}

/// Client context passed to routes.
/// Wraps ClientCtxInner, which is set at the beginning of the request.
#[derive(Clone, Debug)]
pub struct ClientCtx(Data<ClientCtxInner>);

impl Default for ClientCtx {
    fn default() -> Self {
        Self(Data::new(ClientCtxInner::default()))
    }
}

impl ClientCtx {
    pub fn get_or_default_from_extensions(extensions: &mut Extensions) -> Self {
        match extensions.get::<Data<ClientCtxInner>>() {
            Some(cbox) => Self(cbox.clone()),
            None => {
                let cbox = Data::new(ClientCtxInner::default());
                extensions.insert(cbox.clone());
                Self(cbox)
            }
        }
    }

    /// Returns either the user's id or None.
    pub fn get_id(&self) -> Option<i32> {
        self.0.client.as_ref().map(|u| u.id)
    }

    pub fn get_user(&self) -> Option<&users::Model> {
        self.0.client.as_ref()
    }

    pub fn is_user(&self) -> bool {
        self.0.client.is_some()
    }

    pub fn is_verified(&self) -> bool {
        self.0.verified
    }

    /// Listed in `telegram.admin_ids` and signed in with verified `initData`.
    pub fn is_admin(&self) -> bool {
        self.is_verified() && self.get_user().map(crate::identity::is_admin).unwrap_or(false)
    }

    pub fn request_start(&self) -> Instant {
        self.0.request_start
    }

    /// Require user to be logged in. Returns user_id or ErrorUnauthorized.
    pub fn require_login(&self) -> Result<i32, actix_web::Error> {
        self.get_id()
            .ok_or_else(|| actix_web::error::ErrorUnauthorized("Login required"))
    }

    /// Like `require_login`, returning the whole user row.
    pub fn require_user(&self) -> Result<&users::Model, actix_web::Error> {
        self.get_user()
            .ok_or_else(|| actix_web::error::ErrorUnauthorized("Login required"))
    }

    /// Require a verified session for a Telegram id listed in `telegram.admin_ids`.
    pub fn require_admin(&self) -> Result<&users::Model, actix_web::Error> {
        let user = self.require_user()?;
        if !self.is_verified() || !crate::identity::is_admin(user) {
            return Err(actix_web::error::ErrorForbidden("Admins only"));
        }
        Ok(user)
    }
}

/// This implementation is what actually provides the `client: ClientCtx` in the parameters of route functions.
impl FromRequest for ClientCtx {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(Ok(ClientCtx::get_or_default_from_extensions(
            &mut req.extensions_mut(),
        )))
    }
}

impl<S: 'static, B> Transform<S, ServiceRequest> for ClientCtx
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = ClientCtxMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ClientCtxMiddleware {
            service: Rc::new(service),
        }))
    }
}

/// Client context middleware
pub struct ClientCtxMiddleware<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for ClientCtxMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    dev::forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let svc = self.service.clone();

        // Borrows of `req` must be done in a precise way to avoid conflicts. This order is important.
        let (httpreq, payload) = req.into_parts();
        let session = Session::extract(&httpreq).into_inner();
        let req = ServiceRequest::from_parts(httpreq, payload);

        Box::pin(async move {
            match session {
                Ok(session) => {
                    let inner = ClientCtxInner::from_session(&session).await;
                    req.extensions_mut().insert(Data::new(inner));
                }
                Err(err) => {
                    log::error!("Unable to extract Session data in middleware: {}", err);
                }
            };

            svc.call(req).await
        })
    }
}
