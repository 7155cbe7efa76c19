//! Pass-the-phone game sessions. Nothing here touches the database.

use crate::stranger::{GameError, GameRegistry, SessionId, StrangerGame};
use actix_web::{delete, error, get, post, web, Error, HttpResponse, Responder};
use serde::{Deserialize, Serialize};

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    // `players` before the generic action route.
    conf.service(create_game)
        .service(view_game)
        .service(set_players)
        .service(game_action)
        .service(delete_game);
}

fn game_error(e: GameError) -> Error {
    match e {
        GameError::SessionNotFound => error::ErrorNotFound(e.to_string()),
        GameError::InvalidPlayerCount { .. } => error::ErrorBadRequest(e.to_string()),
        GameError::InvalidTransition(_) => error::ErrorConflict(e.to_string()),
        GameError::NoTopics => {
            log::error!("Stranger game has no topics to draw from");
            error::ErrorInternalServerError(e.to_string())
        }
    }
}

#[derive(Serialize)]
struct CreatedGame<T: Serialize> {
    id: SessionId,
    #[serde(flatten)]
    game: T,
}

#[post("/stranger")]
pub async fn create_game(registry: web::Data<GameRegistry>) -> impl Responder {
    let (id, game) = registry.create();
    HttpResponse::Created().json(CreatedGame { id, game })
}

#[get("/stranger/{id}")]
pub async fn view_game(
    registry: web::Data<GameRegistry>,
    path: web::Path<SessionId>,
) -> Result<impl Responder, Error> {
    let view = registry.view(&path).map_err(game_error)?;
    Ok(HttpResponse::Ok().json(view))
}

#[derive(Deserialize)]
pub struct PlayersForm {
    pub num_players: u32,
}

#[post("/stranger/{id}/players")]
pub async fn set_players(
    registry: web::Data<GameRegistry>,
    path: web::Path<SessionId>,
    form: web::Json<PlayersForm>,
) -> Result<impl Responder, Error> {
    let view = registry
        .apply(&path, |game| game.set_players(form.num_players))
        .map_err(game_error)?;
    Ok(HttpResponse::Ok().json(view))
}

type GameAction = fn(&mut StrangerGame) -> Result<(), GameError>;

fn action_for(name: &str) -> Option<GameAction> {
    let action: GameAction = match name {
        "start" => StrangerGame::start,
        "reveal" => StrangerGame::reveal_role,
        "next" => StrangerGame::next_player,
        "discuss" => StrangerGame::start_discussion,
        "end" => StrangerGame::end,
        "reset" => |game: &mut StrangerGame| {
            game.reset();
            Ok(())
        },
        _ => return None,
    };
    Some(action)
}

#[post("/stranger/{id}/{action}")]
pub async fn game_action(
    registry: web::Data<GameRegistry>,
    path: web::Path<(SessionId, String)>,
) -> Result<impl Responder, Error> {
    let (id, name) = path.into_inner();
    let action = action_for(&name).ok_or_else(|| error::ErrorNotFound("Unknown game action."))?;

    let view = registry.apply(&id, action).map_err(game_error)?;
    Ok(HttpResponse::Ok().json(view))
}

#[delete("/stranger/{id}")]
pub async fn delete_game(
    registry: web::Data<GameRegistry>,
    path: web::Path<SessionId>,
) -> Result<impl Responder, Error> {
    if !registry.remove(&path) {
        return Err(game_error(GameError::SessionNotFound));
    }
    Ok(HttpResponse::NoContent().finish())
}
