use std::sync::Arc;

use actix_web::{get, web, HttpRequest, HttpResponse, Responder, Result};
use gamelink_session::RoomRegistry;
use serde_json::json;
use tokio::{sync::RwLock, task::spawn_local};

use crate::ws::{handler, server::WsServerHandle};

#[get("/health")]
pub async fn health_endpoint(
    registry: web::Data<Arc<RwLock<RoomRegistry>>>,
) -> impl Responder {
    let registry = registry.read().await;

    HttpResponse::Ok().json(json!({
        "healthy": true,
        "activeGames": registry.room_count(),
        "connectedPlayers": registry.player_count(),
    }))
}

#[get("/ws")]
pub async fn websocket(
    req: HttpRequest,
    stream: web::Payload,
    ws_server: web::Data<WsServerHandle>,
) -> Result<HttpResponse> {
    let (res, session, msg_stream) = actix_ws::handle(&req, stream)?;

    // spawn websocket handler (and don't await it) so that the response is returned immediately
    spawn_local(handler::handle_ws(
        ws_server.get_ref().clone(),
        session,
        msg_stream,
    ));

    Ok(res)
}
