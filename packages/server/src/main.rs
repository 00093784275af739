#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]

mod api;
mod ws;

use std::{env, sync::Arc};

use actix_cors::Cors;
use actix_web::{http, middleware, web, App, HttpServer};
use gamelink_session::RoomRegistry;
use tokio::{sync::RwLock, task::spawn, try_join};

use crate::ws::server::WsServer;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init();

    let service_port = {
        let args: Vec<String> = env::args().collect();

        if args.len() > 1 {
            args[1].parse::<u16>().unwrap()
        } else {
            8000
        }
    };

    let registry = Arc::new(RwLock::new(RoomRegistry::new()));

    let (ws_server, server_tx) = WsServer::new(registry.clone());
    let ws_server = spawn(ws_server.run());

    let app = move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allowed_methods(vec!["GET", "POST"])
            .allowed_headers(vec![http::header::AUTHORIZATION, http::header::ACCEPT])
            .allowed_header(http::header::CONTENT_TYPE)
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(cors)
            .wrap(middleware::Compress::default())
            .app_data(web::Data::new(registry.clone()))
            .app_data(web::Data::new(server_tx.clone()))
            .service(api::websocket)
            .service(api::health_endpoint)
    };

    let http_server = HttpServer::new(app).bind(("0.0.0.0", service_port))?.run();

    try_join!(http_server, async move { ws_server.await.unwrap() })?;

    Ok(())
}
