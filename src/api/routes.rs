// API route configuration

use crate::api::handlers;
use actix_web::web;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(handlers::health_check))
        .route("/", web::get().to(handlers::health_check))
        .route("/items", web::get().to(handlers::get_items))
        .route("/history/{id}", web::get().to(handlers::get_history));
}
