// API server implementation using actix-web

use crate::api::{middleware, routes};
use crate::database_ops::db::Db;
use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use std::env;

/// Request-scoped configuration shared with the handlers.
#[derive(Clone)]
pub struct ApiContext {
    pub store_name: String,
}

pub struct ApiServer {
    pub host: String,
    pub port: u16,
    pub allowed_origins: String,
    pub store_name: String,
}

impl ApiServer {
    /// Create server from environment variables
    pub fn from_env() -> Result<Self> {
        crate::util::env::init_env();

        let host = env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("API_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .context("Invalid API_PORT")?;

        let allowed_origins = env::var("ALLOWED_ORIGINS").unwrap_or_else(|_| {
            "http://127.0.0.1:5500,http://localhost:5500,http://127.0.0.1:3000,http://localhost:3000"
                .to_string()
        });

        let store_name = env::var("STORE_NAME").unwrap_or_else(|_| "JayaGrocer".to_string());

        Ok(Self {
            host,
            port,
            allowed_origins,
            store_name,
        })
    }

    /// Start the HTTP server
    pub async fn run(self, db: Db) -> Result<()> {
        let bind_addr = format!("{}:{}", self.host, self.port);

        tracing::info!(
            host = %self.host,
            port = %self.port,
            "starting price tracker API server"
        );

        let db_data = web::Data::new(db);
        let ctx_data = web::Data::new(ApiContext {
            store_name: self.store_name.clone(),
        });
        let allowed_origins = self.allowed_origins.clone();

        HttpServer::new(move || {
            let (logger, compress) = middleware::setup_middleware();
            let cors = middleware::setup_cors(&allowed_origins);

            App::new()
                .app_data(db_data.clone())
                .app_data(ctx_data.clone())
                .wrap(logger)
                .wrap(compress)
                .wrap(cors)
                .configure(routes::configure_routes)
        })
        .bind(&bind_addr)
        .with_context(|| format!("Failed to bind to {}", bind_addr))?
        .run()
        .await
        .context("HTTP server error")?;

        Ok(())
    }
}
