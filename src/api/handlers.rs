// HTTP request handlers for the dashboard endpoints

use actix_web::{web, HttpResponse, Result};
use bigdecimal::ToPrimitive;

use crate::api::models::*;
use crate::api::server::ApiContext;
use crate::database_ops::db::Db;
use crate::database_ops::{history, products};

/// Health check endpoint
pub async fn health_check(db: web::Data<Db>) -> Result<HttpResponse> {
    // Quick database connectivity check
    let db_status = match sqlx::query_scalar::<_, bool>("SELECT true")
        .fetch_one(&db.pool)
        .await
    {
        Ok(_) => "connected",
        Err(_) => "disconnected",
    };

    Ok(HttpResponse::Ok().json(HealthResponse {
        status: "ok".to_string(),
        database: db_status.to_string(),
    }))
}

/// Current state of every tracked product with at least one observation,
/// summarized from its latest two history rows.
pub async fn get_items(db: web::Data<Db>, ctx: web::Data<ApiContext>) -> Result<HttpResponse> {
    let rows = sqlx::query_as::<_, LatestPriceRow>(
        "SELECT p.id AS product_id, p.name, h.price, h.scraped_at, h.rn
         FROM products p
         JOIN (
             SELECT product_id, price, scraped_at,
                    ROW_NUMBER() OVER (
                        PARTITION BY product_id
                        ORDER BY scraped_at DESC, id DESC
                    ) AS rn
             FROM price_history
         ) h ON h.product_id = p.id
         WHERE h.rn <= 2
         ORDER BY p.name ASC, p.id ASC, h.rn ASC",
    )
    .fetch_all(&db.pool)
    .await;

    match rows {
        Ok(rows) => {
            let items = fold_item_summaries(&rows, &ctx.store_name);
            Ok(HttpResponse::Ok().json(items))
        }
        Err(err) => {
            tracing::error!(error = %err, "GET /items failed");
            Ok(HttpResponse::InternalServerError()
                .json(serde_json::json!({"error": "failed to load items"})))
        }
    }
}

/// Full price history for one product, chronologically ascending.
pub async fn get_history(
    path: web::Path<i64>,
    db: web::Data<Db>,
    ctx: web::Data<ApiContext>,
) -> Result<HttpResponse> {
    let item_id = path.into_inner();

    let product = match products::product_by_id(&db, item_id).await {
        Ok(Some(product)) => product,
        Ok(None) => {
            return Ok(HttpResponse::NotFound()
                .json(serde_json::json!({"error": "Item not found"})));
        }
        Err(err) => {
            tracing::error!(item_id, error = %err, "GET /history product lookup failed");
            return Ok(HttpResponse::InternalServerError()
                .json(serde_json::json!({"error": "failed to load history"})));
        }
    };

    match history::history_for_product(&db, item_id).await {
        Ok(entries) => {
            let history = entries
                .iter()
                .map(|e| PricePoint {
                    price: e.price.to_f64().unwrap_or(0.0),
                    scraped_at: e.scraped_at,
                })
                .collect();
            Ok(HttpResponse::Ok().json(ItemHistoryResponse {
                id: product.id,
                product_name: product.name,
                store: ctx.store_name.clone(),
                history,
            }))
        }
        Err(err) => {
            tracing::error!(item_id, error = %err, "GET /history failed");
            Ok(HttpResponse::InternalServerError()
                .json(serde_json::json!({"error": "failed to load history"})))
        }
    }
}
