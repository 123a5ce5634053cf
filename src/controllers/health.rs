use actix_web::{get, web, HttpResponse};
use serde::Serialize;
use sqlx::SqlitePool;
use utoipa::ToSchema;

use crate::models::response::ApiResponse;
use crate::utils::error::AppResult;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthStatus {
    pub version: &'static str,
    pub database: &'static str,
}

/// 健康检查端点
///
/// 供外部监控使用，数据库不可用时返回 500。
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "服务健康", body = ApiResponse<HealthStatus>),
        (status = 500, description = "数据库不可用")
    )
)]
#[get("/health")]
pub async fn health_check(pool: web::Data<SqlitePool>) -> AppResult<HttpResponse> {
    sqlx::query("SELECT 1").execute(pool.get_ref()).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::ok(HealthStatus {
        version: env!("CARGO_PKG_VERSION"),
        database: "ok",
    })))
}
