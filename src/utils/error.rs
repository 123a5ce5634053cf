use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

use crate::services::calculator::CalculateError;

#[derive(Debug, Error)]
#[allow(dead_code)]
pub enum AppError {
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库错误: {0}")]
    DbError(#[from] sqlx::Error),

    #[error("pp 计算错误: {0}")]
    Calculate(#[from] CalculateError),

    #[error("谱面内容获取失败: {0}")]
    ContentFetch(String),

    #[error("操作超时: {0}")]
    Timeout(String),

    #[error("谱面解析失败: {0}")]
    BeatmapParse(String),

    #[error("找不到资源: {0}")]
    NotFound(String),

    #[error("错误的请求: {0}")]
    BadRequest(String),

    #[error("IO错误: {0}")]
    IoError(#[from] std::io::Error),

    #[error("HTTP请求错误: {0}")]
    ReqwestError(#[from] reqwest::Error),

    #[error("Serde JSON错误: {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    #[error("配置错误: {0}")]
    ConfigError(String),

    #[error("验证错误: {0}")]
    ValidationError(String),

    #[error("内部错误: {0}")]
    InternalError(String),
}

impl AppError {
    /// 计算器不可用 / 网络问题 / 超时，稍后重试即可
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Calculate(e) => e.is_retryable(),
            AppError::ContentFetch(_)
            | AppError::Timeout(_)
            | AppError::ReqwestError(_)
            | AppError::BeatmapParse(_) => true,
            _ => false,
        }
    }
}

/// moka `try_get_with` 返回 `Arc<AppError>`，这里尽量还原成原始种类
impl From<Arc<AppError>> for AppError {
    fn from(shared: Arc<AppError>) -> Self {
        match Arc::try_unwrap(shared) {
            Ok(err) => err,
            Err(shared) => match &*shared {
                AppError::Calculate(e) => AppError::Calculate(e.clone()),
                AppError::ContentFetch(s) => AppError::ContentFetch(s.clone()),
                AppError::Timeout(s) => AppError::Timeout(s.clone()),
                AppError::BeatmapParse(s) => AppError::BeatmapParse(s.clone()),
                AppError::NotFound(s) => AppError::NotFound(s.clone()),
                AppError::DatabaseError(s) => AppError::DatabaseError(s.clone()),
                other => AppError::InternalError(other.to_string()),
            },
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let (status_code, error_type) = match self {
            AppError::DatabaseError(_) | AppError::DbError(_) => (actix_web::http::StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
            AppError::Calculate(_) => (actix_web::http::StatusCode::BAD_GATEWAY, "calculate_error"),
            AppError::ContentFetch(_) => (actix_web::http::StatusCode::BAD_GATEWAY, "content_fetch_error"),
            AppError::Timeout(_) => (actix_web::http::StatusCode::GATEWAY_TIMEOUT, "timeout"),
            AppError::BeatmapParse(_) => (actix_web::http::StatusCode::UNPROCESSABLE_ENTITY, "beatmap_parse_error"),
            AppError::NotFound(_) => (actix_web::http::StatusCode::NOT_FOUND, "not_found"),
            AppError::BadRequest(_) => (actix_web::http::StatusCode::BAD_REQUEST, "bad_request"),
            AppError::IoError(_) => (actix_web::http::StatusCode::INTERNAL_SERVER_ERROR, "io_error"),
            AppError::ReqwestError(_) => (actix_web::http::StatusCode::BAD_GATEWAY, "request_error"),
            AppError::SerdeJsonError(_) => (actix_web::http::StatusCode::BAD_REQUEST, "serialization_error"),
            AppError::ConfigError(_) => (actix_web::http::StatusCode::INTERNAL_SERVER_ERROR, "configuration_error"),
            AppError::ValidationError(_) => (actix_web::http::StatusCode::BAD_REQUEST, "validation_error"),
            AppError::InternalError(_) => (actix_web::http::StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        HttpResponse::build(status_code)
            .json(ErrorResponse {
                error: error_type.to_string(),
                message: self.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(AppError::Timeout("calc".into()).is_retryable());
        assert!(AppError::ContentFetch("mirror".into()).is_retryable());
        assert!(AppError::Calculate(CalculateError::Performance("boom".into())).is_retryable());
        assert!(!AppError::DatabaseError("locked".into()).is_retryable());
        assert!(!AppError::ValidationError("acc".into()).is_retryable());
    }

    #[test]
    fn shared_error_keeps_its_kind() {
        let shared = Arc::new(AppError::Timeout("mirror".into()));
        let _other_holder = shared.clone();
        assert!(matches!(AppError::from(shared), AppError::Timeout(_)));

        let sole = Arc::new(AppError::Calculate(CalculateError::Convert("mania".into())));
        let err = AppError::from(sole);
        assert!(matches!(err, AppError::Calculate(CalculateError::Convert(_))));
        assert!(!err.is_retryable());
    }

    #[test]
    fn not_found_maps_to_404() {
        let resp = AppError::NotFound("score 1".into()).error_response();
        assert_eq!(resp.status(), actix_web::http::StatusCode::NOT_FOUND);
    }
}
