use actix_web::{get, web, HttpResponse};

use crate::models::best_score::WeightedBestScore;
use crate::models::game_mode::GameMode;
use crate::models::request::BestScoresQuery;
use crate::models::response::ApiResponse;
use crate::models::statistics::UserStatistics;
use crate::services::statistics::StatisticsService;
use crate::utils::error::AppResult;

const DEFAULT_BEST_LIMIT: i64 = 100;

/// 玩家在某模式下的统计
#[utoipa::path(
    get,
    path = "/users/{user_id}/{mode}/statistics",
    params(
        ("user_id" = i64, Path, description = "玩家 id"),
        ("mode" = String, Path, description = "模式名或 ruleset id")
    ),
    responses(
        (status = 200, description = "玩家统计", body = ApiResponse<UserStatistics>),
        (status = 400, description = "模式无效")
    )
)]
#[get("/users/{user_id}/{mode}/statistics")]
pub async fn get_user_statistics(
    path: web::Path<(i64, String)>,
    service: web::Data<StatisticsService>,
) -> AppResult<HttpResponse> {
    let (user_id, mode) = path.into_inner();
    let mode: GameMode = mode.parse()?;

    let stats = service.get_statistics(user_id, mode).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(stats)))
}

/// BP 列表及权重
#[utoipa::path(
    get,
    path = "/users/{user_id}/{mode}/best",
    params(
        ("user_id" = i64, Path, description = "玩家 id"),
        ("mode" = String, Path, description = "模式名或 ruleset id"),
        BestScoresQuery
    ),
    responses(
        (status = 200, description = "按 pp 降序的 BP", body = ApiResponse<Vec<WeightedBestScore>>)
    )
)]
#[get("/users/{user_id}/{mode}/best")]
pub async fn get_user_best(
    path: web::Path<(i64, String)>,
    query: web::Query<BestScoresQuery>,
    service: web::Data<StatisticsService>,
) -> AppResult<HttpResponse> {
    let (user_id, mode) = path.into_inner();
    let mode: GameMode = mode.parse()?;
    let limit = query.limit.unwrap_or(DEFAULT_BEST_LIMIT);

    let best = service.best_pp_scores(user_id, mode, limit).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(best)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::{test, App};

    use crate::utils::db::memory_pool;

    #[actix_web::test]
    async fn mode_accepts_name_or_id() {
        let service = StatisticsService::new(memory_pool().await);
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(service))
                .service(get_user_statistics)
                .service(get_user_best),
        )
        .await;

        let req = test::TestRequest::get().uri("/users/3/mania/statistics").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["mode"], "mania");
        assert_eq!(body["data"]["play_count"], 0);

        let req = test::TestRequest::get().uri("/users/3/1/best?limit=5").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"], serde_json::json!([]));

        let req = test::TestRequest::get().uri("/users/3/ctb/statistics").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
    }
}
