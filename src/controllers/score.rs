use actix_web::{delete, get, post, web, HttpResponse};
use log::debug;

use crate::models::request::DeleteScoreQuery;
use crate::models::response::ApiResponse;
use crate::models::score::{Score, ScoreSubmission};
use crate::services::score_submission::ScoreSubmissionService;
use crate::utils::error::AppResult;

/// 提交单人游玩成绩
///
/// 计算器不可用时成绩照常保存，pp 稍后由后台任务补算。
#[utoipa::path(
    post,
    path = "/beatmaps/{beatmap_id}/solo/scores",
    params(("beatmap_id" = i64, Path, description = "谱面 id")),
    request_body = ScoreSubmission,
    responses(
        (status = 200, description = "成绩已保存", body = ApiResponse<Score>),
        (status = 400, description = "成绩数据无效"),
        (status = 404, description = "谱面不存在")
    )
)]
#[post("/beatmaps/{beatmap_id}/solo/scores")]
pub async fn submit_score(
    path: web::Path<i64>,
    payload: web::Json<ScoreSubmission>,
    service: web::Data<ScoreSubmissionService>,
) -> AppResult<HttpResponse> {
    let beatmap_id = path.into_inner();
    debug!("接收到成绩提交: 谱面 {beatmap_id} 玩家 {}", payload.user_id);

    let score = service.submit(beatmap_id, payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(score)))
}

#[utoipa::path(
    get,
    path = "/scores/{score_id}",
    params(("score_id" = i64, Path, description = "成绩 id")),
    responses(
        (status = 200, description = "成绩详情", body = ApiResponse<Score>),
        (status = 404, description = "成绩不存在")
    )
)]
#[get("/scores/{score_id}")]
pub async fn get_score(
    path: web::Path<i64>,
    service: web::Data<ScoreSubmissionService>,
) -> AppResult<HttpResponse> {
    let score = service.get_score(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(score)))
}

/// 删除自己的成绩
#[utoipa::path(
    delete,
    path = "/scores/{score_id}",
    params(("score_id" = i64, Path, description = "成绩 id"), DeleteScoreQuery),
    responses(
        (status = 200, description = "已删除"),
        (status = 400, description = "成绩不属于该玩家"),
        (status = 404, description = "成绩不存在")
    )
)]
#[delete("/scores/{score_id}")]
pub async fn delete_score(
    path: web::Path<i64>,
    query: web::Query<DeleteScoreQuery>,
    service: web::Data<ScoreSubmissionService>,
) -> AppResult<HttpResponse> {
    let score_id = path.into_inner();
    service.delete_score(score_id, query.user_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(score_id)))
}
