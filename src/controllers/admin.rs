use actix_web::{delete, get, post, put, web, HttpResponse};

use crate::models::beatmap::{BannedBeatmap, Beatmap};
use crate::models::request::{BanChangeResult, BanRequest};
use crate::models::response::ApiResponse;
use crate::services::beatmap::BeatmapService;
use crate::services::pp_gate::PpCacheGate;
use crate::services::recalculate::{RecalculateService, RecalculateSummary};
use crate::utils::error::AppResult;

/// 写入谱面元数据，供谱面同步任务调用
#[utoipa::path(
    put,
    path = "/admin/beatmaps/{beatmap_id}",
    params(("beatmap_id" = i64, Path, description = "谱面 id")),
    request_body = Beatmap,
    responses((status = 200, description = "已写入", body = ApiResponse<Beatmap>))
)]
#[put("/admin/beatmaps/{beatmap_id}")]
pub async fn upsert_beatmap(
    path: web::Path<i64>,
    req: web::Json<Beatmap>,
    service: web::Data<BeatmapService>,
) -> AppResult<HttpResponse> {
    let mut beatmap = req.into_inner();
    beatmap.id = path.into_inner();

    service.upsert_beatmap(&beatmap).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(beatmap)))
}

/// 手动封禁谱面，并将其上成绩的 pp 清零
#[utoipa::path(
    put,
    path = "/admin/beatmaps/{beatmap_id}/ban",
    params(("beatmap_id" = i64, Path, description = "谱面 id")),
    request_body = BanRequest,
    responses((status = 200, description = "已封禁", body = ApiResponse<BanChangeResult>))
)]
#[put("/admin/beatmaps/{beatmap_id}/ban")]
pub async fn ban_beatmap(
    path: web::Path<i64>,
    req: Option<web::Json<BanRequest>>,
    service: web::Data<RecalculateService>,
) -> AppResult<HttpResponse> {
    let beatmap_id = path.into_inner();
    let reason = req
        .and_then(|r| r.into_inner().reason)
        .unwrap_or_else(|| "管理员手动封禁".to_string());

    let affected = service.ban_beatmap(beatmap_id, &reason).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(BanChangeResult {
        beatmap_id,
        banned: true,
        affected_scores: affected,
    })))
}

/// 解封谱面并重新计算其上成绩
#[utoipa::path(
    delete,
    path = "/admin/beatmaps/{beatmap_id}/ban",
    params(("beatmap_id" = i64, Path, description = "谱面 id")),
    responses(
        (status = 200, description = "已解封", body = ApiResponse<BanChangeResult>),
        (status = 404, description = "谱面未被封禁")
    )
)]
#[delete("/admin/beatmaps/{beatmap_id}/ban")]
pub async fn unban_beatmap(
    path: web::Path<i64>,
    service: web::Data<RecalculateService>,
) -> AppResult<HttpResponse> {
    let beatmap_id = path.into_inner();
    let affected = service.unban_beatmap(beatmap_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(BanChangeResult {
        beatmap_id,
        banned: false,
        affected_scores: affected,
    })))
}

#[utoipa::path(
    get,
    path = "/admin/beatmaps/banned",
    responses((status = 200, description = "封禁列表", body = ApiResponse<Vec<BannedBeatmap>>))
)]
#[get("/admin/beatmaps/banned")]
pub async fn list_banned_beatmaps(gate: web::Data<PpCacheGate>) -> AppResult<HttpResponse> {
    let banned = gate.bans().list().await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(banned)))
}

/// 立即处理一批待重算成绩
#[utoipa::path(
    post,
    path = "/admin/recalculate",
    responses((status = 200, description = "本批处理结果", body = ApiResponse<RecalculateSummary>))
)]
#[post("/admin/recalculate")]
pub async fn recalculate_pending(service: web::Data<RecalculateService>) -> AppResult<HttpResponse> {
    let summary = service.recompute_pending_results().await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(summary)))
}
