use actix_web::{post, web, HttpResponse};
use log::debug;

use crate::models::game_mode::GameMode;
use crate::models::performance::DifficultyAttributes;
use crate::models::request::DifficultyRequest;
use crate::models::response::ApiResponse;
use crate::services::pp_gate::PpCacheGate;
use crate::utils::error::AppResult;

/// 计算谱面难度属性
#[utoipa::path(
    post,
    path = "/beatmaps/{beatmap_id}/attributes",
    params(("beatmap_id" = i64, Path, description = "谱面 id")),
    request_body = DifficultyRequest,
    responses(
        (status = 200, description = "难度属性", body = ApiResponse<DifficultyAttributes>),
        (status = 400, description = "谱面已封禁或模式不受支持"),
        (status = 502, description = "谱面获取或计算失败")
    )
)]
#[post("/beatmaps/{beatmap_id}/attributes")]
pub async fn get_beatmap_attributes(
    path: web::Path<i64>,
    req: web::Json<DifficultyRequest>,
    gate: web::Data<PpCacheGate>,
) -> AppResult<HttpResponse> {
    let beatmap_id = path.into_inner();
    let mode = req
        .ruleset
        .as_deref()
        .map(str::parse::<GameMode>)
        .transpose()?;
    debug!("难度查询: 谱面 {beatmap_id} 模式 {mode:?} mods {:?}", req.mods);

    let attrs = gate.get_difficulty(beatmap_id, mode, &req.mods).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(attrs)))
}
