use actix_web::web;
use utoipa::OpenApi;

use crate::controllers::*;

#[derive(OpenApi)]
#[openapi(
    info(title = "lazer-score-backend", description = "成绩提交、pp 计算与排行聚合"),
    paths(
        crate::controllers::health::health_check,
        crate::controllers::score::submit_score,
        crate::controllers::score::get_score,
        crate::controllers::score::delete_score,
        crate::controllers::user::get_user_statistics,
        crate::controllers::user::get_user_best,
        crate::controllers::beatmap::get_beatmap_attributes,
        crate::controllers::admin::upsert_beatmap,
        crate::controllers::admin::ban_beatmap,
        crate::controllers::admin::unban_beatmap,
        crate::controllers::admin::list_banned_beatmaps,
        crate::controllers::admin::recalculate_pending,
    )
)]
pub struct ApiDoc;

// 配置所有路由
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(health_check)
        // 成绩
        .service(submit_score)
        .service(get_score)
        .service(delete_score)
        // 玩家统计
        .service(get_user_statistics)
        .service(get_user_best)
        // 谱面
        .service(get_beatmap_attributes)
        // 管理
        .service(list_banned_beatmaps)
        .service(upsert_beatmap)
        .service(ban_beatmap)
        .service(unban_beatmap)
        .service(recalculate_pending);
}
