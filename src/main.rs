use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use env_logger::Env;
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod config;
mod controllers;
mod models;
mod routes;
mod services;
mod utils;

#[cfg(test)]
mod test_support;

use config::AppConfig;
use routes::ApiDoc;
use services::ban_registry::BanRegistry;
use services::beatmap::{BeatmapRawFetcher, BeatmapService, MapContentStore};
use services::calculator::build_calculator;
use services::mod_policy::ModPolicy;
use services::pp_gate::PpCacheGate;
use services::recalculate::{spawn_recalculate_task, RecalculateService};
use services::score_submission::{ScoreSubmissionService, UserModeLocks};
use services::statistics::StatisticsService;
use utils::keyed_lock::KeyedLocks;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // 指定 CONFIG_FILE 时从 JSON 文件读取，否则读环境变量（内部会加载 .env）
    let config = match std::env::var("CONFIG_FILE") {
        Ok(path) => AppConfig::from_file(&path)?,
        Err(_) => AppConfig::from_env(),
    };

    // 初始化日志
    env_logger::init_from_env(Env::default().default_filter_or(config.log_level.as_str()));

    // --- 数据库初始化 ---
    log::info!("连接数据库: {}", config.database_url);
    let pool = utils::db::connect(&config.database_url, 5).await?;
    utils::db::init_db(&pool).await?;
    log::info!("数据库初始化完成");

    // --- 服务初始化 ---
    let client = utils::http::build_client(&config);
    let calculator = build_calculator(&config, client.clone());
    let content: Arc<dyn MapContentStore> = Arc::new(BeatmapRawFetcher::new(client, &config));
    let bans = BanRegistry::new(pool.clone());
    let gate = Arc::new(PpCacheGate::new(calculator, content, bans, &config));
    let locks: Arc<UserModeLocks> = Arc::new(KeyedLocks::new());

    let beatmap_service = BeatmapService::new(pool.clone());
    let submission_service = web::Data::new(ScoreSubmissionService::new(
        pool.clone(),
        beatmap_service.clone(),
        gate.clone(),
        ModPolicy::from_config(&config),
        locks.clone(),
    ));
    let recalculate_service = Arc::new(RecalculateService::new(pool.clone(), gate.clone(), locks));
    let statistics_service = web::Data::new(StatisticsService::new(pool.clone()));
    let beatmap_data = web::Data::new(beatmap_service);
    let pool_data = web::Data::new(pool.clone());
    let gate_data = web::Data::from(gate);
    let recalculate_data = web::Data::from(recalculate_service.clone());

    // 启动时先清理上次未完成的封禁重算，然后周期处理重试队列
    match recalculate_service.sweep_uncleared_bans().await {
        Ok(0) => {}
        Ok(n) => log::info!("已补完 {n} 张谱面的封禁重算"),
        Err(e) => log::error!("封禁重算补偿失败: {e}"),
    }
    let _recalculate_task = spawn_recalculate_task(recalculate_service, config.recalculate_interval());

    let host = config.host.clone();
    let port = config.port;
    let allowed_origins = config.cors_allowed_origins.clone();
    let openapi = ApiDoc::openapi();

    log::info!("服务启动于 http://{}:{}", host, port);

    // 创建并启动HTTP服务器
    HttpServer::new(move || {
        // 配置CORS
        let mut cors = Cors::default()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);
        if allowed_origins.iter().any(|o| o == "*") {
            cors = cors.allow_any_origin();
        } else {
            for origin in &allowed_origins {
                cors = cors.allowed_origin(origin);
            }
        }

        App::new()
            .app_data(submission_service.clone())
            .app_data(statistics_service.clone())
            .app_data(beatmap_data.clone())
            .app_data(pool_data.clone())
            .app_data(gate_data.clone())
            .app_data(recalculate_data.clone())
            .app_data(web::JsonConfig::default().limit(256 * 1024))
            .wrap(middleware::Logger::default())
            .wrap(cors)
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", openapi.clone()),
            )
            .configure(routes::configure)
    })
    .bind((host, port))?
    .run()
    .await?;

    Ok(())
}
