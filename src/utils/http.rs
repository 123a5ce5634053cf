use reqwest::Client;
use std::time::Duration;

use crate::config::AppConfig;

// 谱面镜像与远程计算服务共用的 HTTP 客户端
pub fn build_client(config: &AppConfig) -> Client {
    Client::builder()
        .connect_timeout(Duration::from_secs(3))
        .timeout(config.fetch_timeout().max(config.calculation_timeout()))
        .pool_idle_timeout(Duration::from_secs(30))
        .pool_max_idle_per_host(8)
        .user_agent(concat!("lazer-score-backend/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|e| {
            log::warn!("构建 HTTP 客户端失败，回退默认设置: {e}");
            Client::new()
        })
}
