use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;

const SCHEMA: &[&str] = &[
    // 谱面元数据，由外部同步写入
    r#"
    CREATE TABLE IF NOT EXISTS beatmaps (
        id INTEGER PRIMARY KEY NOT NULL,
        checksum TEXT NOT NULL DEFAULT '',
        status INTEGER NOT NULL DEFAULT 0,
        mode TEXT NOT NULL DEFAULT 'osu',
        total_length INTEGER NOT NULL DEFAULT 0,
        max_combo INTEGER NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS scores (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        beatmap_id INTEGER NOT NULL,
        map_md5 TEXT NOT NULL DEFAULT '',
        gamemode TEXT NOT NULL,
        mods TEXT NOT NULL DEFAULT '[]',
        accuracy REAL NOT NULL,
        max_combo INTEGER NOT NULL,
        rank TEXT NOT NULL,
        passed INTEGER NOT NULL,
        ranked INTEGER NOT NULL DEFAULT 0,
        leaderboard_eligible INTEGER NOT NULL DEFAULT 0,
        pp REAL NOT NULL DEFAULT 0,
        pp_status TEXT NOT NULL DEFAULT 'unset',
        total_score INTEGER NOT NULL,
        n300 INTEGER NOT NULL DEFAULT 0,
        n100 INTEGER NOT NULL DEFAULT 0,
        n50 INTEGER NOT NULL DEFAULT 0,
        nmiss INTEGER NOT NULL DEFAULT 0,
        ngeki INTEGER NOT NULL DEFAULT 0,
        nkatu INTEGER NOT NULL DEFAULT 0,
        large_tick_hit INTEGER NOT NULL DEFAULT 0,
        large_tick_miss INTEGER NOT NULL DEFAULT 0,
        small_tick_hit INTEGER NOT NULL DEFAULT 0,
        small_tick_miss INTEGER NOT NULL DEFAULT 0,
        slider_tail_hit INTEGER NOT NULL DEFAULT 0,
        started_at TEXT NOT NULL,
        ended_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_scores_user_map ON scores (user_id, beatmap_id, gamemode)",
    "CREATE INDEX IF NOT EXISTS idx_scores_beatmap ON scores (beatmap_id)",
    // BP 指针
    r#"
    CREATE TABLE IF NOT EXISTS best_scores (
        score_id INTEGER PRIMARY KEY NOT NULL REFERENCES scores(id) ON DELETE CASCADE,
        user_id INTEGER NOT NULL,
        beatmap_id INTEGER NOT NULL,
        gamemode TEXT NOT NULL,
        pp REAL NOT NULL,
        acc REAL NOT NULL,
        UNIQUE (user_id, beatmap_id, gamemode)
    )
    "#,
    // 最高总分指针
    r#"
    CREATE TABLE IF NOT EXISTS total_score_best_scores (
        score_id INTEGER PRIMARY KEY NOT NULL REFERENCES scores(id) ON DELETE CASCADE,
        user_id INTEGER NOT NULL,
        beatmap_id INTEGER NOT NULL,
        gamemode TEXT NOT NULL,
        total_score INTEGER NOT NULL,
        mods TEXT NOT NULL DEFAULT '[]',
        rank TEXT NOT NULL,
        UNIQUE (user_id, beatmap_id, gamemode)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_statistics (
        user_id INTEGER NOT NULL,
        mode TEXT NOT NULL,
        count_300 INTEGER NOT NULL DEFAULT 0,
        count_100 INTEGER NOT NULL DEFAULT 0,
        count_50 INTEGER NOT NULL DEFAULT 0,
        count_miss INTEGER NOT NULL DEFAULT 0,
        pp REAL NOT NULL DEFAULT 0,
        ranked_score INTEGER NOT NULL DEFAULT 0,
        hit_accuracy REAL NOT NULL DEFAULT 0,
        total_score INTEGER NOT NULL DEFAULT 0,
        total_hits INTEGER NOT NULL DEFAULT 0,
        maximum_combo INTEGER NOT NULL DEFAULT 0,
        play_count INTEGER NOT NULL DEFAULT 0,
        play_time INTEGER NOT NULL DEFAULT 0,
        grade_ss INTEGER NOT NULL DEFAULT 0,
        grade_ssh INTEGER NOT NULL DEFAULT 0,
        grade_s INTEGER NOT NULL DEFAULT 0,
        grade_sh INTEGER NOT NULL DEFAULT 0,
        grade_a INTEGER NOT NULL DEFAULT 0,
        level_current REAL NOT NULL DEFAULT 1,
        PRIMARY KEY (user_id, mode)
    )
    "#,
    // pp_cleared = 0 表示该谱面已有成绩尚未清零
    r#"
    CREATE TABLE IF NOT EXISTS banned_beatmaps (
        beatmap_id INTEGER PRIMARY KEY NOT NULL,
        reason TEXT,
        pp_cleared INTEGER NOT NULL DEFAULT 0,
        banned_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS pp_recalculate_queue (
        score_id INTEGER PRIMARY KEY NOT NULL REFERENCES scores(id) ON DELETE CASCADE,
        attempts INTEGER NOT NULL DEFAULT 0,
        last_error TEXT,
        queued_at TEXT NOT NULL
    )
    "#,
];

// 初始化数据库表
pub async fn init_db(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }

    log::info!("数据库表初始化检查完成");
    Ok(())
}

pub async fn connect(database_url: &str, max_connections: u32) -> Result<SqlitePool, sqlx::Error> {
    // 使用 SqliteConnectOptions 配置连接，并设置 create_if_missing
    let connect_options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));

    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(connect_options)
        .await
}

#[cfg(test)]
pub async fn memory_pool() -> SqlitePool {
    // 内存库每个连接都是独立的数据库，只能开一个连接且不能被回收
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .unwrap()
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .unwrap();
    init_db(&pool).await.unwrap();
    pool
}
