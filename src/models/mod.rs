pub mod beatmap;
pub mod best_score;
pub mod game_mode;
pub mod mods;
pub mod performance;
pub mod request;
pub mod response;
pub mod score;
pub mod statistics;
