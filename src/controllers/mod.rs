pub mod admin;
pub mod beatmap;
pub mod health;
pub mod score;
pub mod user;

pub use admin::*;
pub use beatmap::*;
pub use health::*;
pub use score::*;
pub use user::*;
