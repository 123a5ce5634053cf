pub mod db;
pub mod error;
pub mod http;
pub mod keyed_lock;
pub mod level;
pub mod pp_utils;
pub mod suspicious;
