pub mod cache;
pub mod clock;
pub mod db;
pub mod error;
pub mod events;
pub mod food_log;
pub mod log_store;
pub mod models;
pub mod nutrition;
pub mod recommendation;
pub mod remote;
pub mod service;
pub mod sync;

pub use error::{Error, Result};
