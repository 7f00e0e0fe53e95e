pub mod handler;
pub mod models;

pub use handler::{AppState, PodInfo};
