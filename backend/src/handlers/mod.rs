//! HTTP handlers

pub mod health;
pub mod model;
pub mod predict;

pub use health::health_check;
pub use model::model_info;
pub use predict::predict;
