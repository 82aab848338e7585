//! Shared types and domain logic for the AsthmaShield platform
//!
//! This crate holds everything that must behave identically in the inference
//! service and in the dashboard (via WASM): the feature schema, the request-scoped
//! data model, input validation, feature vector assembly and advice composition.
//! Nothing in here performs I/O.

pub mod advice;
pub mod features;
pub mod models;
pub mod types;
pub mod validation;

pub use advice::*;
pub use features::*;
pub use models::*;
pub use types::*;
pub use validation::*;
