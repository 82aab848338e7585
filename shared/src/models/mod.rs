//! Request-scoped domain models for asthma risk prediction

mod environment;
mod explanation;
mod patient;
mod risk;

pub use environment::*;
pub use explanation::*;
pub use patient::*;
pub use risk::*;
