//! Inference services for the AsthmaShield platform

pub mod classifier;
pub mod environment;
pub mod explanation;
pub mod pipeline;

pub use classifier::{ClassifierError, RiskClassifier};
pub use environment::{DataFetchError, DataSource, FetchedSnapshot, ResilientProvider};
pub use explanation::{Deadline, ExplanationEngine, ExplanationError, ExplanationReport};
pub use pipeline::{
    ExplanationOutcome, PipelineError, PipelineStage, PredictionOutcome, PredictionPipeline,
    PredictionRequest,
};
