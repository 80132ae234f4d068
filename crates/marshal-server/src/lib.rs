pub mod engine;
pub mod evaluator;
pub mod handlers;
pub mod observability;
pub mod server;

pub use engine::{BasicValidationEngine, ValidationEngine};
pub use evaluator::{JsonResourceSerializer, LocationPathEvaluator};
pub use observability::{apply_logging_level, init_tracing};
pub use server::{AppState, MarshalServer, ServerBuilder, build_app};
