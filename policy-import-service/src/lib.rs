pub mod adapters;
pub mod matching;
pub mod models;
pub mod reconcile;
pub mod repo;
pub mod service;
pub mod stages;
pub mod validation;
pub mod workflow;

pub use models::*;
pub use service::{AppState, create_app};
pub use workflow::{ImportDeps, build_import_pipeline, create_flow_runner, create_import_session};
