pub mod commit;
pub mod intake;
pub mod processing;
pub mod review;

pub use commit::CommitStage;
pub use intake::IntakeStage;
pub use processing::ProcessingStage;
pub use review::ReviewStage;

pub mod stage_ids {
    pub const INTAKE: &str = "intake";
    pub const PROCESSING: &str = "processing";
    pub const REVIEW: &str = "review";
    pub const COMMIT: &str = "commit";
}
