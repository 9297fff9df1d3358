pub mod models;
pub mod recurrence;
pub mod repo;
pub mod service;

pub use models::*;
pub use recurrence::{Freq, Recurrence, next_occurrence, parse_fixed_rule, parse_rrule};
pub use service::{AppState, advance_appointment, create_app};
