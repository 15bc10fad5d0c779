pub mod engine;

pub use engine::{DecisionOutcome, ReferenceCommit, ReviewDecision, ReviewQueueEngine};
