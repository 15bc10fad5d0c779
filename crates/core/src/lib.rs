pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod pricing;
pub mod review;

pub use chrono;
pub use rust_decimal;

pub use domain::client::{Client, ClientId};
pub use domain::material::{Material, MaterialId};
pub use domain::price::{PriceHistoryId, PriceHistoryRecord, PriceSource};
pub use domain::quote::{Quote, QuoteId, QuoteLineId, QuoteLineItem};
pub use domain::review::{
    CandidateClient, CandidateLineItem, ExtractionMethod, ExtractionPayload, PayloadCorrections,
    ReviewItem, ReviewItemId, ReviewStatus,
};
pub use errors::{CoreError, ValidationError, ValidationIssue};
pub use pricing::{PriceResolution, PriceSuggestion};
pub use review::engine::{DecisionOutcome, ReferenceCommit, ReviewDecision, ReviewQueueEngine};
