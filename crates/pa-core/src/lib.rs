//! pet-adopter/crates/pa-core/src/lib.rs
//!
//! The central domain logic and interface definitions for Pet Adopter.

pub mod models;
pub mod traits;
pub mod error;
pub mod ranking;
pub mod colors;
pub mod similar;
pub mod search;
pub mod ads;
pub mod users;
pub mod validation;

// Re-exporting for easier access in other crates
pub use models::*;
pub use traits::*;
pub use error::*;
pub use ranking::{RankPlan, RankingContext};
pub use colors::{Color, ColorThresholds};
pub use similar::{ColorDescriber, SimilarityService};
pub use search::{SearchLimits, SearchOrchestrator};
pub use ads::AdService;
pub use users::{Session, UserService};
