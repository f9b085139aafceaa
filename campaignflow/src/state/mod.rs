//! Generation state accumulated across one pipeline run.
//!
//! A [`GenerationState`] is created once per run and changes only through
//! [`GenerationState::merge`], which folds a validated stage handoff into a new
//! state. Fields owned by a stage are write-once; metadata accumulates.

pub mod mappers;
mod merge;
mod model;

pub use merge::check_preconditions;
pub use model::{
    AssetData, CampaignMetadata, ContentData, DateRange, GenerationState, PriceData, RouteEntry,
};
