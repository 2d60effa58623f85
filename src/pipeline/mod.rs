//! Deal events, stage mapping, field resolution and the transition engine

pub mod deal;
pub mod engine;
pub mod fields;
pub mod stage;
pub mod webhook;

pub use deal::{deal_diff, DealEvent, DealSnapshot, DealStatus, EventKind};
pub use engine::{DealCreated, DealUpdated, EngineSettings, TransitionEngine, TransitionOutcome};
pub use fields::{FieldDefinition, FieldMap};
pub use stage::{backfill_stages, Stage};
pub use webhook::handle_webhook;
