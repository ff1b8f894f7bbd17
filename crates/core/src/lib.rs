pub mod types;

pub mod entity;
pub use entity::{
  Disambiguation, DisambiguationContext, EntityFilter, EntityStore, IdentifierResolver,
  MergeOutcome, NewEntity, NewFact, Resolution, ScoredCandidate, UpdateEntity,
};

pub mod session;
pub use session::{IngestEnvelope, IngestOutcome, SessionAssembler};

pub mod segment;
pub use segment::Segmenter;

pub mod extraction;
pub use extraction::{DedupeDecision, Deduper, Orchestrator};

pub mod approval;
pub use approval::{ApprovalWorkflow, BatchOutcome, BatchStats, ItemTypeSpec, UpdateDraft, run_retention_gc};

pub mod activity;
pub use activity::ActivityTree;

pub mod commitment;
pub use commitment::{DueReminder, ReminderEngine};

pub mod audit;
pub use audit::Auditor;
