mod registry;
pub use registry::ItemTypeSpec;

mod workflow;
pub use workflow::{ApprovalWorkflow, BatchOutcome, BatchStats, UpdateDraft};

mod gc;
pub use gc::run_retention_gc;
