mod dedupe;
pub use dedupe::{DedupeDecision, Deduper, Neighbor};

mod orchestrator;
pub use orchestrator::{MAX_EXTRACTION_ATTEMPTS, Orchestrator};
