mod store;
pub use store::{EntityFilter, EntityStore, MergeOutcome, NewEntity, NewFact, UpdateEntity};

mod resolver;
pub use resolver::{IdentifierResolver, Resolution};

pub mod disambiguation;
pub use disambiguation::{Disambiguation, DisambiguationContext, ScoredCandidate};
