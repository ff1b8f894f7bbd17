mod assembler;
pub use assembler::{IngestEnvelope, IngestOutcome, SenderIdentifier, SessionAssembler};
