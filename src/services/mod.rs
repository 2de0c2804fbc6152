//! Service layer for catalog enrichment.
//!
//! Domain logic separated from transport: the CLI and the web server both
//! drive the same [`Orchestrator`].

pub mod enrichment;

pub use enrichment::{EntryOutcome, ErrorKind, Orchestrator, PersistedEntry, PipelineError};
