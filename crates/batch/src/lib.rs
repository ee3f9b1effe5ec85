//! Uniquify Batch
//!
//! Generates many variants of one input as a run on disk, lists finished
//! runs, keeps interactive session state, and hands results to external
//! collaborators.

pub mod collaborators;
pub mod orchestrator;
pub mod run_store;
pub mod session;

pub use collaborators::*;
pub use orchestrator::{default_palette, BatchOrchestrator, Concurrency, GenerateRequest};
pub use run_store::RunStore;
pub use session::{InMemorySessionStore, SessionStore};
