//! Uniquify Data Model
//!
//! Defines the core data contracts shared by the render engine and the batch
//! orchestrator:
//! - **Asset:** A probed media file (duration, frame rate, geometry, audio)
//! - **Stages:** Effect kinds and their sampled, seed-determined parameters
//! - **Pipeline:** An ordered, immutable list of stages
//! - **Chunks:** Bounded segments of an oversized input
//! - **Runs:** Versions, their metadata files, and the on-disk layout
//!
//! Everything here is plain data; no module in this crate spawns processes or
//! touches media.

pub mod asset;
pub mod chunk;
pub mod layout;
pub mod pipeline;
pub mod preset;
pub mod progress;
pub mod stage;
pub mod version;

pub use asset::*;
pub use chunk::*;
pub use layout::*;
pub use pipeline::*;
pub use preset::*;
pub use progress::*;
pub use stage::*;
pub use version::*;
