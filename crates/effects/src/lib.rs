//! Uniquify Effects
//!
//! The math behind each effect stage:
//! - **Temporal:** Map output frames back to source frames after trim + speed
//! - **Visual:** Brightness, contrast, saturation, faint luma noise
//! - **Social:** Vintage, dramatic, soft and vibrant looks
//! - **Neural:** Per-frame gamma, channel shift and occasional blur, row-parallel
//!
//! This crate is pure computation on decoded RGB frames. Reading and writing
//! video is the render engine's job.

pub mod color;
pub mod frame;
pub mod neural;
pub mod noise;
pub mod social;
pub mod temporal;
pub mod visual;

pub use frame::{frame_from_bytes, FrameOp};
pub use neural::ExecDevice;
pub use temporal::TimeMap;
