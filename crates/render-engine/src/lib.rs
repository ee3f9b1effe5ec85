//! Uniquify Render Engine
//!
//! Turns one input video into one uniquized output by running an ordered
//! list of effect stages through an execution backend, with fallback to a
//! second backend and chunking for long inputs.
//!
//! # Pipeline Architecture
//!
//! ```text
//! input.mp4 ──probe──► Asset
//!                        │
//!                        ├── Compression (oversized inputs only)
//!                        │
//!                        ├── Chunk Splitter (stream copy, ≤ max secs)
//!                        │        │
//!                        │   ┌────┴──── per chunk, in order ─────────┐
//!                        │   │  FallbackCoordinator                  │
//!                        │   │    ├── compositing: Pipeline(stages)  │
//!                        │   │    └── streaming:   Pipeline(stages)  │
//!                        │   └────┬───────────────────────────────────┘
//!                        │        │
//!                        └── Chunk Merger (concat demuxer)
//!                                 │
//!                                 ▼
//!                             output.mp4
//! ```

pub mod backend;
pub mod chunk;
pub mod compositing;
pub mod compress;
pub mod fallback;
pub mod ffmpeg;
pub mod pipeline;
pub mod probe;
pub mod process;
pub mod progress;
pub mod streaming;

pub use backend::{BackendSettings, ExecutionBackend};
pub use chunk::{merge_chunks, merge_with, ChunkSplitter, ChunkTool, FfmpegChunkTool};
pub use compositing::{CompositingBackend, COMPOSITING_BACKEND};
pub use fallback::{first_success, FallbackCoordinator, FallbackOutcome};
pub use ffmpeg::{ensure_tools, tools_available, EncodeSettings};
pub use pipeline::{run_pipeline, PipelineContext};
pub use probe::{probe_asset, FfprobeProbe, MediaProbe};
pub use process::{process_video, process_video_async, ProcessOptions, ProcessReport, VideoProcessor};
pub use progress::*;
pub use streaming::{StreamingBackend, STREAMING_BACKEND};
pub use uniquify_model::plan_chunks;
