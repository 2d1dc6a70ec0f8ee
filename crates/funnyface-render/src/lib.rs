//! funnyface-render — Compositing overlay primitives.
//!
//! The still pipeline rasterizes overlays permanently into a copy of the
//! photo. The live pipeline keeps a transient vector layer over the preview
//! and rebuilds it for every detected frame.

pub mod live;
pub mod raster;
pub mod still;

pub use live::{spawn_frame_loop, FrameLoop, FrameLoopConfig, FrameLoopStats, LiveRenderer, LiveUpdate, OverlayLayer};
pub use still::{composite, ApplyOutcome, StillPipeline};
