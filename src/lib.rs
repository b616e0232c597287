//! chromaskin — theme compositing & layout engine.
//!
//! Turns a declarative theme document (slot colors, per-image placement
//! parameters) into pixels: an interactive chrome preview at any canvas
//! resolution, and full-resolution export bakes that are geometrically
//! identical to what the preview showed.
//!
//! The engine owns no UI, no files beyond decoding a referenced image, and
//! no persistence — those live in the surrounding application.  Its public
//! surface is [`PreviewPipeline::update`], [`BakePipeline::bake`],
//! [`ImageCache`] and the mode resolver in [`mode`].

#![allow(clippy::too_many_arguments)]

#[macro_use]
pub mod logger;

pub mod cache;
pub mod compositor;
pub mod mode;
pub mod pipeline;
pub mod placement;
pub mod scheduler;
pub mod text;
pub mod theme;

pub use cache::{DecodeError, ImageCache};
pub use compositor::{
    CanvasSpec, ChromeMetrics, Fidelity, LAYER_STACK, LayerCompositor, LayerKind, RenderError,
    Surface,
};
pub use mode::ModeFlags;
pub use pipeline::{
    BAKE_BACKGROUND_SIZE, BAKE_FRAME_SIZE, BakePipeline, PreviewPipeline, shared_cache,
};
pub use placement::{
    AnchorMode, FitMode, Placement, PlacementPolicy, PlacementResult, Rect, Size,
};
pub use scheduler::{RenderScheduler, ScheduledRender};
pub use theme::{
    ColorSlot, ImageBinding, ImageSlot, MIN_SCALE, Rgba8, ThemePreset, ThemeState,
};
