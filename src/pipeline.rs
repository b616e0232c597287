//! Render pipelines — the two consumers of the compositing primitives.
//!
//! `PreviewPipeline` serves the interactive, resizable preview; `BakePipeline`
//! produces the export assets at fixed full resolution.  Both go through the
//! same placement resolver, which is the WYSIWYG guarantee: the bake cannot
//! disagree with what the preview showed.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::cache::ImageCache;
use crate::compositor::{
    self, CanvasSpec, Fidelity, LayerCompositor, RenderError, Surface,
};
use crate::mode::ModeFlags;
use crate::placement::{self, Placement, Rect, Size};
use crate::theme::{ImageSlot, ThemeState};

/// Export resolution for the frame band asset.
pub const BAKE_FRAME_SIZE: Size = Size::new(2000, 120);
/// Export resolution for the new-tab background asset.
pub const BAKE_BACKGROUND_SIZE: Size = Size::new(2000, 1200);

/// One decode cache, shared by preview and bake so switching to the export
/// page never re-decodes what the preview already has.
pub fn shared_cache() -> Arc<Mutex<ImageCache>> {
    Arc::new(Mutex::new(ImageCache::new()))
}

fn lock_cache(cache: &Arc<Mutex<ImageCache>>) -> MutexGuard<'_, ImageCache> {
    match cache.lock() {
        Ok(guard) => guard,
        // A panic mid-decode leaves the memo map intact; keep using it.
        Err(poisoned) => poisoned.into_inner(),
    }
}

// ============================================================================
// PREVIEW
// ============================================================================

/// Interactive preview renders.  Stateless between calls: every update is a
/// full recompute of `(state, canvas, mode)`, so resizes and mode toggles
/// can never leave stale geometry behind.
pub struct PreviewPipeline {
    cache: Arc<Mutex<ImageCache>>,
    compositor: LayerCompositor,
}

impl PreviewPipeline {
    pub fn new(cache: Arc<Mutex<ImageCache>>) -> Self {
        Self {
            cache,
            compositor: LayerCompositor::new(),
        }
    }

    /// Render one frame.  On error the caller keeps its previous surface.
    pub fn update(
        &self,
        state: &mut ThemeState,
        canvas: CanvasSpec,
        flags: ModeFlags,
        fidelity: Fidelity,
    ) -> Result<Surface, RenderError> {
        let mut cache = lock_cache(&self.cache);
        self.compositor
            .render(state, &mut cache, canvas, flags, fidelity)
    }
}

// ============================================================================
// BAKE
// ============================================================================

/// Export bakes: one full-resolution, alpha-correct surface per image slot,
/// always at final fidelity, independent of the on-screen canvas.
pub struct BakePipeline {
    cache: Arc<Mutex<ImageCache>>,
}

impl BakePipeline {
    pub fn new(cache: Arc<Mutex<ImageCache>>) -> Self {
        Self { cache }
    }

    /// Fixed output resolution for `slot`.
    pub fn bake_size(slot: ImageSlot) -> Size {
        match slot {
            ImageSlot::FrameImage | ImageSlot::FrameImageIncognito => BAKE_FRAME_SIZE,
            ImageSlot::BackgroundImage => BAKE_BACKGROUND_SIZE,
        }
    }

    /// Bake one exportable slot.  `None` when the slot has no bound source
    /// or the source cannot be decoded — the packaging layer then omits the
    /// asset from the archive.
    pub fn bake(&self, state: &mut ThemeState, slot: ImageSlot) -> Option<Surface> {
        let binding = state.binding_mut(slot);
        let path = binding.source_path.clone()?;

        let image = match &binding.cached {
            Some(img) => img.clone(),
            None => match lock_cache(&self.cache).get(&path) {
                Ok(img) => {
                    binding.cached = Some(img.clone());
                    img
                }
                Err(_) => return None,
            },
        };

        let params = Placement {
            scale: binding.scale,
            offset_x: binding.offset_x,
            offset_y: binding.offset_y,
        };
        let target = Self::bake_size(slot);
        let placed = placement::resolve(
            Size::new(image.width(), image.height()),
            target,
            params,
            binding.placement,
        )?;

        let mut surface = Surface::new(target.width, target.height);
        compositor::blit_placed(
            &mut surface,
            &image,
            &placed,
            (0, 0),
            Rect::new(0, 0, target.width, target.height),
            Fidelity::Final.to_filter(),
        );

        log_info!(
            "baked {} at {}x{}",
            slot.label(),
            target.width,
            target.height
        );
        Some(surface)
    }
}
