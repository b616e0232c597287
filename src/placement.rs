//! Placement resolution — pure math from (image size, target size, user
//! parameters) to a draw rectangle and source crop.  Both the interactive
//! preview and the export bake call through here, which is what keeps the
//! two renderings geometrically identical.

use serde::{Deserialize, Serialize};

use crate::theme::MIN_SCALE;

// ============================================================================
// GEOMETRY
// ============================================================================

/// Pixel dimensions of an image or render target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Axis-aligned pixel rectangle.  The origin may be negative: a draw rect
/// centered on a smaller canvas legitimately starts above/left of it and is
/// clipped at blit time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn right(&self) -> i32 {
        self.x + self.width as i32
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height as i32
    }
}

// ============================================================================
// POLICIES
// ============================================================================

/// Vertical alignment for banner-style imagery inside a fixed-height band.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnchorMode {
    #[default]
    Top,
    Center,
    Bottom,
}

impl AnchorMode {
    pub fn all() -> &'static [AnchorMode] {
        &[AnchorMode::Top, AnchorMode::Center, AnchorMode::Bottom]
    }

    pub fn label(&self) -> &'static str {
        match self {
            AnchorMode::Top => "top",
            AnchorMode::Center => "center",
            AnchorMode::Bottom => "bottom",
        }
    }
}

/// Fit rule for full-bleed background imagery.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitMode {
    #[default]
    Cover,
    Contain,
    Original,
}

impl FitMode {
    pub fn all() -> &'static [FitMode] {
        &[FitMode::Cover, FitMode::Contain, FitMode::Original]
    }

    pub fn label(&self) -> &'static str {
        match self {
            FitMode::Cover => "cover",
            FitMode::Contain => "contain",
            FitMode::Original => "original",
        }
    }
}

/// Which placement family a slot uses.  Frame-band slots anchor; the
/// background fits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementPolicy {
    Anchor(AnchorMode),
    Fit(FitMode),
}

/// User-controlled placement parameters, read out of an image binding.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    pub scale: f32,
    pub offset_x: i32,
    pub offset_y: i32,
}

/// Resolved geometry for one image layer.  Ephemeral — recomputed on every
/// render, never stored.
///
/// `source_crop` is expressed in *scaled-image* coordinates: the blitter
/// resamples the decoded source to `scaled_size` first, then copies
/// `source_crop` to `draw_rect`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlacementResult {
    pub draw_rect: Rect,
    pub source_crop: Rect,
    pub scaled_size: Size,
}

// ============================================================================
// RESOLUTION
// ============================================================================

/// Dispatch on the slot's policy.  `None` means the layer has nothing to
/// draw (zero-dimension source, e.g. a corrupt decode).
pub fn resolve(
    image: Size,
    target: Size,
    params: Placement,
    policy: PlacementPolicy,
) -> Option<PlacementResult> {
    match policy {
        PlacementPolicy::Anchor(anchor) => resolve_anchor(image, target, params, anchor),
        PlacementPolicy::Fit(fit) => resolve_fit(image, target, params, fit),
    }
}

/// Banner placement inside a fixed-height band.
///
/// The scaled image is pinned vertically by the anchor (clamped so the crop
/// origin is never negative), then displaced by `offset_y`.  Horizontally a
/// narrow image is centered and then displaced; a wide image is cropped from
/// the left with `offset_x` as the crop origin.  The asymmetry is inherited
/// behavior: small images center instead of pinning to a corner.
pub fn resolve_anchor(
    image: Size,
    band: Size,
    params: Placement,
    anchor: AnchorMode,
) -> Option<PlacementResult> {
    if image.is_empty() || band.is_empty() {
        return None;
    }

    let scale = params.scale.max(MIN_SCALE);
    let scaled_w = ((image.width as f64 * scale as f64).round() as i64).max(1);
    let scaled_h = ((image.height as f64 * scale as f64).round() as i64).max(1);
    let band_w = band.width as i64;
    let band_h = band.height as i64;

    let anchor_y = match anchor {
        AnchorMode::Top => 0,
        AnchorMode::Center => ((scaled_h - band_h) / 2).max(0),
        AnchorMode::Bottom => (scaled_h - band_h).max(0),
    };
    let src_y = (anchor_y + params.offset_y as i64).max(0);

    let (src_x, dst_x) = if scaled_w < band_w {
        // Narrow image: center in the band, then displace.
        (0, (band_w - scaled_w) / 2 + params.offset_x as i64)
    } else {
        // Wide image: crop from the left, offset moves the crop window.
        ((params.offset_x as i64).max(0), 0)
    };

    let crop_w = band_w.min(scaled_w - src_x).max(0) as u32;
    let crop_h = band_h.min(scaled_h - src_y).max(0) as u32;

    Some(PlacementResult {
        draw_rect: Rect::new(dst_x as i32, 0, crop_w, crop_h),
        source_crop: Rect::new(src_x as i32, src_y as i32, crop_w, crop_h),
        scaled_size: Size::new(scaled_w as u32, scaled_h as u32),
    })
}

/// Full-bleed placement against the whole canvas.
///
/// `cover` scales by `max(canvas_w/img_w, canvas_h/img_h)`, `contain` by the
/// `min` rule, `original` applies no fit-derived scale.  The explicit user
/// scale multiplies the fit scale; the result is centered, then displaced by
/// the offsets.  The draw rect may extend past the canvas — blitting clips.
pub fn resolve_fit(
    image: Size,
    canvas: Size,
    params: Placement,
    fit: FitMode,
) -> Option<PlacementResult> {
    if image.is_empty() || canvas.is_empty() {
        return None;
    }

    let user_scale = params.scale.max(MIN_SCALE) as f64;
    let iw = image.width as f64;
    let ih = image.height as f64;

    let fit_scale = match fit {
        FitMode::Cover => (canvas.width as f64 / iw).max(canvas.height as f64 / ih),
        FitMode::Contain => (canvas.width as f64 / iw).min(canvas.height as f64 / ih),
        FitMode::Original => 1.0,
    };

    let scaled_w = ((iw * fit_scale * user_scale).round() as i64).max(1);
    let scaled_h = ((ih * fit_scale * user_scale).round() as i64).max(1);

    let x = (canvas.width as i64 - scaled_w).div_euclid(2) + params.offset_x as i64;
    let y = (canvas.height as i64 - scaled_h).div_euclid(2) + params.offset_y as i64;

    Some(PlacementResult {
        draw_rect: Rect::new(x as i32, y as i32, scaled_w as u32, scaled_h as u32),
        source_crop: Rect::new(0, 0, scaled_w as u32, scaled_h as u32),
        scaled_size: Size::new(scaled_w as u32, scaled_h as u32),
    })
}
