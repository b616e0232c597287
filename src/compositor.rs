//! Layer compositing — turns a theme document into one flattened surface.
//!
//! The layer stack is fixed; only the *sources* (colors/images) vary, and
//! every source is looked up through the mode resolver so normal and
//! incognito renders share this code path.  Geometry comes exclusively from
//! the placement resolver: the fidelity tier changes resampling filters and
//! shape anti-aliasing, never a rectangle.

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use rayon::prelude::*;
use thiserror::Error;

use crate::cache::ImageCache;
use crate::mode::{self, ModeFlags};
use crate::placement::{self, Placement, PlacementResult, Rect, Size};
use crate::text;
use crate::theme::{ColorSlot, ImageSlot, Rgba8, ThemeState};

/// A flattened render target.  Plain RGBA8, straight (un-premultiplied) alpha.
pub type Surface = RgbaImage;

/// Labels drawn into the mock chrome.
const TAB_INACTIVE_LABEL: &str = "Inactive";
const TAB_ACTIVE_LABEL: &str = "Active Tab";
const URL_TEXT: &str = "https://example.com";
const BOOKMARK_LABELS: &[&str] = &["Google", "GitHub", "Docs"];
const INACTIVE_TAB_COUNT: u32 = 2;

// ============================================================================
// CANVAS & ERRORS
// ============================================================================

/// Resolution of the render target.  Owned by the preview surface and free to
/// change between renders without touching theme state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CanvasSpec {
    pub width: u32,
    pub height: u32,
}

impl CanvasSpec {
    /// The studio's logical preview canvas.
    pub const DEFAULT: Self = Self {
        width: 1600,
        height: 900,
    };

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn size(self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn validate(self) -> Result<(), RenderError> {
        if self.width == 0 || self.height == 0 {
            return Err(RenderError::ZeroAreaCanvas {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }
}

impl Default for CanvasSpec {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Fatal-to-this-call render failures.  The caller keeps its previous
/// surface; nothing here tears down the pipeline.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("zero-area canvas: {width}x{height}")]
    ZeroAreaCanvas { width: u32, height: u32 },
}

// ============================================================================
// FIDELITY
// ============================================================================

/// Rendering quality tier.  `Fast` is cheap enough for every pointer-drag
/// update; `Final` is the export-equivalent pass issued once interaction
/// settles.  Both produce identical geometry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Fidelity {
    Fast,
    #[default]
    Final,
}

impl Fidelity {
    pub fn all() -> &'static [Fidelity] {
        &[Fidelity::Fast, Fidelity::Final]
    }

    /// Resampling filter for scaled image blits.
    pub fn to_filter(self) -> FilterType {
        match self {
            Fidelity::Fast => FilterType::Nearest,
            Fidelity::Final => FilterType::Lanczos3,
        }
    }

    /// Whether vector shapes get coverage anti-aliasing.
    pub fn anti_alias(self) -> bool {
        matches!(self, Fidelity::Final)
    }
}

// ============================================================================
// CHROME METRICS
// ============================================================================

/// Layout constants of the mock chrome, in canvas pixels.
///
/// The reference values are taken at a 900-line canvas and scale linearly
/// with canvas height, so the chrome stays proportioned at any resolution.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChromeMetrics {
    pub frame_h: u32,
    pub tabs_h: u32,
    pub toolbar_h: u32,
    pub tab_w: u32,
    pub tab_gap: u32,
    pub tab_margin_x: u32,
    pub tab_inset_y: u32,
    pub tab_radius: f32,
    pub tab_label_inset: f32,
    pub font_size: f32,
    pub nav_back_x: f32,
    pub nav_fwd_x: f32,
    pub nav_half: f32,
    pub omnibox_x: u32,
    pub omnibox_margin_right: u32,
    pub omnibox_inset_y: u32,
    pub omnibox_text_inset: f32,
    pub bookmark_x: f32,
    pub bookmark_pitch: f32,
    pub bookmark_top_pad: f32,
}

impl ChromeMetrics {
    pub const REFERENCE_HEIGHT: u32 = 900;

    pub fn for_canvas(canvas: CanvasSpec) -> Self {
        let k = canvas.height as f32 / Self::REFERENCE_HEIGHT as f32;
        let d = |v: f32| (v * k).round().max(1.0) as u32;
        let f = |v: f32| (v * k).max(0.5);
        Self {
            frame_h: d(56.0),
            tabs_h: d(38.0),
            toolbar_h: d(44.0),
            tab_w: d(140.0),
            tab_gap: d(10.0),
            tab_margin_x: d(20.0),
            tab_inset_y: d(4.0),
            tab_radius: f(8.0),
            tab_label_inset: f(14.0),
            font_size: f(12.0),
            nav_back_x: f(24.0),
            nav_fwd_x: f(56.0),
            nav_half: f(7.0),
            omnibox_x: d(92.0),
            omnibox_margin_right: d(20.0),
            omnibox_inset_y: d(8.0),
            omnibox_text_inset: f(16.0),
            bookmark_x: f(20.0),
            bookmark_pitch: f(100.0),
            bookmark_top_pad: f(22.0),
        }
    }

    pub fn tabs_y(&self) -> u32 {
        self.frame_h
    }

    pub fn toolbar_y(&self) -> u32 {
        self.frame_h + self.tabs_h
    }

    pub fn content_y(&self) -> u32 {
        self.toolbar_y() + self.toolbar_h
    }

    pub fn tab_h(&self) -> u32 {
        self.tabs_h.saturating_sub(2 * self.tab_inset_y)
    }

    pub fn tab_x(&self, index: u32) -> u32 {
        self.tab_margin_x + index * (self.tab_w + self.tab_gap)
    }

    /// The frame band an anchored image is clipped to.
    pub fn frame_band(&self, canvas: CanvasSpec) -> Rect {
        Rect::new(0, 0, canvas.width, self.frame_h)
    }

    /// Which slot a click at canvas-height `y` starts editing — the same
    /// banding the preview widget uses for section selection.
    pub fn section_at(&self, y: u32) -> ColorSlot {
        if y < self.frame_h {
            ColorSlot::Frame
        } else if y < self.frame_h + self.tabs_h {
            ColorSlot::TabActive
        } else if y < self.content_y() {
            ColorSlot::Toolbar
        } else {
            ColorSlot::BookmarkText
        }
    }
}

// ============================================================================
// LAYER STACK
// ============================================================================

/// One entry of the fixed z-ordered stack.  The active tab draws after the
/// inactive ones so it overlaps the strip boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayerKind {
    BackgroundImage,
    FrameFill,
    FrameImage,
    TabStrip,
    InactiveTabs,
    ActiveTab,
    ToolbarFill,
    NavigationGlyphs,
    Omnibox,
    Bookmarks,
}

pub const LAYER_STACK: &[LayerKind] = &[
    LayerKind::BackgroundImage,
    LayerKind::FrameFill,
    LayerKind::FrameImage,
    LayerKind::TabStrip,
    LayerKind::InactiveTabs,
    LayerKind::ActiveTab,
    LayerKind::ToolbarFill,
    LayerKind::NavigationGlyphs,
    LayerKind::Omnibox,
    LayerKind::Bookmarks,
];

impl LayerKind {
    pub fn z_order(self) -> usize {
        LAYER_STACK.iter().position(|l| *l == self).unwrap_or(0)
    }

    /// Visibility under the active mode flags.
    pub fn is_visible(self, flags: ModeFlags) -> bool {
        match self {
            LayerKind::BackgroundImage => !mode::background_hidden(flags),
            _ => true,
        }
    }
}

// ============================================================================
// COMPOSITOR
// ============================================================================

/// Draws the full chrome stack.  Holds the UI fonts; everything else is
/// passed per call so one compositor serves any number of states/canvases.
pub struct LayerCompositor {
    font_regular: Option<ab_glyph::FontArc>,
    font_bold: Option<ab_glyph::FontArc>,
}

impl Default for LayerCompositor {
    fn default() -> Self {
        Self::new()
    }
}

impl LayerCompositor {
    pub fn new() -> Self {
        let font_regular = text::load_ui_font(400);
        let font_bold = text::load_ui_font(700);
        if font_regular.is_none() {
            log_warn!("no UI font available; text layers will be skipped");
        }
        Self {
            font_regular,
            font_bold,
        }
    }

    /// Render the whole stack into a fresh surface.
    pub fn render(
        &self,
        state: &mut ThemeState,
        cache: &mut ImageCache,
        canvas: CanvasSpec,
        flags: ModeFlags,
        fidelity: Fidelity,
    ) -> Result<Surface, RenderError> {
        canvas.validate()?;
        let m = ChromeMetrics::for_canvas(canvas);
        let mut surface = RgbaImage::new(canvas.width, canvas.height);

        let frame = state.color(mode::resolve_color(ColorSlot::Frame, flags));
        let tab_active = state.color(mode::resolve_color(ColorSlot::TabActive, flags));
        let tab_inactive = state.color(mode::resolve_color(ColorSlot::TabInactive, flags));
        let toolbar = state.color(mode::resolve_color(ColorSlot::Toolbar, flags));
        let tab_text = state.color(mode::resolve_color(ColorSlot::TabText, flags));
        let toolbar_text = state.color(mode::resolve_color(ColorSlot::ToolbarText, flags));
        let bookmark_text = state.color(mode::resolve_color(ColorSlot::BookmarkText, flags));

        for layer in LAYER_STACK {
            if !layer.is_visible(flags) {
                continue;
            }
            match layer {
                LayerKind::BackgroundImage => {
                    let slot = mode::resolve_image(ImageSlot::BackgroundImage, flags);
                    let target = Rect::new(0, 0, canvas.width, canvas.height);
                    self.draw_image_layer(&mut surface, state, cache, slot, target, fidelity);
                }
                LayerKind::FrameFill => {
                    fill_rect(&mut surface, m.frame_band(canvas), frame);
                }
                LayerKind::FrameImage => {
                    let slot = mode::resolve_image(ImageSlot::FrameImage, flags);
                    let target = m.frame_band(canvas);
                    self.draw_image_layer(&mut surface, state, cache, slot, target, fidelity);
                }
                LayerKind::TabStrip => {
                    let strip = Rect::new(0, m.tabs_y() as i32, canvas.width, m.tabs_h);
                    fill_rect(&mut surface, strip, frame.darker(108));
                }
                LayerKind::InactiveTabs => {
                    for i in 0..INACTIVE_TAB_COUNT {
                        self.draw_tab(
                            &mut surface,
                            &m,
                            i,
                            tab_inactive,
                            tab_text,
                            TAB_INACTIVE_LABEL,
                            false,
                            fidelity,
                        );
                    }
                }
                LayerKind::ActiveTab => {
                    self.draw_tab(
                        &mut surface,
                        &m,
                        INACTIVE_TAB_COUNT,
                        tab_active,
                        tab_text,
                        TAB_ACTIVE_LABEL,
                        true,
                        fidelity,
                    );
                }
                LayerKind::ToolbarFill => {
                    let bar = Rect::new(0, m.toolbar_y() as i32, canvas.width, m.toolbar_h);
                    fill_rect(&mut surface, bar, toolbar);
                }
                LayerKind::NavigationGlyphs => {
                    let cy = m.toolbar_y() as f32 + m.toolbar_h as f32 / 2.0;
                    draw_nav_triangle(
                        &mut surface,
                        m.nav_back_x,
                        cy,
                        m.nav_half,
                        true,
                        toolbar_text,
                        fidelity.anti_alias(),
                    );
                    draw_nav_triangle(
                        &mut surface,
                        m.nav_fwd_x,
                        cy,
                        m.nav_half,
                        false,
                        toolbar_text,
                        fidelity.anti_alias(),
                    );
                }
                LayerKind::Omnibox => {
                    self.draw_omnibox(&mut surface, &m, canvas, toolbar, toolbar_text, fidelity);
                }
                LayerKind::Bookmarks => {
                    self.draw_bookmarks(&mut surface, &m, bookmark_text);
                }
            }
        }

        Ok(surface)
    }

    // ---- individual layers --------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    fn draw_tab(
        &self,
        surface: &mut Surface,
        m: &ChromeMetrics,
        index: u32,
        fill: Rgba8,
        label_color: Rgba8,
        label: &str,
        bold: bool,
        fidelity: Fidelity,
    ) {
        let tab_y = m.tabs_y() + m.tab_inset_y;
        let rect = Rect::new(m.tab_x(index) as i32, tab_y as i32, m.tab_w, m.tab_h());
        draw_rounded_rect(surface, rect, m.tab_radius, fill, fidelity.anti_alias());

        let font = if bold {
            self.font_bold.as_ref().or(self.font_regular.as_ref())
        } else {
            self.font_regular.as_ref()
        };
        if let Some(font) = font {
            let baseline =
                text::centered_baseline(font, m.font_size, rect.y as f32, rect.height as f32);
            text::draw_line(
                surface,
                font,
                label,
                m.font_size,
                rect.x as f32 + m.tab_label_inset,
                baseline,
                label_color,
            );
        }
    }

    fn draw_omnibox(
        &self,
        surface: &mut Surface,
        m: &ChromeMetrics,
        canvas: CanvasSpec,
        toolbar: Rgba8,
        toolbar_text: Rgba8,
        fidelity: Fidelity,
    ) {
        let field_h = m.toolbar_h.saturating_sub(2 * m.omnibox_inset_y);
        let field_w = canvas
            .width
            .saturating_sub(m.omnibox_x + m.omnibox_margin_right);
        if field_h == 0 || field_w == 0 {
            return;
        }
        let field = Rect::new(
            m.omnibox_x as i32,
            (m.toolbar_y() + m.omnibox_inset_y) as i32,
            field_w,
            field_h,
        );
        // Pill-shaped field, one tint up from the toolbar.
        draw_rounded_rect(
            surface,
            field,
            field_h as f32 / 2.0,
            toolbar.lighter(130),
            fidelity.anti_alias(),
        );

        if let Some(font) = &self.font_regular {
            let baseline =
                text::centered_baseline(font, m.font_size, field.y as f32, field.height as f32);
            text::draw_line(
                surface,
                font,
                URL_TEXT,
                m.font_size,
                field.x as f32 + m.omnibox_text_inset,
                baseline,
                toolbar_text,
            );
        }
    }

    fn draw_bookmarks(&self, surface: &mut Surface, m: &ChromeMetrics, color: Rgba8) {
        let Some(font) = &self.font_regular else {
            return;
        };
        let baseline =
            m.content_y() as f32 + m.bookmark_top_pad + text::ascent(font, m.font_size);
        let mut x = m.bookmark_x;
        for name in BOOKMARK_LABELS {
            text::draw_line(surface, font, name, m.font_size, x, baseline, color);
            x += m.bookmark_pitch;
        }
    }

    /// Decode (through the shared cache), resolve placement, blit clipped to
    /// `target`.  Any failure means the layer is skipped, never an error.
    fn draw_image_layer(
        &self,
        surface: &mut Surface,
        state: &mut ThemeState,
        cache: &mut ImageCache,
        slot: ImageSlot,
        target: Rect,
        fidelity: Fidelity,
    ) {
        let binding = state.binding_mut(slot);
        let Some(path) = binding.source_path.clone() else {
            return;
        };

        let image = match &binding.cached {
            Some(img) => img.clone(),
            None => match cache.get(&path) {
                Ok(img) => {
                    binding.cached = Some(img.clone());
                    img
                }
                // Failed decode: no image for this slot. Already logged.
                Err(_) => return,
            },
        };

        let params = Placement {
            scale: binding.scale,
            offset_x: binding.offset_x,
            offset_y: binding.offset_y,
        };
        let Some(placed) = placement::resolve(
            Size::new(image.width(), image.height()),
            Size::new(target.width, target.height),
            params,
            binding.placement,
        ) else {
            return;
        };

        blit_placed(
            surface,
            &image,
            &placed,
            (target.x, target.y),
            target,
            fidelity.to_filter(),
        );
    }
}

// ============================================================================
// RASTER PRIMITIVES
// ============================================================================

/// Normal-mode source-over blend of straight-alpha pixels.
pub(crate) fn blend_px(base: Rgba<u8>, top: Rgba<u8>) -> Rgba<u8> {
    // Fast path: fully transparent top pixel — nothing to blend
    if top[3] == 0 {
        return base;
    }
    // Fast path: fully opaque top pixel — just overwrite
    if top[3] == 255 {
        return top;
    }

    let ta = top[3] as f32 / 255.0;
    let ba = base[3] as f32 / 255.0;
    let out_a = ta + ba * (1.0 - ta);
    if out_a <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }

    let mut out = [0u8; 4];
    for c in 0..3 {
        let tc = top[c] as f32 / 255.0;
        let bc = base[c] as f32 / 255.0;
        let oc = (tc * ta + bc * ba * (1.0 - ta)) / out_a;
        out[c] = (oc * 255.0).round().clamp(0.0, 255.0) as u8;
    }
    out[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
    Rgba(out)
}

/// Fill `rect` (clipped to the surface) with `color`, source-over.
fn fill_rect(surface: &mut Surface, rect: Rect, color: Rgba8) {
    let (sw, sh) = (surface.width() as i32, surface.height() as i32);
    let x0 = rect.x.max(0);
    let y0 = rect.y.max(0);
    let x1 = rect.right().min(sw);
    let y1 = rect.bottom().min(sh);
    if x0 >= x1 || y0 >= y1 {
        return;
    }

    let row_bytes = sw as usize * 4;
    let pixel = color.to_pixel();
    let opaque = pixel[3] == 255;
    let buf: &mut [u8] = &mut **surface;

    buf.par_chunks_mut(row_bytes)
        .enumerate()
        .skip(y0 as usize)
        .take((y1 - y0) as usize)
        .for_each(|(_, row)| {
            for x in x0..x1 {
                let idx = x as usize * 4;
                if opaque {
                    row[idx..idx + 4].copy_from_slice(&pixel.0);
                } else {
                    let base = Rgba([row[idx], row[idx + 1], row[idx + 2], row[idx + 3]]);
                    let out = blend_px(base, pixel);
                    row[idx..idx + 4].copy_from_slice(&out.0);
                }
            }
        });
}

fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

fn sdf_box(px: f32, py: f32, hx: f32, hy: f32) -> f32 {
    let dx = px.abs() - hx;
    let dy = py.abs() - hy;
    let outside = (dx.max(0.0) * dx.max(0.0) + dy.max(0.0) * dy.max(0.0)).sqrt();
    let inside = dx.max(dy).min(0.0);
    outside + inside
}

fn sdf_rounded_box(px: f32, py: f32, hx: f32, hy: f32, r: f32) -> f32 {
    let r = r.min(hx).min(hy);
    sdf_box(px, py, hx - r, hy - r) - r
}

/// SDF-coverage fill of a rounded rectangle.
fn draw_rounded_rect(surface: &mut Surface, rect: Rect, radius: f32, color: Rgba8, aa: bool) {
    if rect.is_empty() {
        return;
    }
    let (sw, sh) = (surface.width() as i32, surface.height() as i32);
    // One pixel of padding so AA coverage is not cut off
    let x0 = (rect.x - 1).max(0);
    let y0 = (rect.y - 1).max(0);
    let x1 = (rect.right() + 1).min(sw);
    let y1 = (rect.bottom() + 1).min(sh);
    if x0 >= x1 || y0 >= y1 {
        return;
    }

    let cx = rect.x as f32 + rect.width as f32 / 2.0;
    let cy = rect.y as f32 + rect.height as f32 / 2.0;
    let hx = rect.width as f32 / 2.0;
    let hy = rect.height as f32 / 2.0;

    let row_bytes = sw as usize * 4;
    let pixel = color.to_pixel();
    let buf: &mut [u8] = &mut **surface;

    buf.par_chunks_mut(row_bytes)
        .enumerate()
        .skip(y0 as usize)
        .take((y1 - y0) as usize)
        .for_each(|(y, row)| {
            let py = y as f32 + 0.5 - cy;
            for x in x0..x1 {
                let px = x as f32 + 0.5 - cx;
                let d = sdf_rounded_box(px, py, hx, hy, radius);
                let cov = if aa {
                    smoothstep(0.5, -0.5, d)
                } else if d < 0.0 {
                    1.0
                } else {
                    0.0
                };
                if cov > 0.001 {
                    let idx = x as usize * 4;
                    let mut top = pixel;
                    top[3] = (top[3] as f32 * cov).round().min(255.0) as u8;
                    let base = Rgba([row[idx], row[idx + 1], row[idx + 2], row[idx + 3]]);
                    let out = blend_px(base, top);
                    row[idx..idx + 4].copy_from_slice(&out.0);
                }
            }
        });
}

/// Signed distance to a convex polygon: max over edge half-planes.
/// Vertices in natural (clockwise-on-screen) order.
fn sdf_convex(px: f32, py: f32, verts: &[(f32, f32)]) -> f32 {
    let mut d = f32::MIN;
    for i in 0..verts.len() {
        let (ax, ay) = verts[i];
        let (bx, by) = verts[(i + 1) % verts.len()];
        let ex = bx - ax;
        let ey = by - ay;
        let len = (ex * ex + ey * ey).sqrt().max(1e-6);
        let nx = ey / len;
        let ny = -ex / len;
        d = d.max((px - ax) * nx + (py - ay) * ny);
    }
    d
}

/// Back/forward navigation glyph: a small triangle pointing left or right,
/// centered at `(cx, cy)` with half-extent `half`.
fn draw_nav_triangle(
    surface: &mut Surface,
    cx: f32,
    cy: f32,
    half: f32,
    left: bool,
    color: Rgba8,
    aa: bool,
) {
    let verts: [(f32, f32); 3] = if left {
        [(cx + half, cy - half), (cx + half, cy + half), (cx - half, cy)]
    } else {
        [(cx - half, cy - half), (cx + half, cy), (cx - half, cy + half)]
    };

    let (sw, sh) = (surface.width() as i32, surface.height() as i32);
    let x0 = ((cx - half).floor() as i32 - 1).max(0);
    let y0 = ((cy - half).floor() as i32 - 1).max(0);
    let x1 = ((cx + half).ceil() as i32 + 1).min(sw);
    let y1 = ((cy + half).ceil() as i32 + 1).min(sh);
    if x0 >= x1 || y0 >= y1 {
        return;
    }

    let pixel = color.to_pixel();
    for y in y0..y1 {
        let py = y as f32 + 0.5;
        for x in x0..x1 {
            let px = x as f32 + 0.5;
            let d = sdf_convex(px, py, &verts);
            let cov = if aa {
                smoothstep(0.5, -0.5, d)
            } else if d < 0.0 {
                1.0
            } else {
                0.0
            };
            if cov > 0.001 {
                let mut top = pixel;
                top[3] = (top[3] as f32 * cov).round().min(255.0) as u8;
                let base = *surface.get_pixel(x as u32, y as u32);
                surface.put_pixel(x as u32, y as u32, blend_px(base, top));
            }
        }
    }
}

/// Blit a resolved placement: resample the source to `scaled_size` with
/// `filter`, then copy `source_crop` to `draw_rect` (offset by `origin`),
/// clipped to `clip` and the surface.
pub(crate) fn blit_placed(
    surface: &mut Surface,
    source: &RgbaImage,
    placed: &PlacementResult,
    origin: (i32, i32),
    clip: Rect,
    filter: FilterType,
) {
    if placed.source_crop.is_empty() || placed.scaled_size.is_empty() {
        return;
    }

    let resized;
    let scaled: &RgbaImage = if placed.scaled_size.width == source.width()
        && placed.scaled_size.height == source.height()
    {
        source
    } else {
        resized = imageops::resize(
            source,
            placed.scaled_size.width,
            placed.scaled_size.height,
            filter,
        );
        &resized
    };

    // Crop origin is non-negative by the resolver's contract; clamp the
    // extent to the pixels that actually exist.
    let crop_x = placed.source_crop.x.max(0) as u32;
    let crop_y = placed.source_crop.y.max(0) as u32;
    if crop_x >= scaled.width() || crop_y >= scaled.height() {
        return;
    }
    let crop_w = placed.source_crop.width.min(scaled.width() - crop_x);
    let crop_h = placed.source_crop.height.min(scaled.height() - crop_y);

    let dst_x = origin.0 + placed.draw_rect.x;
    let dst_y = origin.1 + placed.draw_rect.y;
    let (sw, sh) = (surface.width() as i32, surface.height() as i32);
    let x0 = dst_x.max(clip.x).max(0);
    let y0 = dst_y.max(clip.y).max(0);
    let x1 = (dst_x + crop_w as i32).min(clip.right()).min(sw);
    let y1 = (dst_y + crop_h as i32).min(clip.bottom()).min(sh);
    if x0 >= x1 || y0 >= y1 {
        return;
    }

    let row_bytes = sw as usize * 4;
    let buf: &mut [u8] = &mut **surface;

    buf.par_chunks_mut(row_bytes)
        .enumerate()
        .skip(y0 as usize)
        .take((y1 - y0) as usize)
        .for_each(|(y, row)| {
            let sy = crop_y + (y as i32 - dst_y) as u32;
            for x in x0..x1 {
                let sx = crop_x + (x - dst_x) as u32;
                let top = *scaled.get_pixel(sx, sy);
                let idx = x as usize * 4;
                let base = Rgba([row[idx], row[idx + 1], row[idx + 2], row[idx + 3]]);
                let out = blend_px(base, top);
                row[idx..idx + 4].copy_from_slice(&out.0);
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_match_reference_at_900() {
        let m = ChromeMetrics::for_canvas(CanvasSpec::DEFAULT);
        assert_eq!(m.frame_h, 56);
        assert_eq!(m.tabs_h, 38);
        assert_eq!(m.toolbar_h, 44);
        assert_eq!(m.tab_w, 140);
        assert_eq!(m.tab_h(), 30);
        assert_eq!(m.tab_x(0), 20);
        assert_eq!(m.tab_x(2), 20 + 2 * 150);
    }

    #[test]
    fn metrics_scale_with_canvas_height() {
        let m = ChromeMetrics::for_canvas(CanvasSpec::new(800, 450));
        assert_eq!(m.frame_h, 28);
        assert_eq!(m.tabs_h, 19);
        assert_eq!(m.toolbar_h, 22);
    }

    #[test]
    fn section_banding_matches_preview_clicks() {
        let m = ChromeMetrics::for_canvas(CanvasSpec::DEFAULT);
        assert_eq!(m.section_at(0), ColorSlot::Frame);
        assert_eq!(m.section_at(55), ColorSlot::Frame);
        assert_eq!(m.section_at(56), ColorSlot::TabActive);
        assert_eq!(m.section_at(93), ColorSlot::TabActive);
        assert_eq!(m.section_at(94), ColorSlot::Toolbar);
        assert_eq!(m.section_at(137), ColorSlot::Toolbar);
        assert_eq!(m.section_at(138), ColorSlot::BookmarkText);
        assert_eq!(m.section_at(899), ColorSlot::BookmarkText);
    }

    #[test]
    fn zero_area_canvas_is_rejected() {
        assert!(CanvasSpec::new(0, 900).validate().is_err());
        assert!(CanvasSpec::new(1600, 0).validate().is_err());
        assert!(CanvasSpec::new(1, 1).validate().is_ok());
    }

    #[test]
    fn layer_stack_draws_active_tab_after_inactive() {
        assert!(LayerKind::ActiveTab.z_order() > LayerKind::InactiveTabs.z_order());
        assert!(LayerKind::FrameImage.z_order() > LayerKind::FrameFill.z_order());
    }

    #[test]
    fn background_layer_hidden_in_incognito() {
        assert!(LayerKind::BackgroundImage.is_visible(ModeFlags::NORMAL));
        assert!(!LayerKind::BackgroundImage.is_visible(ModeFlags::INCOGNITO));
        assert!(LayerKind::ToolbarFill.is_visible(ModeFlags::INCOGNITO));
    }

    #[test]
    fn blend_opaque_top_overwrites() {
        let base = Rgba([10, 20, 30, 255]);
        let top = Rgba([200, 100, 50, 255]);
        assert_eq!(blend_px(base, top), top);
    }

    #[test]
    fn blend_transparent_top_keeps_base() {
        let base = Rgba([10, 20, 30, 255]);
        assert_eq!(blend_px(base, Rgba([200, 100, 50, 0])), base);
    }

    #[test]
    fn blend_half_alpha_mixes() {
        let base = Rgba([0, 0, 0, 255]);
        let top = Rgba([255, 255, 255, 128]);
        let out = blend_px(base, top);
        assert!(out[0] > 120 && out[0] < 135);
        assert_eq!(out[3], 255);
    }

    #[test]
    fn fill_rect_clips_to_surface() {
        let mut surface = RgbaImage::new(10, 10);
        fill_rect(
            &mut surface,
            Rect::new(-5, -5, 100, 100),
            Rgba8::opaque(255, 0, 0),
        );
        assert_eq!(*surface.get_pixel(0, 0), Rgba([255, 0, 0, 255]));
        assert_eq!(*surface.get_pixel(9, 9), Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn rounded_rect_fills_center_leaves_corner() {
        let mut surface = RgbaImage::new(40, 40);
        draw_rounded_rect(
            &mut surface,
            Rect::new(4, 4, 32, 32),
            12.0,
            Rgba8::opaque(0, 255, 0),
            true,
        );
        assert_eq!(*surface.get_pixel(20, 20), Rgba([0, 255, 0, 255]));
        // The extreme corner of the bounding rect is outside the rounding.
        assert_eq!(surface.get_pixel(4, 4)[3], 0);
    }

    #[test]
    fn render_produces_canvas_sized_surface() {
        let compositor = LayerCompositor::new();
        let mut state = ThemeState::new();
        let mut cache = ImageCache::new();
        let surface = compositor
            .render(
                &mut state,
                &mut cache,
                CanvasSpec::new(400, 225),
                ModeFlags::NORMAL,
                Fidelity::Fast,
            )
            .unwrap();
        assert_eq!((surface.width(), surface.height()), (400, 225));
        // Frame band carries the default frame color.
        let m = ChromeMetrics::for_canvas(CanvasSpec::new(400, 225));
        let px = surface.get_pixel(2, m.frame_h / 2);
        assert_eq!(*px, Rgba([60, 180, 120, 255]));
    }

    #[test]
    fn render_rejects_zero_canvas() {
        let compositor = LayerCompositor::new();
        let mut state = ThemeState::new();
        let mut cache = ImageCache::new();
        let err = compositor
            .render(
                &mut state,
                &mut cache,
                CanvasSpec::new(0, 0),
                ModeFlags::NORMAL,
                Fidelity::Fast,
            )
            .unwrap_err();
        assert!(matches!(err, RenderError::ZeroAreaCanvas { .. }));
    }
}
