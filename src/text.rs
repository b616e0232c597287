//! Glyph layout and rasterization for the chrome labels (tab titles, url,
//! bookmarks).  Single-line only — nothing in the chrome wraps.
//!
//! Fonts come from the host system; when none of the candidate families can
//! be loaded the compositor simply skips text layers, it never fails a
//! render over typography.

use ab_glyph::{point, Font, FontArc, GlyphId, ScaleFont};
use image::RgbaImage;

use crate::compositor::blend_px;
use crate::theme::Rgba8;

/// Families tried in order for the chrome UI face.  The original mockups use
/// Segoe UI; the rest are the usual metric-compatible stand-ins.
const UI_FAMILIES: &[&str] = &["Segoe UI", "DejaVu Sans", "Liberation Sans", "Arial"];

/// Text metrics for one laid-out line.
pub struct LineLayout {
    pub glyphs: Vec<(GlyphId, f32)>,
    pub width: f32,
    pub ascent: f32,
    pub descent: f32,
}

/// Lay out a single line at `font_size`, kerning applied, left-aligned at
/// x = 0.  Returns positioned glyph ids plus the line metrics.
pub fn layout_line(font: &FontArc, text: &str, font_size: f32) -> LineLayout {
    let scaled = font.as_scaled(font_size);
    let ascent = scaled.ascent();
    let descent = scaled.descent();

    let mut glyphs = Vec::with_capacity(text.len());
    let mut cursor_x = 0.0f32;
    let mut last_glyph: Option<GlyphId> = None;

    for ch in text.chars() {
        let glyph_id = font.glyph_id(ch);
        if let Some(prev) = last_glyph {
            cursor_x += scaled.kern(prev, glyph_id);
        }
        glyphs.push((glyph_id, cursor_x));
        cursor_x += scaled.h_advance(glyph_id);
        last_glyph = Some(glyph_id);
    }

    LineLayout {
        glyphs,
        width: cursor_x,
        ascent,
        descent,
    }
}

/// Advance width of `text` at `font_size` without rasterizing.
pub fn measure_line(font: &FontArc, text: &str, font_size: f32) -> f32 {
    layout_line(font, text, font_size).width
}

/// Ascent of the face at `font_size`.
pub fn ascent(font: &FontArc, font_size: f32) -> f32 {
    font.as_scaled(font_size).ascent()
}

/// Baseline y that vertically centers a line inside a band `[top, top + h)`,
/// matching `(h + ascent - descent) / 2` text centering.
pub fn centered_baseline(font: &FontArc, font_size: f32, top: f32, height: f32) -> f32 {
    let scaled = font.as_scaled(font_size);
    top + (height + scaled.ascent() - scaled.descent()) / 2.0
}

/// Rasterize one line into `surface` with the pen at `(origin_x, baseline_y)`.
/// Glyph coverage is alpha-blended source-over; pixels outside the surface
/// are clipped.
pub fn draw_line(
    surface: &mut RgbaImage,
    font: &FontArc,
    text: &str,
    font_size: f32,
    origin_x: f32,
    baseline_y: f32,
    color: Rgba8,
) {
    let layout = layout_line(font, text, font_size);
    let (surf_w, surf_h) = (surface.width() as i32, surface.height() as i32);
    let pixel = color.to_pixel();

    for (glyph_id, gx) in layout.glyphs {
        let glyph = glyph_id.with_scale_and_position(
            font_size,
            point(origin_x + gx, baseline_y),
        );
        let Some(outlined) = font.outline_glyph(glyph) else {
            continue;
        };
        let bounds = outlined.px_bounds();
        let base_x = bounds.min.x as i32;
        let base_y = bounds.min.y as i32;

        outlined.draw(|px, py, cov| {
            if cov <= 0.001 {
                return;
            }
            let x = base_x + px as i32;
            let y = base_y + py as i32;
            if x < 0 || y < 0 || x >= surf_w || y >= surf_h {
                return;
            }
            let mut top = pixel;
            top[3] = (top[3] as f32 * cov.min(1.0)).round() as u8;
            let base = *surface.get_pixel(x as u32, y as u32);
            surface.put_pixel(x as u32, y as u32, blend_px(base, top));
        });
    }
}

/// Load the chrome UI face from the system, trying [`UI_FAMILIES`] in order
/// and falling back to the platform's generic sans-serif.
/// `weight` is a CSS-style weight value (400=Regular, 700=Bold).
pub fn load_ui_font(weight: u16) -> Option<FontArc> {
    use font_kit::family_name::FamilyName;
    use font_kit::properties::{Properties, Weight};
    use font_kit::source::SystemSource;

    let mut props = Properties::new();
    props.weight = Weight(weight as f32);

    let mut families: Vec<FamilyName> = UI_FAMILIES
        .iter()
        .map(|f| FamilyName::Title((*f).to_string()))
        .collect();
    families.push(FamilyName::SansSerif);

    let source = SystemSource::new();
    let handle = source.select_best_match(&families, &props).ok()?;

    let font_data = handle.load().ok()?;
    let font_data_copy = font_data.copy_font_data()?;
    let bytes: Vec<u8> = (*font_data_copy).clone();
    FontArc::try_from_vec(bytes).ok()
}
