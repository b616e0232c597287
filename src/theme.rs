use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::placement::{AnchorMode, FitMode, PlacementPolicy};

/// Smallest scale a binding may hold; write paths clamp to this so the
/// placement resolver never sees a non-positive scale.
pub const MIN_SCALE: f32 = 0.01;

// ============================================================================
// COLOR
// ============================================================================

/// 8-bit RGBA color, the engine-internal representation.
/// Export/manifest representations (0–1 alpha) are derived via
/// [`Rgba8::to_manifest_rgba`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba8 {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const TRANSPARENT: Self = Self::new(0, 0, 0, 0);

    /// Darker variant, factor in percent (Qt convention: 108 ≈ 8% darker).
    /// Alpha is preserved.
    pub fn darker(self, factor: u32) -> Self {
        let f = factor.max(1);
        Self {
            r: (self.r as u32 * 100 / f).min(255) as u8,
            g: (self.g as u32 * 100 / f).min(255) as u8,
            b: (self.b as u32 * 100 / f).min(255) as u8,
            a: self.a,
        }
    }

    /// Lighter variant, factor in percent (Qt convention: 130 ≈ 30% lighter).
    /// Alpha is preserved.
    pub fn lighter(self, factor: u32) -> Self {
        Self {
            r: (self.r as u32 * factor / 100).min(255) as u8,
            g: (self.g as u32 * factor / 100).min(255) as u8,
            b: (self.b as u32 * factor / 100).min(255) as u8,
            a: self.a,
        }
    }

    pub fn to_pixel(self) -> Rgba<u8> {
        Rgba([self.r, self.g, self.b, self.a])
    }

    /// Manifest form: RGB channels 0–255, alpha 0–1 rounded to 2 decimals.
    pub fn to_manifest_rgba(self) -> (u8, u8, u8, f32) {
        let a = (self.a as f32 / 255.0 * 100.0).round() / 100.0;
        (self.r, self.g, self.b, a)
    }
}

// ============================================================================
// SLOT KEYS
// ============================================================================

/// Every color slot the chrome layout knows about.  A closed enum so a typo'd
/// key is a compile error, not a silently missing layer.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ColorSlot {
    Frame,
    FrameIncognito,
    TabActive,
    TabInactive,
    TabInactiveIncognito,
    Toolbar,
    TabText,
    ToolbarText,
    BookmarkText,
}

impl ColorSlot {
    pub fn all() -> &'static [ColorSlot] {
        &[
            ColorSlot::Frame,
            ColorSlot::FrameIncognito,
            ColorSlot::TabActive,
            ColorSlot::TabInactive,
            ColorSlot::TabInactiveIncognito,
            ColorSlot::Toolbar,
            ColorSlot::TabText,
            ColorSlot::ToolbarText,
            ColorSlot::BookmarkText,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            ColorSlot::Frame => "Frame",
            ColorSlot::FrameIncognito => "Incognito Frame",
            ColorSlot::TabActive => "Active Tab",
            ColorSlot::TabInactive => "Inactive Tab",
            ColorSlot::TabInactiveIncognito => "Incognito Inactive Tab",
            ColorSlot::Toolbar => "Toolbar",
            ColorSlot::TabText => "Tab Text",
            ColorSlot::ToolbarText => "Toolbar Text",
            ColorSlot::BookmarkText => "Bookmark Text",
        }
    }

    /// Stock palette the editor starts from.
    pub fn default_color(&self) -> Rgba8 {
        match self {
            ColorSlot::Frame => Rgba8::opaque(60, 180, 120),
            ColorSlot::FrameIncognito => Rgba8::opaque(40, 40, 50),
            ColorSlot::TabActive => Rgba8::opaque(40, 40, 40),
            ColorSlot::TabInactive => Rgba8::opaque(120, 120, 120),
            ColorSlot::TabInactiveIncognito => Rgba8::opaque(70, 70, 80),
            ColorSlot::Toolbar => Rgba8::opaque(32, 32, 32),
            ColorSlot::TabText => Rgba8::opaque(255, 255, 255),
            ColorSlot::ToolbarText => Rgba8::opaque(230, 230, 230),
            ColorSlot::BookmarkText => Rgba8::opaque(200, 200, 200),
        }
    }
}

/// Every image slot the chrome layout knows about.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ImageSlot {
    FrameImage,
    FrameImageIncognito,
    BackgroundImage,
}

impl ImageSlot {
    pub fn all() -> &'static [ImageSlot] {
        &[
            ImageSlot::FrameImage,
            ImageSlot::FrameImageIncognito,
            ImageSlot::BackgroundImage,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            ImageSlot::FrameImage => "Frame Image",
            ImageSlot::FrameImageIncognito => "Incognito Frame Image",
            ImageSlot::BackgroundImage => "Background Image",
        }
    }

    /// Frame-band imagery anchors to the band; full-bleed backgrounds fit
    /// the canvas.
    pub fn default_policy(&self) -> PlacementPolicy {
        match self {
            ImageSlot::FrameImage | ImageSlot::FrameImageIncognito => {
                PlacementPolicy::Anchor(AnchorMode::Top)
            }
            ImageSlot::BackgroundImage => PlacementPolicy::Fit(FitMode::Cover),
        }
    }

    pub fn default_binding(&self) -> ImageBinding {
        ImageBinding {
            source_path: None,
            scale: 1.0,
            offset_x: 0,
            offset_y: 0,
            placement: self.default_policy(),
            cached: None,
        }
    }
}

// ============================================================================
// IMAGE BINDING
// ============================================================================

/// Per-slot image assignment plus its placement parameters.
///
/// `cached` is the decoded form of `source_path`, logically owned by the
/// image cache; it never serializes and every write to `source_path` clears
/// it.  Placement parameters (scale/offset/policy) deliberately do NOT clear
/// it — a slider drag changes geometry, not pixels.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ImageBinding {
    pub source_path: Option<PathBuf>,
    pub scale: f32,
    pub offset_x: i32,
    pub offset_y: i32,
    pub placement: PlacementPolicy,
    #[serde(skip)]
    pub cached: Option<Arc<RgbaImage>>,
}

impl ImageBinding {
    pub fn has_source(&self) -> bool {
        self.source_path.is_some()
    }

    pub fn clear_cached(&mut self) {
        self.cached = None;
    }
}

// ============================================================================
// THEME STATE
// ============================================================================

/// The authoritative, mutable theme document: one color per [`ColorSlot`],
/// one binding per [`ImageSlot`].  Constructed total (every slot present) and
/// mutated one field at a time by the editing UI, or replaced wholesale by
/// preset load / undo / reset.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ThemeState {
    colors: BTreeMap<ColorSlot, Rgba8>,
    images: BTreeMap<ImageSlot, ImageBinding>,
}

impl Default for ThemeState {
    fn default() -> Self {
        Self::new()
    }
}

impl ThemeState {
    pub fn new() -> Self {
        let colors = ColorSlot::all()
            .iter()
            .map(|s| (*s, s.default_color()))
            .collect();
        let images = ImageSlot::all()
            .iter()
            .map(|s| (*s, s.default_binding()))
            .collect();
        Self { colors, images }
    }

    // ---- color API ----------------------------------------------------------

    pub fn color(&self, slot: ColorSlot) -> Rgba8 {
        self.colors
            .get(&slot)
            .copied()
            .unwrap_or_else(|| slot.default_color())
    }

    pub fn set_color(&mut self, slot: ColorSlot, color: Rgba8) {
        self.colors.insert(slot, color);
    }

    // ---- image API ----------------------------------------------------------

    pub fn binding(&mut self, slot: ImageSlot) -> &ImageBinding {
        self.binding_mut(slot)
    }

    pub fn binding_mut(&mut self, slot: ImageSlot) -> &mut ImageBinding {
        self.images
            .entry(slot)
            .or_insert_with(|| slot.default_binding())
    }

    /// Read-only peek; `None` only for a state deserialized from a document
    /// that omitted the slot (treated as the default binding everywhere else).
    pub fn try_binding(&self, slot: ImageSlot) -> Option<&ImageBinding> {
        self.images.get(&slot)
    }

    /// Assign a source image.  Invalidates the cached decode.
    pub fn set_image_path(&mut self, slot: ImageSlot, path: impl Into<PathBuf>) {
        let binding = self.binding_mut(slot);
        binding.source_path = Some(path.into());
        binding.clear_cached();
    }

    /// Remove the image and reset placement parameters to the slot default.
    pub fn clear_image(&mut self, slot: ImageSlot) {
        self.images.insert(slot, slot.default_binding());
    }

    /// Set the user scale factor, clamped to [`MIN_SCALE`].
    pub fn set_scale(&mut self, slot: ImageSlot, scale: f32) {
        self.binding_mut(slot).scale = scale.max(MIN_SCALE);
    }

    pub fn set_offset(&mut self, slot: ImageSlot, offset_x: i32, offset_y: i32) {
        let binding = self.binding_mut(slot);
        binding.offset_x = offset_x;
        binding.offset_y = offset_y;
    }

    pub fn set_placement(&mut self, slot: ImageSlot, placement: PlacementPolicy) {
        self.binding_mut(slot).placement = placement;
    }

    // ---- wholesale replacement ----------------------------------------------

    /// Reset to the stock theme.  Replaces the whole document; nothing is
    /// partially torn down.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Replace the document with a preset.  Slots the preset omits fall back
    /// to their defaults; cached decodes never survive (fresh bindings).
    pub fn apply_preset(&mut self, preset: &ThemePreset) {
        let mut next = Self::new();

        for (slot, rgba) in &preset.colors {
            next.set_color(*slot, Rgba8::new(rgba[0], rgba[1], rgba[2], rgba[3]));
        }

        for (slot, entry) in &preset.images {
            let binding = next.binding_mut(*slot);
            binding.source_path = entry.path.clone();
            binding.scale = entry.scale.max(MIN_SCALE);
            binding.offset_x = entry.offset_x;
            binding.offset_y = entry.offset_y;
            binding.placement = match (slot, entry.anchor, entry.fit) {
                (ImageSlot::BackgroundImage, _, Some(fit)) => PlacementPolicy::Fit(fit),
                (ImageSlot::BackgroundImage, _, None) => slot.default_policy(),
                (_, Some(anchor), _) => PlacementPolicy::Anchor(anchor),
                (_, None, _) => slot.default_policy(),
            };
        }

        *self = next;
    }
}

// ============================================================================
// PRESETS
// ============================================================================

/// Serde document for saved presets.  Mirrors the on-disk JSON the studio
/// writes: per-slot `[r, g, b, a]` color arrays, per-slot image entries with
/// an `anchor` for frame-band slots and a `fit` for the background.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ThemePreset {
    #[serde(default)]
    pub colors: BTreeMap<ColorSlot, [u8; 4]>,
    #[serde(default)]
    pub images: BTreeMap<ImageSlot, ImagePresetEntry>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ImagePresetEntry {
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_preset_scale")]
    pub scale: f32,
    #[serde(default)]
    pub offset_x: i32,
    #[serde(default)]
    pub offset_y: i32,
    #[serde(default)]
    pub anchor: Option<AnchorMode>,
    #[serde(default)]
    pub fit: Option<FitMode>,
}

fn default_preset_scale() -> f32 {
    1.0
}
