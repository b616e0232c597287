//! Mode resolution — maps a logical editing target to the concrete slot that
//! backs it under the active mode flags.  The editor and the compositor both
//! call through here; giving each its own mapping is exactly the divergence
//! bug this module exists to prevent.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::theme::{ColorSlot, ImageSlot, Rgba8, ThemeState};

/// Active mode toggles.  Today that is only incognito; alternate skin styles
/// slot in here the same way.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeFlags {
    pub incognito: bool,
}

impl ModeFlags {
    pub const NORMAL: Self = Self { incognito: false };
    pub const INCOGNITO: Self = Self { incognito: true };
}

/// Concrete color slot for a logical target.  Unmapped targets resolve to
/// themselves.
pub fn resolve_color(slot: ColorSlot, flags: ModeFlags) -> ColorSlot {
    if !flags.incognito {
        return slot;
    }
    match slot {
        ColorSlot::Frame => ColorSlot::FrameIncognito,
        ColorSlot::TabInactive => ColorSlot::TabInactiveIncognito,
        other => other,
    }
}

/// Concrete image slot for a logical target.
pub fn resolve_image(slot: ImageSlot, flags: ModeFlags) -> ImageSlot {
    if !flags.incognito {
        return slot;
    }
    match slot {
        ImageSlot::FrameImage => ImageSlot::FrameImageIncognito,
        other => other,
    }
}

/// Incognito windows never show the new-tab background layer.
pub fn background_hidden(flags: ModeFlags) -> bool {
    flags.incognito
}

/// The logical color targets a user edits (mode-variant slots are reached
/// through these, never addressed directly).
pub fn logical_color_targets() -> &'static [ColorSlot] {
    &[
        ColorSlot::Frame,
        ColorSlot::TabActive,
        ColorSlot::TabInactive,
        ColorSlot::Toolbar,
        ColorSlot::TabText,
        ColorSlot::ToolbarText,
        ColorSlot::BookmarkText,
    ]
}

/// Every logical target resolved to its concrete color under `flags` — the
/// table the packaging collaborator writes into the manifest.
pub fn resolved_palette(state: &ThemeState, flags: ModeFlags) -> BTreeMap<ColorSlot, Rgba8> {
    logical_color_targets()
        .iter()
        .map(|slot| (*slot, state.color(resolve_color(*slot, flags))))
        .collect()
}
