//! Pipeline-level rendering contracts: idempotence, fidelity geometry,
//! mode remapping, decode-failure isolation, bake independence.

use std::path::PathBuf;

use image::{Rgba, RgbaImage};
use sha2::{Digest, Sha256};

use chromaskin::placement::{self, Placement, PlacementPolicy, Size};
use chromaskin::{
    BakePipeline, CanvasSpec, ChromeMetrics, ColorSlot, Fidelity, FitMode, ImageSlot, ModeFlags,
    PreviewPipeline, Surface, ThemeState, shared_cache,
};

fn digest(surface: &Surface) -> String {
    hex::encode(Sha256::digest(surface.as_raw()))
}

fn temp_png(name: &str, img: &RgbaImage) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "chromaskin_it_{}_{}",
        std::process::id(),
        name
    ));
    img.save(&path).expect("write fixture png");
    path
}

/// A 4x4 checkerboard; resampling filters visibly disagree on it.
fn checkerboard() -> RgbaImage {
    RgbaImage::from_fn(4, 4, |x, y| {
        if (x + y) % 2 == 0 {
            Rgba([255, 255, 255, 255])
        } else {
            Rgba([0, 0, 0, 255])
        }
    })
}

#[test]
fn same_inputs_render_byte_identical_surfaces() {
    let preview = PreviewPipeline::new(shared_cache());
    let mut state = ThemeState::new();
    let canvas = CanvasSpec::new(640, 360);

    let first = preview
        .update(&mut state, canvas, ModeFlags::NORMAL, Fidelity::Final)
        .unwrap();
    let second = preview
        .update(&mut state, canvas, ModeFlags::NORMAL, Fidelity::Final)
        .unwrap();
    assert_eq!(digest(&first), digest(&second));
}

#[test]
fn fidelity_changes_pixels_but_never_geometry() {
    let path = temp_png("checker.png", &checkerboard());
    let preview = PreviewPipeline::new(shared_cache());
    let mut state = ThemeState::new();
    state.set_image_path(ImageSlot::BackgroundImage, &path);
    let canvas = CanvasSpec::new(320, 180);

    let fast = preview
        .update(&mut state, canvas, ModeFlags::NORMAL, Fidelity::Fast)
        .unwrap();
    let fin = preview
        .update(&mut state, canvas, ModeFlags::NORMAL, Fidelity::Final)
        .unwrap();

    // A 4x4 checkerboard blown up to cover the canvas: nearest-neighbour and
    // Lanczos cannot agree on the pixels...
    assert_ne!(digest(&fast), digest(&fin));

    // ...but the resolved geometry is fidelity-independent by construction.
    let binding = state.binding(ImageSlot::BackgroundImage);
    let placed = placement::resolve(
        Size::new(4, 4),
        canvas.size(),
        Placement {
            scale: binding.scale,
            offset_x: binding.offset_x,
            offset_y: binding.offset_y,
        },
        binding.placement,
    )
    .unwrap();
    let placed_again = placement::resolve(
        Size::new(4, 4),
        canvas.size(),
        Placement {
            scale: binding.scale,
            offset_x: binding.offset_x,
            offset_y: binding.offset_y,
        },
        binding.placement,
    )
    .unwrap();
    assert_eq!(placed, placed_again);
    std::fs::remove_file(&path).ok();
}

#[test]
fn incognito_swaps_frame_but_not_toolbar() {
    let preview = PreviewPipeline::new(shared_cache());
    let mut state = ThemeState::new();
    let canvas = CanvasSpec::DEFAULT;
    let m = ChromeMetrics::for_canvas(canvas);

    let normal = preview
        .update(&mut state, canvas, ModeFlags::NORMAL, Fidelity::Fast)
        .unwrap();
    let incog = preview
        .update(&mut state, canvas, ModeFlags::INCOGNITO, Fidelity::Fast)
        .unwrap();

    let frame_px = (4u32, m.frame_h / 2);
    let n = ColorSlot::Frame.default_color();
    let i = ColorSlot::FrameIncognito.default_color();
    assert_eq!(
        *normal.get_pixel(frame_px.0, frame_px.1),
        Rgba([n.r, n.g, n.b, n.a])
    );
    assert_eq!(
        *incog.get_pixel(frame_px.0, frame_px.1),
        Rgba([i.r, i.g, i.b, i.a])
    );

    // Toolbar is not a mode-variant slot: identical pixels either way.
    let toolbar_px = (4u32, m.toolbar_y() + m.toolbar_h / 2);
    assert_eq!(
        normal.get_pixel(toolbar_px.0, toolbar_px.1),
        incog.get_pixel(toolbar_px.0, toolbar_px.1)
    );
}

#[test]
fn incognito_hides_the_background_image() {
    let img = RgbaImage::from_pixel(8, 8, Rgba([10, 200, 10, 255]));
    let path = temp_png("bg_incog.png", &img);
    let preview = PreviewPipeline::new(shared_cache());
    let mut state = ThemeState::new();
    state.set_image_path(ImageSlot::BackgroundImage, &path);
    let canvas = CanvasSpec::new(400, 225);

    let normal = preview
        .update(&mut state, canvas, ModeFlags::NORMAL, Fidelity::Fast)
        .unwrap();
    let incog = preview
        .update(&mut state, canvas, ModeFlags::INCOGNITO, Fidelity::Fast)
        .unwrap();

    // Bottom edge sits below all chrome: image pixels in normal mode,
    // untouched transparency in incognito.
    assert_eq!(normal.get_pixel(399, 224)[3], 255);
    assert_eq!(incog.get_pixel(399, 224)[3], 0);
    std::fs::remove_file(&path).ok();
}

#[test]
fn failed_decode_skips_the_layer_and_nothing_else() {
    let preview = PreviewPipeline::new(shared_cache());
    let canvas = CanvasSpec::new(640, 360);

    let mut broken = ThemeState::new();
    broken.set_image_path(ImageSlot::BackgroundImage, "/no/such/file.png");
    let with_broken = preview
        .update(&mut broken, canvas, ModeFlags::NORMAL, Fidelity::Final)
        .unwrap();

    let mut clean = ThemeState::new();
    let without = preview
        .update(&mut clean, canvas, ModeFlags::NORMAL, Fidelity::Final)
        .unwrap();

    assert_eq!(digest(&with_broken), digest(&without));
}

#[test]
fn canvas_resize_between_updates_is_stale_free() {
    let preview = PreviewPipeline::new(shared_cache());
    let mut state = ThemeState::new();

    for (w, h) in [(1600, 900), (300, 200), (1920, 1080), (1600, 900)] {
        let surface = preview
            .update(
                &mut state,
                CanvasSpec::new(w, h),
                ModeFlags::NORMAL,
                Fidelity::Fast,
            )
            .unwrap();
        assert_eq!((surface.width(), surface.height()), (w, h));
    }
}

#[test]
fn bake_is_independent_of_preview_canvas() {
    let path = temp_png("bake_bg.png", &checkerboard());
    let cache = shared_cache();
    let preview = PreviewPipeline::new(cache.clone());
    let bake = BakePipeline::new(cache);

    let mut state = ThemeState::new();
    state.set_image_path(ImageSlot::BackgroundImage, &path);

    preview
        .update(
            &mut state,
            CanvasSpec::new(333, 187),
            ModeFlags::NORMAL,
            Fidelity::Fast,
        )
        .unwrap();
    let first = bake.bake(&mut state, ImageSlot::BackgroundImage).unwrap();

    preview
        .update(
            &mut state,
            CanvasSpec::new(1920, 1080),
            ModeFlags::NORMAL,
            Fidelity::Fast,
        )
        .unwrap();
    let second = bake.bake(&mut state, ImageSlot::BackgroundImage).unwrap();

    assert_eq!(first.width(), 2000);
    assert_eq!(first.height(), 1200);
    assert_eq!(digest(&first), digest(&second));
    std::fs::remove_file(&path).ok();
}

#[test]
fn bake_uses_the_preview_placement_math() {
    // An `original`-fit image smaller than the export canvas: baked centered
    // then displaced, exactly as the resolver places it in the preview.
    let img = RgbaImage::from_pixel(100, 80, Rgba([5, 5, 250, 255]));
    let path = temp_png("bake_orig.png", &img);
    let bake = BakePipeline::new(shared_cache());

    let mut state = ThemeState::new();
    state.set_image_path(ImageSlot::BackgroundImage, &path);
    state.set_placement(
        ImageSlot::BackgroundImage,
        PlacementPolicy::Fit(FitMode::Original),
    );
    state.set_offset(ImageSlot::BackgroundImage, 40, -30);

    let surface = bake.bake(&mut state, ImageSlot::BackgroundImage).unwrap();
    let expected_x = (2000 - 100) / 2 + 40;
    let expected_y = (1200 - 80) / 2 - 30;
    // Inside the placed rect: image pixels.
    assert_eq!(
        *surface.get_pixel(expected_x as u32 + 1, expected_y as u32 + 1),
        Rgba([5, 5, 250, 255])
    );
    // Just outside it: untouched transparency.
    assert_eq!(surface.get_pixel(expected_x as u32 - 2, expected_y as u32 - 2)[3], 0);
    std::fs::remove_file(&path).ok();
}

#[test]
fn frame_band_image_is_clipped_to_the_band() {
    // A tall banner bound to the frame slot must never paint below frame_h.
    let img = RgbaImage::from_pixel(3000, 2000, Rgba([250, 120, 0, 255]));
    let path = temp_png("tall_banner.png", &img);
    let preview = PreviewPipeline::new(shared_cache());
    let mut state = ThemeState::new();
    state.set_image_path(ImageSlot::FrameImage, &path);
    let canvas = CanvasSpec::DEFAULT;
    let m = ChromeMetrics::for_canvas(canvas);

    let surface = preview
        .update(&mut state, canvas, ModeFlags::NORMAL, Fidelity::Fast)
        .unwrap();

    // Inside the band: banner pixels.
    assert_eq!(
        *surface.get_pixel(800, m.frame_h / 2),
        Rgba([250, 120, 0, 255])
    );
    // First row of the tab strip: strip fill, not banner.
    let f = ColorSlot::Frame.default_color().darker(108);
    assert_eq!(
        *surface.get_pixel(5, m.frame_h + 1),
        Rgba([f.r, f.g, f.b, f.a])
    );
    std::fs::remove_file(&path).ok();
}
