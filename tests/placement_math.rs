//! Resolver properties exercised through the public API.

use chromaskin::placement::{
    AnchorMode, FitMode, Placement, PlacementPolicy, Size, resolve, resolve_anchor, resolve_fit,
};

fn params(scale: f32, ox: i32, oy: i32) -> Placement {
    Placement {
        scale,
        offset_x: ox,
        offset_y: oy,
    }
}

#[test]
fn anchor_top_at_unit_scale_touches_band_origin() {
    // Anchor `top`, offset_y = 0, scale = 1: the image's top edge lands
    // exactly on y = 0 of the band.
    for (iw, ih) in [(2000u32, 400u32), (800, 200), (1000, 120)] {
        let result = resolve_anchor(
            Size::new(iw, ih),
            Size::new(1000, 120),
            params(1.0, 0, 0),
            AnchorMode::Top,
        )
        .unwrap();
        assert_eq!(result.source_crop.y, 0);
        assert_eq!(result.draw_rect.y, 0);
    }
}

#[test]
fn anchor_worked_example() {
    // Canvas 1000x562 with a 120-high frame band; 2000x400 banner (5:1),
    // anchor top, scale 1, no offsets.
    let result = resolve_anchor(
        Size::new(2000, 400),
        Size::new(1000, 120),
        params(1.0, 0, 0),
        AnchorMode::Top,
    )
    .unwrap();
    assert_eq!(result.scaled_size, Size::new(2000, 400));
    assert_eq!(
        (result.source_crop.x, result.source_crop.y),
        (0, 0),
        "crop origin clamps at zero"
    );
    assert_eq!(
        (result.source_crop.width, result.source_crop.height),
        (1000, 120)
    );
    assert_eq!(
        (result.draw_rect.x, result.draw_rect.y, result.draw_rect.width, result.draw_rect.height),
        (0, 0, 1000, 120)
    );
}

#[test]
fn cover_worked_example() {
    // 400x300 into 1000x562: the width factor (2.5) wins over the height
    // factor (~1.873), so the scaled image is 1000x750 and sits at y = -94.
    let result = resolve_fit(
        Size::new(400, 300),
        Size::new(1000, 562),
        params(1.0, 0, 0),
        FitMode::Cover,
    )
    .unwrap();
    assert_eq!(result.scaled_size, Size::new(1000, 750));
    assert_eq!(result.draw_rect.y, (562 - 750) / 2);
}

#[test]
fn cover_always_reaches_both_canvas_edges() {
    let canvases = [Size::new(1000, 562), Size::new(562, 1000), Size::new(777, 777)];
    let images = [
        Size::new(1, 1),
        Size::new(4000, 100),
        Size::new(100, 4000),
        Size::new(641, 479),
    ];
    for canvas in canvases {
        for image in images {
            let result = resolve_fit(image, canvas, params(1.0, 0, 0), FitMode::Cover).unwrap();
            assert!(
                result.scaled_size.width >= canvas.width
                    && result.scaled_size.height >= canvas.height,
                "cover {}x{} into {}x{} gave {}x{}",
                image.width,
                image.height,
                canvas.width,
                canvas.height,
                result.scaled_size.width,
                result.scaled_size.height,
            );
        }
    }
}

#[test]
fn contain_never_exceeds_either_canvas_edge() {
    let canvases = [Size::new(1000, 562), Size::new(562, 1000)];
    let images = [Size::new(4000, 100), Size::new(100, 4000), Size::new(9, 9)];
    for canvas in canvases {
        for image in images {
            let result = resolve_fit(image, canvas, params(1.0, 0, 0), FitMode::Contain).unwrap();
            assert!(result.scaled_size.width <= canvas.width);
            assert!(result.scaled_size.height <= canvas.height);
        }
    }
}

#[test]
fn cover_draw_rect_has_area_for_any_positive_scale() {
    for scale in [0.01f32, 0.33, 1.0, 2.7, 10.0] {
        for offset in [-2000, 0, 2000] {
            let result = resolve(
                Size::new(640, 480),
                Size::new(1000, 562),
                params(scale, offset, -offset),
                PlacementPolicy::Fit(FitMode::Cover),
            )
            .unwrap();
            assert!(result.draw_rect.width > 0 && result.draw_rect.height > 0);
        }
    }
}

#[test]
fn resolver_is_pure() {
    let a = resolve(
        Size::new(400, 300),
        Size::new(1000, 562),
        params(1.3, 17, -4),
        PlacementPolicy::Fit(FitMode::Cover),
    );
    let b = resolve(
        Size::new(400, 300),
        Size::new(1000, 562),
        params(1.3, 17, -4),
        PlacementPolicy::Fit(FitMode::Cover),
    );
    assert_eq!(a, b);
}

#[test]
fn zero_size_image_short_circuits() {
    for policy in [
        PlacementPolicy::Anchor(AnchorMode::Center),
        PlacementPolicy::Fit(FitMode::Contain),
    ] {
        assert!(resolve(Size::new(0, 0), Size::new(1000, 562), params(1.0, 0, 0), policy).is_none());
    }
}
