use mandelpan_core::{iterations_at, shade_row, Viewport, BYTES_PER_PIXEL};

/// Shade every row of a raster sequentially.
fn render_grid(viewport: &Viewport, width: u32, height: u32) -> Vec<u8> {
    let stride = width as usize * BYTES_PER_PIXEL;
    let mut pixels = vec![0u8; stride * height as usize];
    for (py, row) in pixels.chunks_exact_mut(stride).enumerate() {
        shade_row(row, py as u32, width, height, viewport);
    }
    pixels
}

#[test]
fn headless_render_has_inside_and_outside_points() {
    let viewport = Viewport::default();
    let (w, h) = (100, 80);

    let mut inside = 0;
    let mut outside = 0;
    for py in 0..h {
        for px in 0..w {
            let n = iterations_at(px, py, w, h, &viewport);
            assert!(n <= viewport.max_iterations);
            if n == viewport.max_iterations {
                inside += 1;
            } else {
                outside += 1;
            }
        }
    }

    assert!(inside > 0, "should have some points in the set");
    assert!(outside > 0, "should have some escaped points");
    assert_eq!(inside + outside, 8_000);
}

#[test]
fn headless_render_is_deterministic() {
    let viewport = Viewport::new(-0.745, 0.11, 40.0, 800).unwrap();

    let run1 = render_grid(&viewport, 80, 60);
    let run2 = render_grid(&viewport, 80, 60);

    assert_eq!(run1, run2, "two identical renders must produce identical bytes");
}

#[test]
fn iteration_bound_changes_interior_color_only_where_unescaped() {
    let low = Viewport::default().with_max_iterations(50).unwrap();
    let high = Viewport::default().with_max_iterations(500).unwrap();

    // Far outside the set, both bounds see the same escape.
    assert_eq!(
        iterations_at(0, 0, 64, 64, &low),
        iterations_at(0, 0, 64, 64, &high)
    );
    // The centre never escapes, so it reports each bound.
    assert_eq!(iterations_at(32, 32, 64, 64, &low), 50);
    assert_eq!(iterations_at(32, 32, 64, 64, &high), 500);
}
