//! Canvas drawing against the software backend

use std::cell::RefCell;
use std::rc::Rc;

use cinder_core::{
    Color, GraphicsError, Handedness, IntRect, IntSize, Mat4, Point, Rect, RenderConfig,
};
use cinder_gpu::{
    GraphicContext, PixelBuffer, ProviderStats, SoftwareProvider, Texture2D, TextureFilter,
    TextureFormat, TextureImageYAxis,
};
use cinder_paint::{
    BatchMatrices, BatcherKind, Brush, Canvas, GradientStop, MapMode, Path, RectGradient,
    RenderBatchBuffer, RenderBatcher,
};

const RED: [u8; 4] = [255, 0, 0, 255];
const GREEN: [u8; 4] = [0, 255, 0, 255];
const BLUE: [u8; 4] = [0, 0, 255, 255];
const WHITE: [u8; 4] = [255, 255, 255, 255];
const BLACK: [u8; 4] = [0, 0, 0, 255];

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn context(width: i32, height: i32, y_axis: TextureImageYAxis) -> GraphicContext {
    let size = IntSize::new(width, height);
    let provider = SoftwareProvider::with_y_axis(size, y_axis).unwrap();
    GraphicContext::new(Box::new(provider), size).unwrap()
}

fn canvas_with(width: i32, height: i32, config: RenderConfig) -> Canvas {
    init_tracing();
    let gc = context(width, height, TextureImageYAxis::TopDown);
    let mut canvas = Canvas::new(gc, config).unwrap();
    canvas.clear(Color::BLACK).unwrap();
    reset_stats(canvas.gc());
    canvas
}

fn canvas(width: i32, height: i32) -> Canvas {
    canvas_with(width, height, RenderConfig::default())
}

/// Pools small enough for four line segments per batch
fn small_config() -> RenderConfig {
    RenderConfig {
        vertex_buffer_size: 256,
        ..RenderConfig::default()
    }
}

fn stats(gc: &GraphicContext) -> ProviderStats {
    gc.with_provider::<SoftwareProvider, _>(|p| p.stats()).unwrap()
}

fn reset_stats(gc: &GraphicContext) {
    gc.with_provider_mut::<SoftwareProvider, _>(|p| p.reset_stats())
        .unwrap();
}

fn pixel(canvas: &Canvas, x: i32, y: i32) -> [u8; 4] {
    canvas
        .get_pixeldata(IntRect::new(x, y, 1, 1), TextureFormat::Rgba8)
        .unwrap()
        .pixel_rgba8(0, 0)
}

fn texture_pixel(gc: &GraphicContext, texture: &Texture2D, x: i32, y: i32) -> [u8; 4] {
    gc.with_provider::<SoftwareProvider, _>(|p| {
        p.texture_pixels(texture).map(|pixels| pixels.pixel_rgba8(x, y))
    })
    .flatten()
    .unwrap()
}

fn horizontal_line(y: f32) -> [Point; 2] {
    [Point::new(0.0, y), Point::new(8.0, y)]
}

#[test]
fn test_lines_share_a_draw_until_the_buffer_is_full() {
    let mut canvas = canvas_with(16, 16, small_config());
    for i in 0..4 {
        canvas.draw_lines(&horizontal_line(i as f32), Color::WHITE).unwrap();
    }
    canvas.flush().unwrap();
    assert_eq!(stats(canvas.gc()).draw_calls, 1);

    reset_stats(canvas.gc());
    for i in 0..5 {
        canvas.draw_lines(&horizontal_line(i as f32), Color::WHITE).unwrap();
    }
    canvas.flush().unwrap();
    let stats = stats(canvas.gc());
    assert_eq!(stats.draw_calls, 2);
    assert_eq!(stats.vertices, 10);
}

#[test]
fn test_oversized_call_is_rejected() {
    let mut canvas = canvas_with(16, 16, small_config());
    let points: Vec<Point> = (0..10).map(|i| Point::new(i as f32, 0.0)).collect();
    let err = canvas.draw_lines(&points, Color::WHITE).unwrap_err();
    assert_eq!(
        err,
        GraphicsError::CapacityExceeded {
            requested: 10,
            capacity: 8
        }
    );
    canvas.flush().unwrap();
    assert_eq!(stats(canvas.gc()).draw_calls, 0);
}

#[test]
fn test_degenerate_calls_draw_nothing() {
    let mut canvas = canvas(16, 16);
    canvas.draw_lines(&[Point::ZERO], Color::WHITE).unwrap();
    canvas.draw_line_strip(&[Point::ZERO], Color::WHITE).unwrap();
    canvas
        .fill_triangles(&[Point::ZERO, Point::new(4.0, 0.0)], Color::WHITE)
        .unwrap();
    canvas.fill_rect(Rect::new(2.0, 2.0, 0.0, 5.0), Color::WHITE).unwrap();
    canvas.draw_points(&[], Color::WHITE).unwrap();
    canvas.fill_path(&Path::new(), &Brush::solid(Color::WHITE)).unwrap();
    canvas.flush().unwrap();
    assert_eq!(stats(canvas.gc()).draw_calls, 0);
    assert_eq!(pixel(&canvas, 2, 2), BLACK);
}

#[test]
fn test_texture_change_splits_textured_lines() {
    let mut canvas = canvas(16, 16);
    let gc = canvas.gc().clone();
    let a = gc
        .create_texture(IntSize::new(1, 1), TextureFormat::Rgba8, TextureFilter::Nearest)
        .unwrap();
    let b = gc
        .create_texture(IntSize::new(1, 1), TextureFormat::Rgba8, TextureFilter::Nearest)
        .unwrap();
    let uv = [Point::ZERO, Point::new(1.0, 0.0)];

    canvas
        .draw_lines_textured(&horizontal_line(1.0), &uv, &a, Color::WHITE)
        .unwrap();
    canvas
        .draw_lines_textured(&horizontal_line(2.0), &uv, &a, Color::WHITE)
        .unwrap();
    canvas
        .draw_lines_textured(&horizontal_line(3.0), &uv, &b, Color::WHITE)
        .unwrap();
    canvas.flush().unwrap();
    let stats = stats(&gc);
    assert_eq!(stats.draw_calls, 2);
    assert_eq!(stats.vertices, 6);
}

#[test]
fn test_halves_filled_in_one_draw() {
    let mut canvas = canvas(800, 600);
    canvas
        .fill_rect(Rect::new(0.0, 0.0, 400.0, 600.0), Color::RED)
        .unwrap();
    canvas
        .fill_rect(Rect::new(400.0, 0.0, 400.0, 600.0), Color::BLUE)
        .unwrap();
    canvas.flush().unwrap();
    assert!(stats(canvas.gc()).draw_calls <= 2);

    assert_eq!(pixel(&canvas, 0, 0), RED);
    assert_eq!(pixel(&canvas, 399, 300), RED);
    assert_eq!(pixel(&canvas, 400, 300), BLUE);
    assert_eq!(pixel(&canvas, 799, 599), BLUE);
}

#[test]
fn test_path_halves_end_to_end() {
    let mut canvas = canvas(800, 600);
    canvas
        .gc()
        .set_viewport(None, Rect::new(0.0, 0.0, 800.0, 600.0))
        .unwrap();
    canvas
        .fill_path(&Path::rect(Rect::new(0.0, 0.0, 400.0, 600.0)), &Brush::solid(Color::RED))
        .unwrap();
    canvas
        .fill_path(&Path::rect(Rect::new(400.0, 0.0, 400.0, 600.0)), &Brush::solid(Color::BLUE))
        .unwrap();
    canvas.flush().unwrap();
    assert!(stats(canvas.gc()).draw_calls <= 2);

    let pixels = canvas
        .get_pixeldata(IntRect::new(0, 0, 800, 600), TextureFormat::Rgba8)
        .unwrap();
    for (x, y) in [(0, 0), (200, 300), (399, 599), (10, 595)] {
        assert_eq!(pixels.pixel_rgba8(x, y), RED, "({x}, {y})");
    }
    for (x, y) in [(400, 0), (600, 300), (799, 599), (790, 597)] {
        assert_eq!(pixels.pixel_rgba8(x, y), BLUE, "({x}, {y})");
    }
}

#[test]
fn test_switching_batcher_flushes_pending_work() {
    let mut canvas = canvas(16, 16);
    canvas.fill_rect(Rect::new(0.0, 0.0, 4.0, 4.0), Color::RED).unwrap();
    assert_eq!(stats(canvas.gc()).draw_calls, 0);
    assert_eq!(
        canvas.batcher().borrow().active_kind(),
        Some(BatcherKind::Triangle)
    );

    canvas.draw_line(Point::new(0.0, 8.0), Point::new(8.0, 8.0), Color::GREEN).unwrap();
    assert_eq!(stats(canvas.gc()).draw_calls, 1);
    assert_eq!(canvas.batcher().borrow().active_kind(), Some(BatcherKind::Line));

    canvas.flush().unwrap();
    assert_eq!(stats(canvas.gc()).draw_calls, 2);
    assert_eq!(canvas.batcher().borrow().active_kind(), None);
    assert_eq!(pixel(&canvas, 1, 1), RED);
    assert_eq!(pixel(&canvas, 3, 8), GREEN);
}

#[test]
fn test_sibling_canvas_flushes_shared_batch() {
    let mut first = canvas(16, 16);
    let mut second = first.create().unwrap();
    first.fill_rect(Rect::new(0.0, 0.0, 4.0, 4.0), Color::RED).unwrap();
    second.fill_rect(Rect::new(8.0, 8.0, 4.0, 4.0), Color::BLUE).unwrap();
    assert_eq!(stats(first.gc()).draw_calls, 1);

    second.flush().unwrap();
    assert_eq!(pixel(&first, 1, 1), RED);
    assert_eq!(pixel(&first, 9, 9), BLUE);
}

#[test]
fn test_transform_applies_to_drawing() {
    let mut canvas = canvas(16, 16);
    canvas.push_transform();
    canvas.mult_transform(&Mat4::translation(8.0, 0.0, 0.0));
    canvas.fill_rect(Rect::new(0.0, 0.0, 4.0, 4.0), Color::RED).unwrap();
    canvas.pop_transform().unwrap();
    canvas.fill_rect(Rect::new(0.0, 8.0, 4.0, 4.0), Color::BLUE).unwrap();

    assert_eq!(pixel(&canvas, 9, 1), RED);
    assert_eq!(pixel(&canvas, 1, 1), BLACK);
    assert_eq!(pixel(&canvas, 1, 9), BLUE);
}

#[test]
fn test_clip_stack_balances() {
    let mut canvas = canvas(32, 32);
    for i in 0..5 {
        let inset = i as f32 * 2.0;
        canvas
            .push_cliprect(Rect::new(inset, inset, 32.0 - inset, 32.0 - inset))
            .unwrap();
    }
    assert_eq!(canvas.gc().scissor(), Some(IntRect::new(8, 8, 24, 24)));
    for _ in 0..5 {
        canvas.pop_cliprect().unwrap();
    }
    assert_eq!(canvas.gc().scissor(), None);
    assert_eq!(canvas.cliprect(), None);
    assert!(matches!(
        canvas.pop_cliprect(),
        Err(GraphicsError::InvalidArgument(_))
    ));
}

#[test]
fn test_cliprect_limits_fills() {
    let mut canvas = canvas(16, 16);
    canvas.set_cliprect(Rect::new(4.0, 4.0, 4.0, 4.0)).unwrap();
    canvas.fill_rect(Rect::new(0.0, 0.0, 16.0, 16.0), Color::RED).unwrap();
    canvas
        .fill_path(&Path::rect(Rect::new(0.0, 0.0, 16.0, 16.0)), &Brush::solid(Color::GREEN))
        .unwrap();
    canvas.reset_cliprect().unwrap();
    canvas.flush().unwrap();

    assert_eq!(pixel(&canvas, 5, 5), GREEN);
    assert_eq!(pixel(&canvas, 3, 5), BLACK);
    assert_eq!(pixel(&canvas, 8, 8), BLACK);
}

#[test]
fn test_lower_left_mapping() {
    let mut canvas = canvas(16, 16);
    canvas.set_map_mode(MapMode::LowerLeft);
    canvas.fill_rect(Rect::new(0.0, 0.0, 16.0, 4.0), Color::RED).unwrap();
    canvas.flush().unwrap();
    assert_eq!(pixel(&canvas, 0, 15), RED);
    assert_eq!(pixel(&canvas, 0, 12), RED);
    assert_eq!(pixel(&canvas, 0, 11), BLACK);

    canvas.set_cliprect(Rect::new(0.0, 0.0, 16.0, 2.0)).unwrap();
    assert_eq!(canvas.gc().scissor(), Some(IntRect::new(0, 14, 16, 2)));
    canvas.fill_rect(Rect::new(0.0, 0.0, 16.0, 16.0), Color::BLUE).unwrap();
    canvas.flush().unwrap();
    assert_eq!(pixel(&canvas, 0, 15), BLUE);
    assert_eq!(pixel(&canvas, 0, 13), RED);
}

#[test]
fn test_frame_buffer_rows_stay_top_down_on_bottom_up_backend() {
    init_tracing();
    let gc = context(16, 16, TextureImageYAxis::BottomUp);
    let window = Canvas::new(gc.clone(), RenderConfig::default()).unwrap();
    let target = gc
        .create_texture(IntSize::new(16, 16), TextureFormat::Rgba8, TextureFilter::Nearest)
        .unwrap();
    let frame_buffer = gc.create_frame_buffer(&target).unwrap();

    let mut offscreen = window.with_frame_buffer(&frame_buffer).unwrap();
    offscreen.clear(Color::BLACK).unwrap();
    offscreen.fill_rect(Rect::new(0.0, 0.0, 16.0, 4.0), Color::RED).unwrap();
    offscreen.set_cliprect(Rect::new(0.0, 8.0, 16.0, 2.0)).unwrap();
    offscreen.fill_rect(Rect::new(0.0, 0.0, 16.0, 16.0), Color::BLUE).unwrap();
    offscreen.flush().unwrap();

    assert_eq!(texture_pixel(&gc, &target, 0, 0), RED);
    assert_eq!(texture_pixel(&gc, &target, 0, 3), RED);
    assert_eq!(texture_pixel(&gc, &target, 0, 4), BLACK);
    assert_eq!(texture_pixel(&gc, &target, 0, 8), BLUE);
    assert_eq!(texture_pixel(&gc, &target, 0, 10), BLACK);
    assert_eq!(texture_pixel(&gc, &target, 0, 15), BLACK);
}

#[test]
fn test_window_readback_top_down_on_bottom_up_backend() {
    init_tracing();
    let gc = context(16, 16, TextureImageYAxis::BottomUp);
    let mut canvas = Canvas::new(gc, RenderConfig::default()).unwrap();
    canvas.clear(Color::BLACK).unwrap();
    canvas.fill_rect(Rect::new(0.0, 0.0, 16.0, 4.0), Color::RED).unwrap();
    assert_eq!(pixel(&canvas, 0, 0), RED);
    assert_eq!(pixel(&canvas, 0, 15), BLACK);
}

#[test]
fn test_draw_image_samples_texels() {
    let mut canvas = canvas(16, 16);
    let mut pixels = PixelBuffer::new(IntSize::new(2, 2), TextureFormat::Rgba8).unwrap();
    pixels.set_pixel(0, 0, Color::RED.to_array());
    pixels.set_pixel(1, 0, Color::GREEN.to_array());
    pixels.set_pixel(0, 1, Color::BLUE.to_array());
    pixels.set_pixel(1, 1, Color::WHITE.to_array());
    let texture = canvas
        .gc()
        .create_texture_from_pixels(&pixels, TextureFilter::Nearest)
        .unwrap();

    canvas
        .draw_image(
            &texture,
            Rect::new(0.0, 0.0, 2.0, 2.0),
            Rect::new(0.0, 0.0, 8.0, 8.0),
            Color::WHITE,
        )
        .unwrap();
    assert_eq!(pixel(&canvas, 1, 1), RED);
    assert_eq!(pixel(&canvas, 6, 1), GREEN);
    assert_eq!(pixel(&canvas, 1, 6), BLUE);
    assert_eq!(pixel(&canvas, 6, 6), WHITE);
    assert_eq!(pixel(&canvas, 9, 9), BLACK);
}

#[test]
fn test_rect_gradient_interpolates() {
    let mut canvas = canvas(16, 4);
    canvas
        .fill_rect_gradient(
            Rect::new(0.0, 0.0, 16.0, 4.0),
            &RectGradient::horizontal(Color::RED, Color::BLUE),
        )
        .unwrap();
    let left = pixel(&canvas, 0, 1);
    let right = pixel(&canvas, 15, 1);
    assert!(left[0] > 230 && left[2] < 25, "{left:?}");
    assert!(right[2] > 230 && right[0] < 25, "{right:?}");
}

#[test]
fn test_fill_path_solid() {
    let mut canvas = canvas(32, 32);
    canvas
        .fill_path(&Path::rect(Rect::new(4.0, 4.0, 8.0, 8.0)), &Brush::solid(Color::GREEN))
        .unwrap();
    canvas.flush().unwrap();
    assert_eq!(stats(canvas.gc()).draw_calls, 1);
    assert_eq!(pixel(&canvas, 4, 4), GREEN);
    assert_eq!(pixel(&canvas, 11, 11), GREEN);
    assert_eq!(pixel(&canvas, 3, 3), BLACK);
    assert_eq!(pixel(&canvas, 12, 12), BLACK);
}

#[test]
fn test_fill_circle_radial_gradient() {
    let mut canvas = canvas(32, 32);
    let brush = Brush::radial_gradient(
        Point::new(16.0, 16.0),
        10.0,
        vec![
            GradientStop::new(0.0, Color::RED),
            GradientStop::new(1.0, Color::BLUE),
        ],
    );
    canvas.fill_circle(Point::new(16.0, 16.0), 10.0, &brush).unwrap();
    let center = pixel(&canvas, 16, 16);
    assert!(center[0] > 230 && center[2] < 25, "{center:?}");
    let rim = pixel(&canvas, 16, 7);
    assert!(rim[2] > rim[0], "{rim:?}");
    assert_eq!(pixel(&canvas, 1, 1), BLACK);
    assert_eq!(pixel(&canvas, 16, 29), BLACK);
}

#[test]
fn test_fill_under_scaled_user_projection() {
    let mut canvas = canvas(64, 64);
    let unit = Mat4::ortho_2d(0.0, 1.0, 1.0, 0.0, Handedness::Right, canvas.gc().clip_z_range());
    canvas.set_projection(unit);
    canvas
        .fill_circle(Point::new(0.5, 0.5), 0.4, &Brush::solid(Color::RED))
        .unwrap();
    canvas.flush().unwrap();

    assert_eq!(pixel(&canvas, 32, 32), RED);
    assert_eq!(pixel(&canvas, 32, 8), RED);
    assert_eq!(pixel(&canvas, 2, 2), BLACK);
    assert_eq!(pixel(&canvas, 32, 4), BLACK);
    assert_eq!(pixel(&canvas, 61, 61), BLACK);
}

#[test]
fn test_fill_path_image_brush() {
    let mut canvas = canvas(32, 32);
    let mut pixels = PixelBuffer::new(IntSize::new(2, 1), TextureFormat::Rgba8).unwrap();
    pixels.set_pixel(0, 0, Color::RED.to_array());
    pixels.set_pixel(1, 0, Color::BLUE.to_array());
    let texture = canvas
        .gc()
        .create_texture_from_pixels(&pixels, TextureFilter::Nearest)
        .unwrap();

    let brush = Brush::image(texture).with_transform(Mat4::scale(8.0, 8.0, 1.0));
    canvas
        .fill_path(&Path::rect(Rect::new(0.0, 0.0, 16.0, 8.0)), &brush)
        .unwrap();
    assert_eq!(pixel(&canvas, 2, 2), RED);
    assert_eq!(pixel(&canvas, 12, 2), BLUE);
    assert_eq!(pixel(&canvas, 2, 10), BLACK);
}

#[test]
fn test_draw_path_outlines_subpaths() {
    let mut canvas = canvas(16, 16);
    let mut path = Path::new();
    path.move_to(Point::new(2.0, 2.0))
        .line_to(Point::new(12.0, 2.0))
        .line_to(Point::new(12.0, 12.0))
        .close();
    canvas.draw_path(&path, Color::WHITE).unwrap();
    canvas.flush().unwrap();
    assert_eq!(stats(canvas.gc()).vertices, 6);
    assert_eq!(pixel(&canvas, 5, 2), WHITE);
    assert_eq!(pixel(&canvas, 12, 6), WHITE);
    assert_eq!(pixel(&canvas, 3, 8), BLACK);
}

#[test]
fn test_drop_flushes_pending_batch() {
    init_tracing();
    let gc = context(16, 16, TextureImageYAxis::TopDown);
    {
        let mut canvas = Canvas::new(gc.clone(), RenderConfig::default()).unwrap();
        canvas.fill_rect(Rect::new(0.0, 0.0, 4.0, 4.0), Color::RED).unwrap();
        assert_eq!(stats(&gc).draw_calls, 0);
    }
    assert_eq!(stats(&gc).draw_calls, 1);
    let pixels = gc
        .get_pixeldata(IntRect::new(1, 1, 1, 1), TextureFormat::Rgba8)
        .unwrap();
    assert_eq!(pixels.pixel_rgba8(0, 0), RED);
}

#[derive(Default)]
struct Recorder {
    flushes: usize,
    matrices: Vec<BatchMatrices>,
}

impl RenderBatcher for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }

    fn flush(&mut self, _gc: &GraphicContext, _pool: &mut RenderBatchBuffer) -> cinder_core::Result<()> {
        self.flushes += 1;
        Ok(())
    }

    fn matrix_changed(&mut self, matrices: &BatchMatrices) {
        self.matrices.push(*matrices);
    }
}

#[test]
fn test_custom_batcher_joins_the_flush_cycle() {
    let mut canvas = canvas(16, 16);
    let recorder = Rc::new(RefCell::new(Recorder::default()));
    canvas.set_batcher(recorder.clone()).unwrap();
    assert!(canvas.batcher().borrow().has_active_custom());
    assert_eq!(recorder.borrow().matrices.len(), 1);
    assert_eq!(recorder.borrow().matrices[0].projection, canvas.projection());

    canvas.fill_rect(Rect::new(0.0, 0.0, 4.0, 4.0), Color::RED).unwrap();
    assert_eq!(recorder.borrow().flushes, 1);
    assert!(!canvas.batcher().borrow().has_active_custom());
}
