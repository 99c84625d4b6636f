//! Pixel-equivalence: an optimized record renders exactly the pixels of
//! its source.

use recopt::test::{alpha_layer_paint, draw_rect, record, restore, save, save_layer, solid_paint};
use recopt::{
    optimize, optimize2, optimize_external, ClipOp, ClipRect, Command, DrawOval, IdentityRewriter,
    Matrix33, Paint, Pixmap, RasterCanvas, Record, Recorder, Rect, SetMatrix,
};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

const SIDE: u32 = 24;

fn render(record: &Record) -> Pixmap {
    let mut canvas = RasterCanvas::new(SIDE, SIDE);
    record.playback(&mut canvas);
    canvas.finish()
}

fn assert_pixel_equal(original: &Record) {
    let reference = render(original);

    let mut v1 = original.clone();
    optimize(&mut v1);
    assert_eq!(render(&v1), reference, "v1 changed pixels");

    let mut v2 = original.clone();
    optimize2(&mut v2);
    assert_eq!(render(&v2), reference, "v2 changed pixels");

    let mut external = original.clone();
    let mut recorder = Recorder::new();
    optimize_external(&mut external, &mut recorder, &mut IdentityRewriter).unwrap();
    assert_eq!(
        render(&recorder.into_record()),
        reference,
        "external replay changed pixels"
    );
}

fn clip(l: f32, t: f32, r: f32, b: f32) -> Command {
    Command::ClipRect(ClipRect {
        rect: Rect::new(l, t, r, b),
        op: ClipOp::Intersect,
        anti_alias: false,
    })
}

#[test]
fn alpha_layer_fold_is_pixel_exact() {
    init();
    assert_pixel_equal(&record(vec![
        draw_rect(24.0, 0xFFEE_EEEE),
        save_layer(Some(alpha_layer_paint(0x80))),
        draw_rect(16.0, 0xFF20_4060),
        restore(),
    ]));
}

#[test]
fn dead_save_scopes_are_pixel_exact() {
    init();
    assert_pixel_equal(&record(vec![
        save(),
        clip(0.0, 0.0, 8.0, 8.0),
        restore(),
        draw_rect(12.0, 0xFF00_8040),
    ]));
}

#[test]
fn save_around_draws_is_pixel_exact() {
    init();
    assert_pixel_equal(&record(vec![
        save(),
        draw_rect(20.0, 0xFF11_2233),
        Command::DrawOval(DrawOval {
            oval: Rect::new(4.0, 4.0, 20.0, 20.0),
            paint: solid_paint(0x80FF_FFFF),
        }),
        restore(),
    ]));
}

#[test]
fn refused_rewrites_are_trivially_pixel_exact() {
    init();
    // A colored layer paint: the fold refuses, both sides render the layer.
    assert_pixel_equal(&record(vec![
        save_layer(Some(solid_paint(0x8040_0000))),
        draw_rect(16.0, 0xFF02_0202),
        restore(),
    ]));
}

#[test]
fn matrix_rewrites_are_pixel_exact() {
    init();
    assert_pixel_equal(&record(vec![
        Command::SetMatrix(SetMatrix {
            matrix: Matrix33::scale_translate(4.0, 4.0, 0.0, 0.0),
        }),
        Command::SetMatrix(SetMatrix {
            matrix: Matrix33::scale_translate(2.0, 2.0, 2.0, 2.0),
        }),
        draw_rect(8.0, 0xFFAA_5500),
    ]));
}

#[test]
fn clipped_layers_are_pixel_exact() {
    init();
    assert_pixel_equal(&record(vec![
        draw_rect(24.0, 0xFF05_0505),
        save(),
        clip(2.0, 2.0, 14.0, 14.0),
        save_layer(Some(alpha_layer_paint(0x40))),
        draw_rect(24.0, 0xFFFF_0000),
        restore(),
        restore(),
    ]));
}

#[test]
fn folded_alpha_matches_the_layered_render() {
    init();
    // Not just "optimizer didn't change pixels": the folded draw at 50%
    // alpha must land exactly where the layered composite landed.
    let mut folded = record(vec![
        save_layer(Some(alpha_layer_paint(0x80))),
        draw_rect(16.0, 0xFF20_4060),
        restore(),
    ]);
    let layered = render(&folded.clone());
    optimize(&mut folded);
    assert_eq!(folded.count(), 1);
    assert_eq!(render(&folded), layered);
}

#[test]
fn semi_transparent_draw_paint_folds_pixel_exact() {
    init();
    let mut paint = Paint::new(recopt::Color::from_argb32(0x8020_4060));
    paint.set_alpha(0x80);
    assert_pixel_equal(&record(vec![
        draw_rect(24.0, 0xFFFF_FFFF),
        save_layer(Some(alpha_layer_paint(0x55))),
        Command::DrawRect(recopt::DrawRect {
            rect: Rect::new(0.0, 0.0, 16.0, 16.0),
            paint,
        }),
        restore(),
    ]));
}
