/*!
A reference CPU canvas.

This is deliberately small: premultiplied source-over compositing of rects
and ovals, rect clips, scale/translate transforms, and full alpha-layer
semantics. It exists so the pixel-equivalence property (an optimized
record renders identically to its source) can be checked against real
pixels, and so the benchmark has something to render and meter.

Layer buffers report their allocations to [`meter`](crate::meter), which is
what the benchmark's per-command byte accounting measures.

Blend modes beyond `SrcOver`/`Src` render as source-over here; the
optimizer refuses to rewrite around them, so both sides of an equivalence
check see the same simplification.
*/

use std::sync::Arc;

use crate::util::mul_div_255_round;
use crate::{
    meter, BlendMode, Canvas, ClipOp, Matrix33, Matrix44, Paint, Record, Rect, Symbol,
};

/// A premultiplied RGBA8 pixel buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pixmap {
    width: u32,
    height: u32,
    pixels: Vec<[u8; 4]>,
}

impl Pixmap {
    /// A transparent pixmap. The buffer is reported to the meter.
    pub fn new(width: u32, height: u32) -> Pixmap {
        let len = width as usize * height as usize;
        meter::record_alloc(len * 4);
        Pixmap {
            width,
            height,
            pixels: vec![[0; 4]; len],
        }
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// The premultiplied RGBA pixel at (x, y).
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.pixels[(y * self.width + x) as usize]
    }

    fn pixel_mut(&mut self, x: u32, y: u32) -> &mut [u8; 4] {
        &mut self.pixels[(y * self.width + x) as usize]
    }

    /// Flatten to straight-alpha RGBA8 bytes, row-major, for image output.
    pub fn to_rgba8(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.pixels.len() * 4);
        for [r, g, b, a] in &self.pixels {
            if *a == 0 {
                out.extend_from_slice(&[0, 0, 0, 0]);
            } else {
                let un = |c: u8| ((u32::from(c) * 255 + u32::from(*a) / 2) / u32::from(*a)) as u8;
                out.extend_from_slice(&[un(*r), un(*g), un(*b), *a]);
            }
        }
        out
    }
}

// Scale-then-translate; the transform subset the reference canvas maps
// rects through exactly.
#[derive(Debug, Clone, Copy)]
struct Transform {
    sx: f32,
    sy: f32,
    tx: f32,
    ty: f32,
}

impl Transform {
    const IDENTITY: Transform = Transform {
        sx: 1.0,
        sy: 1.0,
        tx: 0.0,
        ty: 0.0,
    };

    fn map_rect(&self, r: &Rect) -> Rect {
        let (x0, x1) = (r.left * self.sx + self.tx, r.right * self.sx + self.tx);
        let (y0, y1) = (r.top * self.sy + self.ty, r.bottom * self.sy + self.ty);
        Rect::new(x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1))
    }

    fn then(&self, sx: f32, sy: f32, tx: f32, ty: f32) -> Transform {
        Transform {
            sx: self.sx * sx,
            sy: self.sy * sy,
            tx: self.sx * tx + self.tx,
            ty: self.sy * ty + self.ty,
        }
    }
}

#[derive(Debug, Clone)]
struct State {
    transform: Transform,
    // Device-space clip rects, tested per pixel.
    clips: Vec<(Rect, ClipOp)>,
}

#[derive(Debug, Clone, Copy)]
enum Scope {
    Save,
    Layer,
}

struct Layer {
    pixmap: Pixmap,
    paint: Paint,
}

/// The reference CPU implementation of [`Canvas`].
pub struct RasterCanvas {
    width: u32,
    height: u32,
    base: Pixmap,
    layers: Vec<Layer>,
    states: Vec<State>,
    scopes: Vec<Scope>,
}

impl RasterCanvas {
    /// A canvas over a fresh transparent pixmap.
    pub fn new(width: u32, height: u32) -> RasterCanvas {
        RasterCanvas {
            width,
            height,
            base: Pixmap::new(width, height),
            layers: vec![],
            states: vec![State {
                transform: Transform::IDENTITY,
                clips: vec![],
            }],
            scopes: vec![],
        }
    }

    /// Close any open scopes and take the composited pixels.
    pub fn finish(mut self) -> Pixmap {
        while !self.scopes.is_empty() {
            self.restore();
        }
        self.base
    }

    fn state(&self) -> &State {
        self.states.last().expect("state stack never empties")
    }

    fn state_mut(&mut self) -> &mut State {
        self.states.last_mut().expect("state stack never empties")
    }

    fn passes_clip(clips: &[(Rect, ClipOp)], x: f32, y: f32) -> bool {
        clips.iter().all(|(rect, op)| match op {
            ClipOp::Intersect => rect.contains(x, y),
            ClipOp::Difference => !rect.contains(x, y),
        })
    }

    fn fill(&mut self, device: Rect, paint: &Paint, mut coverage: impl FnMut(f32, f32) -> bool) {
        let src = premultiply(paint);
        let blend = paint.blend;
        let clips = self.state().clips.clone();
        let (width, height) = (self.width, self.height);

        let target = match self.layers.last_mut() {
            Some(layer) => &mut layer.pixmap,
            None => &mut self.base,
        };

        let x0 = device.left.floor().max(0.0) as u32;
        let y0 = device.top.floor().max(0.0) as u32;
        let x1 = (device.right.ceil().max(0.0) as u32).min(width);
        let y1 = (device.bottom.ceil().max(0.0) as u32).min(height);

        for y in y0..y1 {
            for x in x0..x1 {
                let (cx, cy) = (x as f32 + 0.5, y as f32 + 0.5);
                if !device.contains(cx, cy) || !coverage(cx, cy) {
                    continue;
                }
                if !Self::passes_clip(&clips, cx, cy) {
                    continue;
                }
                let dst = target.pixel_mut(x, y);
                *dst = match blend {
                    BlendMode::Src => src,
                    BlendMode::SrcOver | BlendMode::Other => src_over(src, *dst),
                };
            }
        }
    }
}

fn premultiply(paint: &Paint) -> [u8; 4] {
    let c = paint.color;
    [
        mul_div_255_round(c.r, c.a),
        mul_div_255_round(c.g, c.a),
        mul_div_255_round(c.b, c.a),
        c.a,
    ]
}

fn src_over(src: [u8; 4], dst: [u8; 4]) -> [u8; 4] {
    let inv = 255 - src[3];
    [
        src[0].saturating_add(mul_div_255_round(dst[0], inv)),
        src[1].saturating_add(mul_div_255_round(dst[1], inv)),
        src[2].saturating_add(mul_div_255_round(dst[2], inv)),
        src[3].saturating_add(mul_div_255_round(dst[3], inv)),
    ]
}

impl Canvas for RasterCanvas {
    fn save(&mut self) {
        let state = self.state().clone();
        self.states.push(state);
        self.scopes.push(Scope::Save);
    }

    fn save_layer(&mut self, _bounds: Option<Rect>, paint: Option<&Paint>) {
        let state = self.state().clone();
        self.states.push(state);
        self.scopes.push(Scope::Layer);
        self.layers.push(Layer {
            pixmap: Pixmap::new(self.width, self.height),
            paint: paint.copied().unwrap_or_default(),
        });
    }

    fn restore(&mut self) {
        let Some(scope) = self.scopes.pop() else {
            return; // unbalanced restore; tolerated like any canvas
        };
        self.states.pop();

        if let Scope::Layer = scope {
            let layer = self.layers.pop().expect("layer stack matches scopes");
            let alpha = layer.paint.alpha();
            let target = match self.layers.last_mut() {
                Some(below) => &mut below.pixmap,
                None => &mut self.base,
            };
            for y in 0..self.height {
                for x in 0..self.width {
                    let px = layer.pixmap.pixel(x, y);
                    if px == [0; 4] {
                        continue;
                    }
                    let modulated = [
                        mul_div_255_round(px[0], alpha),
                        mul_div_255_round(px[1], alpha),
                        mul_div_255_round(px[2], alpha),
                        mul_div_255_round(px[3], alpha),
                    ];
                    let dst = target.pixel_mut(x, y);
                    *dst = src_over(modulated, *dst);
                }
            }
        }
    }

    fn clip_rect(&mut self, rect: Rect, op: ClipOp, _anti_alias: bool) {
        let device = self.state().transform.map_rect(&rect);
        self.state_mut().clips.push((device, op));
    }

    fn set_matrix(&mut self, matrix: Matrix33) {
        let m = matrix.0;
        self.state_mut().transform = Transform {
            sx: m[0],
            sy: m[4],
            tx: m[2],
            ty: m[5],
        };
    }

    fn concat44(&mut self, matrix: &Matrix44) {
        let (sx, sy, tx, ty) = matrix.to_scale_translate();
        let current = self.state().transform;
        self.state_mut().transform = current.then(sx, sy, tx, ty);
    }

    fn draw_rect(&mut self, rect: Rect, paint: &Paint) {
        let device = self.state().transform.map_rect(&rect);
        self.fill(device, paint, |_, _| true);
    }

    fn draw_oval(&mut self, oval: Rect, paint: &Paint) {
        let device = self.state().transform.map_rect(&oval);
        let (cx, cy) = (
            (device.left + device.right) / 2.0,
            (device.top + device.bottom) / 2.0,
        );
        let (rx, ry) = (device.width() / 2.0, device.height() / 2.0);
        if rx <= 0.0 || ry <= 0.0 {
            return;
        }
        self.fill(device, paint, |x, y| {
            let (nx, ny) = ((x - cx) / rx, (y - cy) / ry);
            nx * nx + ny * ny <= 1.0
        });
    }

    fn draw_annotation(&mut self, _rect: Rect, _key: Symbol) {}

    fn draw_picture(&mut self, picture: &Arc<Record>, paint: Option<&Paint>) {
        match paint {
            Some(paint) => {
                self.save_layer(None, Some(paint));
                picture.playback(self);
                self.restore();
            }
            None => picture.playback(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Color;

    fn blue() -> Paint {
        Paint::new(Color::from_argb32(0xFF00_00FF))
    }

    #[test]
    fn draw_rect_fills_pixels() {
        let mut canvas = RasterCanvas::new(4, 4);
        canvas.draw_rect(Rect::new(0.0, 0.0, 2.0, 2.0), &blue());
        let pixmap = canvas.finish();
        assert_eq!(pixmap.pixel(0, 0), [0, 0, 255, 255]);
        assert_eq!(pixmap.pixel(3, 3), [0, 0, 0, 0]);
    }

    #[test]
    fn intersect_clip_limits_fill() {
        let mut canvas = RasterCanvas::new(4, 4);
        canvas.clip_rect(Rect::new(0.0, 0.0, 1.0, 1.0), ClipOp::Intersect, false);
        canvas.draw_rect(Rect::new(0.0, 0.0, 4.0, 4.0), &blue());
        let pixmap = canvas.finish();
        assert_eq!(pixmap.pixel(0, 0), [0, 0, 255, 255]);
        assert_eq!(pixmap.pixel(2, 2), [0, 0, 0, 0]);
    }

    #[test]
    fn difference_clip_punches_a_hole() {
        let mut canvas = RasterCanvas::new(4, 4);
        canvas.clip_rect(Rect::new(0.0, 0.0, 1.0, 1.0), ClipOp::Difference, false);
        canvas.draw_rect(Rect::new(0.0, 0.0, 4.0, 4.0), &blue());
        let pixmap = canvas.finish();
        assert_eq!(pixmap.pixel(0, 0), [0, 0, 0, 0]);
        assert_eq!(pixmap.pixel(2, 2), [0, 0, 255, 255]);
    }

    #[test]
    fn restore_discards_clip_and_matrix() {
        let mut canvas = RasterCanvas::new(4, 4);
        canvas.save();
        canvas.clip_rect(Rect::new(0.0, 0.0, 1.0, 1.0), ClipOp::Intersect, false);
        canvas.set_matrix(Matrix33::scale_translate(2.0, 2.0, 0.0, 0.0));
        canvas.restore();
        canvas.draw_rect(Rect::new(0.0, 0.0, 4.0, 4.0), &blue());
        let pixmap = canvas.finish();
        assert_eq!(pixmap.pixel(3, 3), [0, 0, 255, 255]);
    }

    #[test]
    fn layer_alpha_modulates_contents() {
        let mut opaque = RasterCanvas::new(2, 2);
        let mut layered = RasterCanvas::new(2, 2);

        opaque.draw_rect(Rect::new(0.0, 0.0, 2.0, 2.0), &blue());

        let mut half = Paint::new(Color::TRANSPARENT);
        half.set_alpha(128);
        layered.save_layer(None, Some(&half));
        layered.draw_rect(Rect::new(0.0, 0.0, 2.0, 2.0), &blue());
        layered.restore();

        let full = opaque.finish().pixel(0, 0);
        let faded = layered.finish().pixel(0, 0);
        assert_eq!(full[3], 255);
        assert_eq!(faded[3], 128);
    }

    #[test]
    fn layers_report_to_the_meter() {
        meter::reset();
        let mut canvas = RasterCanvas::new(8, 8);
        let base_bytes = meter::allocated();
        canvas.save_layer(None, None);
        assert_eq!(meter::allocated(), base_bytes + 8 * 8 * 4);
        canvas.restore();
    }
}
