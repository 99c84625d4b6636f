use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{Record, Symbol};

/// An axis-aligned rectangle, stored as left/top/right/bottom edges.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge.
    pub left: f32,
    /// Top edge.
    pub top: f32,
    /// Right edge.
    pub right: f32,
    /// Bottom edge.
    pub bottom: f32,
}

impl Rect {
    /// Make a rect from its four edges.
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Rect {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Width of the rect; negative if the edges are inverted.
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    /// Height of the rect; negative if the edges are inverted.
    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    /// True if the rect encloses no area.
    pub fn is_empty(&self) -> bool {
        self.left >= self.right || self.top >= self.bottom
    }

    /// The intersection of two rects; may be empty.
    pub fn intersect(&self, other: &Rect) -> Rect {
        Rect {
            left: self.left.max(other.left),
            top: self.top.max(other.top),
            right: self.right.min(other.right),
            bottom: self.bottom.min(other.bottom),
        }
    }

    /// The smallest rect containing both inputs.
    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            left: self.left.min(other.left),
            top: self.top.min(other.top),
            right: self.right.max(other.right),
            bottom: self.bottom.max(other.bottom),
        }
    }

    /// True if the point is inside the rect (half-open on the far edges).
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.left && x < self.right && y >= self.top && y < self.bottom
    }
}

/// A row-major 3×3 matrix, as set by [`SetMatrix`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Matrix33(pub [f32; 9]);

impl Matrix33 {
    /// The identity matrix.
    pub const IDENTITY: Matrix33 = Matrix33([1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);

    /// A scale-then-translate matrix.
    pub fn scale_translate(sx: f32, sy: f32, tx: f32, ty: f32) -> Self {
        Matrix33([sx, 0.0, tx, 0.0, sy, ty, 0.0, 0.0, 1.0])
    }
}

/// A column-major 4×4 matrix, as concatenated by [`Concat44`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Matrix44(pub [f32; 16]);

impl Matrix44 {
    /// The identity matrix.
    pub const IDENTITY: Matrix44 = Matrix44([
        1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0,
    ]);

    /// The 2D affine part (sx, sy, tx, ty) of the matrix.
    pub fn to_scale_translate(&self) -> (f32, f32, f32, f32) {
        let m = &self.0;
        (m[0], m[5], m[12], m[13])
    }
}

/// An ARGB color with 8-bit channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    /// Alpha channel.
    pub a: u8,
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

impl Color {
    /// Fully transparent black.
    pub const TRANSPARENT: Color = Color::argb(0, 0, 0, 0);
    /// Opaque black, the default paint color.
    pub const BLACK: Color = Color::argb(0xFF, 0, 0, 0);

    /// Make a color from its four channels.
    pub const fn argb(a: u8, r: u8, g: u8, b: u8) -> Color {
        Color { a, r, g, b }
    }

    /// Unpack a `0xAARRGGBB` word.
    pub const fn from_argb32(argb: u32) -> Color {
        Color {
            a: (argb >> 24) as u8,
            r: (argb >> 16) as u8,
            g: (argb >> 8) as u8,
            b: argb as u8,
        }
    }

    /// The same color with the alpha channel replaced.
    pub const fn with_alpha(self, a: u8) -> Color {
        Color { a, ..self }
    }
}

/// A Porter–Duff blend operator, as far as the optimizer cares.
///
/// Only `SrcOver` and `Src` have algebraic properties the rewrites rely on;
/// every other operator is lumped into `Other` and treated as opaque.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlendMode {
    /// Source over destination, the default.
    #[default]
    SrcOver,
    /// Source replaces destination.
    Src,
    /// Any other operator; never rewritten.
    Other,
}

/// How a clip rect combines with the current clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClipOp {
    /// Keep the area inside the rect.
    Intersect,
    /// Keep the area outside the rect.
    Difference,
}

/// A bag of painting attributes attached to a draw or a [`SaveLayer`].
///
/// Effect slots carry presence only, never values: every predicate that
/// gates a rewrite reads only presence, and the wire format intentionally
/// preserves nothing more.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Paint {
    /// The paint color.
    pub color: Color,
    /// The blend operator.
    pub blend: BlendMode,
    /// A shader is attached.
    pub shader: bool,
    /// A color filter is attached.
    pub color_filter: bool,
    /// An image filter is attached.
    pub image_filter: bool,
    /// A mask filter is attached.
    pub mask_filter: bool,
    /// A path effect is attached.
    pub path_effect: bool,
}

impl Default for Paint {
    fn default() -> Self {
        Paint::new(Color::BLACK)
    }
}

impl Paint {
    /// A plain source-over paint of the given color, no effects.
    pub fn new(color: Color) -> Paint {
        Paint {
            color,
            blend: BlendMode::SrcOver,
            shader: false,
            color_filter: false,
            image_filter: false,
            mask_filter: false,
            path_effect: false,
        }
    }

    /// The paint's alpha channel.
    pub fn alpha(&self) -> u8 {
        self.color.a
    }

    /// Replace the paint's alpha channel.
    pub fn set_alpha(&mut self, alpha: u8) {
        self.color.a = alpha;
    }

    /// True if the paint blends source-over.
    pub fn is_src_over(&self) -> bool {
        self.blend == BlendMode::SrcOver
    }
}

/// A command with no effect. Filler left behind by rewrites, removed by
/// [`Record::defrag`](crate::Record::defrag).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoOp;

/// Push the current canvas state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Save;

/// Pop the current canvas state, compositing any layer pushed with it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Restore;

/// Push an offscreen layer; subsequent draws composite through `paint` at
/// the matching [`Restore`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SaveLayer {
    /// A hint for the layer extent. Rewrites are free to ignore it.
    pub bounds: Option<Rect>,
    /// The paint the layer is composited with.
    pub paint: Option<Paint>,
    /// A backdrop filter is attached (presence only).
    pub backdrop: bool,
}

/// Combine a rect into the current clip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipRect {
    /// The clip rect.
    pub rect: Rect,
    /// Intersect or difference.
    pub op: ClipOp,
    /// Anti-aliased clip edge.
    pub anti_alias: bool,
}

/// Replace the current transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetMatrix {
    /// The new transform.
    pub matrix: Matrix33,
}

/// Concatenate a 4×4 transform onto the current one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Concat44 {
    /// The transform, column-major.
    pub matrix: Matrix44,
}

/// A key/rect annotation. Paints no pixels and carries no paint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawAnnotation {
    /// The annotated area.
    pub rect: Rect,
    /// The annotation key.
    pub key: Symbol,
}

/// Replay a nested record, optionally through a layer paint.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawPicture {
    /// The nested record.
    pub picture: Arc<Record>,
    /// Composite the nested record through this paint.
    pub paint: Option<Paint>,
}

/// Fill a rect.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawRect {
    /// The rect to fill.
    pub rect: Rect,
    /// The paint to fill with.
    pub paint: Paint,
}

/// Fill the oval inscribed in a rect.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawOval {
    /// The bounding rect of the oval.
    pub oval: Rect,
    /// The paint to fill with.
    pub paint: Paint,
}

/// One recorded canvas command, tagged by kind.
///
/// Each case wraps its own payload struct so the pattern DSL can name
/// commands at the type level (`Is<SaveLayer>`), the way the rewrites want
/// to talk about them.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// See [`NoOp`].
    NoOp(NoOp),
    /// See [`Save`].
    Save(Save),
    /// See [`SaveLayer`].
    SaveLayer(SaveLayer),
    /// See [`Restore`].
    Restore(Restore),
    /// See [`ClipRect`].
    ClipRect(ClipRect),
    /// See [`SetMatrix`].
    SetMatrix(SetMatrix),
    /// See [`Concat44`].
    Concat44(Concat44),
    /// See [`DrawAnnotation`].
    DrawAnnotation(DrawAnnotation),
    /// See [`DrawPicture`].
    DrawPicture(DrawPicture),
    /// See [`DrawRect`].
    DrawRect(DrawRect),
    /// See [`DrawOval`].
    DrawOval(DrawOval),
}

/// A command payload that knows which [`Command`] case holds it.
///
/// Implemented for every payload struct; this is what gives the pattern
/// DSL its typed matchers and accessors.
pub trait FromCommand: Sized {
    /// The command's name tag, as it appears on the wire and in logs.
    const NAME: &'static str;

    /// Borrow the payload if `command` is the right case.
    fn from_command(command: &Command) -> Option<&Self>;

    /// Mutably borrow the payload if `command` is the right case.
    fn from_command_mut(command: &mut Command) -> Option<&mut Self>;
}

macro_rules! impl_from_command {
    ($($case:ident),* $(,)?) => {
        $(
            impl FromCommand for $case {
                const NAME: &'static str = stringify!($case);

                fn from_command(command: &Command) -> Option<&Self> {
                    match command {
                        Command::$case(payload) => Some(payload),
                        _ => None,
                    }
                }

                fn from_command_mut(command: &mut Command) -> Option<&mut Self> {
                    match command {
                        Command::$case(payload) => Some(payload),
                        _ => None,
                    }
                }
            }

            impl From<$case> for Command {
                fn from(payload: $case) -> Command {
                    Command::$case(payload)
                }
            }
        )*

        impl Command {
            /// The command's name tag.
            pub fn name(&self) -> &'static str {
                match self {
                    $(Command::$case(_) => $case::NAME,)*
                }
            }
        }
    };
}

impl_from_command!(
    NoOp,
    Save,
    SaveLayer,
    Restore,
    ClipRect,
    SetMatrix,
    Concat44,
    DrawAnnotation,
    DrawPicture,
    DrawRect,
    DrawOval,
);

impl Command {
    /// True for commands that carry a paint and put pixels on the canvas.
    ///
    /// `DrawAnnotation` is not a draw in this sense: it has no paint, which
    /// is exactly why the save-span passes must not run around annotations.
    pub fn is_draw(&self) -> bool {
        matches!(
            self,
            Command::DrawRect(_) | Command::DrawPicture(_) | Command::DrawOval(_)
        )
    }

    /// The command's paint, for paint-carrying draws.
    pub fn paint(&self) -> Option<&Paint> {
        match self {
            Command::DrawRect(draw) => Some(&draw.paint),
            Command::DrawOval(draw) => Some(&draw.paint),
            Command::DrawPicture(draw) => draw.paint.as_ref(),
            _ => None,
        }
    }

    /// Mutable access to the command's paint, for paint-carrying draws.
    pub fn paint_mut(&mut self) -> Option<&mut Paint> {
        match self {
            Command::DrawRect(draw) => Some(&mut draw.paint),
            Command::DrawOval(draw) => Some(&mut draw.paint),
            Command::DrawPicture(draw) => draw.paint.as_mut(),
            _ => None,
        }
    }
}

/// Per-variant dispatch over one record slot.
///
/// Every variant method defaults to [`Visitor::other`], so an implementation
/// overrides only the cases it cares about and handles the rest in one
/// place. Dispatch is total: [`Record::visit`](crate::Record::visit) routes
/// every variant through exactly one method.
pub trait Visitor {
    /// Catch-all for variants without a dedicated override.
    fn other(&mut self, command: &Command);

    /// A [`NoOp`] slot.
    fn no_op(&mut self, command: &Command) {
        self.other(command)
    }

    /// A [`Save`] slot.
    fn save(&mut self, command: &Command) {
        self.other(command)
    }

    /// A [`SaveLayer`] slot.
    fn save_layer(&mut self, command: &Command) {
        self.other(command)
    }

    /// A [`Restore`] slot.
    fn restore(&mut self, command: &Command) {
        self.other(command)
    }

    /// A [`ClipRect`] slot.
    fn clip_rect(&mut self, command: &Command) {
        self.other(command)
    }

    /// A [`SetMatrix`] slot.
    fn set_matrix(&mut self, command: &Command) {
        self.other(command)
    }

    /// A [`Concat44`] slot.
    fn concat44(&mut self, command: &Command) {
        self.other(command)
    }

    /// A [`DrawAnnotation`] slot.
    fn draw_annotation(&mut self, command: &Command) {
        self.other(command)
    }

    /// A [`DrawPicture`] slot.
    fn draw_picture(&mut self, command: &Command) {
        self.other(command)
    }
}
