use std::sync::Arc;

use crate::{ClipOp, Matrix33, Matrix44, Paint, Record, Rect, Symbol};

/// An abstract sink for canvas commands.
///
/// A [`Record`] replays faithfully onto any implementation via
/// [`Record::playback`]; [`Recorder`](crate::Recorder) implements this trait
/// by appending, which is how records are built in the first place.
pub trait Canvas {
    /// Push the current state.
    fn save(&mut self);

    /// Push an offscreen layer composited through `paint` at restore.
    fn save_layer(&mut self, bounds: Option<Rect>, paint: Option<&Paint>);

    /// Pop the current state.
    fn restore(&mut self);

    /// Combine `rect` into the current clip.
    fn clip_rect(&mut self, rect: Rect, op: ClipOp, anti_alias: bool);

    /// Replace the current transform.
    fn set_matrix(&mut self, matrix: Matrix33);

    /// Concatenate a 4×4 transform onto the current one.
    fn concat44(&mut self, matrix: &Matrix44);

    /// Fill a rect.
    fn draw_rect(&mut self, rect: Rect, paint: &Paint);

    /// Fill the oval inscribed in `oval`.
    fn draw_oval(&mut self, oval: Rect, paint: &Paint);

    /// Attach a key/rect annotation. Paints nothing.
    fn draw_annotation(&mut self, rect: Rect, key: Symbol);

    /// Replay a nested record, optionally through a layer paint.
    fn draw_picture(&mut self, picture: &Arc<Record>, paint: Option<&Paint>);
}
