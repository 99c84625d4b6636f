use std::ops::Index;
use std::sync::Arc;

use crate::{
    Canvas, ClipOp, Command, FromCommand, Matrix33, Matrix44, NoOp, Paint, Rect, Symbol, Visitor,
};

/// An indexed, mutable sequence of [`Command`]s.
///
/// This is what the optimizer works on: passes read commands through
/// [`visit`](Record::visit) and the pattern DSL, knock out dead ones with
/// [`replace_with_noop`](Record::replace_with_noop), and a final
/// [`defrag`](Record::defrag) compacts the survivors.
///
/// Indices are stable under replacement (the slot stays, its tag changes).
/// Indexing out of range is a programmer error and panics; there are no
/// other failure modes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    commands: Vec<Command>,
}

impl Record {
    /// An empty record.
    pub fn new() -> Record {
        Record::default()
    }

    /// Number of slots, counting `NoOp`s.
    pub fn count(&self) -> usize {
        self.commands.len()
    }

    /// True if the record has no slots at all.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// All slots in order, counting `NoOp`s.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Append a command at the end.
    pub fn append(&mut self, command: impl Into<Command>) {
        self.commands.push(command.into());
    }

    /// Dispatch slot `i` to the matching [`Visitor`] method.
    pub fn visit<V: Visitor>(&self, i: usize, visitor: &mut V) {
        let command = &self.commands[i];
        match command {
            Command::NoOp(_) => visitor.no_op(command),
            Command::Save(_) => visitor.save(command),
            Command::SaveLayer(_) => visitor.save_layer(command),
            Command::Restore(_) => visitor.restore(command),
            Command::ClipRect(_) => visitor.clip_rect(command),
            Command::SetMatrix(_) => visitor.set_matrix(command),
            Command::Concat44(_) => visitor.concat44(command),
            Command::DrawAnnotation(_) => visitor.draw_annotation(command),
            Command::DrawPicture(_) => visitor.draw_picture(command),
            _ => visitor.other(command),
        }
    }

    /// Swap slot `i` for a fresh [`NoOp`], releasing the old payload.
    pub fn replace_with_noop(&mut self, i: usize) {
        self.commands[i] = Command::NoOp(NoOp);
    }

    /// Mutate the payload at slot `i`, whose tag must match `T`.
    ///
    /// Panics if the slot currently holds a different case; the rewrites
    /// only mutate slots their pattern just matched.
    pub fn mutate<T: FromCommand>(&mut self, i: usize, f: impl FnOnce(&mut T)) {
        if let Some(payload) = T::from_command_mut(&mut self.commands[i]) {
            f(payload);
            return;
        }
        panic!(
            "mutate::<{}> on a {} at index {}",
            T::NAME,
            self.commands[i].name(),
            i
        );
    }

    /// Mutate the paint at slot `i`, if that slot is a paint-carrying draw.
    ///
    /// Returns false (without calling `f`) otherwise.
    pub fn mutate_paint(&mut self, i: usize, f: impl FnOnce(&mut Paint)) -> bool {
        match self.commands[i].paint_mut() {
            Some(paint) => {
                f(paint);
                true
            }
            None => false,
        }
    }

    /// Compact runs of `NoOp`s, preserving the order of everything else.
    ///
    /// Call once at the end of a full optimization run.
    pub fn defrag(&mut self) {
        self.commands
            .retain(|command| !matches!(command, Command::NoOp(_)));
    }

    /// True if non-NoOp `save`+`saveLayer` and `restore` counts agree.
    ///
    /// Every recorded program starts balanced and every rewrite preserves
    /// the balance; the optimizers check this in debug builds.
    pub fn balanced(&self) -> bool {
        let mut depth: i64 = 0;
        for command in &self.commands {
            match command {
                Command::Save(_) | Command::SaveLayer(_) => depth += 1,
                Command::Restore(_) => depth -= 1,
                _ => {}
            }
        }
        depth == 0
    }

    /// Replay slot `i` onto a canvas. A `NoOp` replays as nothing.
    pub fn replay(&self, i: usize, canvas: &mut impl Canvas) {
        replay_command(&self.commands[i], canvas);
    }

    /// Replay the whole record onto a canvas, in order.
    pub fn playback(&self, canvas: &mut impl Canvas) {
        for command in &self.commands {
            replay_command(command, canvas);
        }
    }
}

pub(crate) fn replay_command(command: &Command, canvas: &mut impl Canvas) {
    match command {
        Command::NoOp(_) => {}
        Command::Save(_) => canvas.save(),
        Command::SaveLayer(layer) => canvas.save_layer(layer.bounds, layer.paint.as_ref()),
        Command::Restore(_) => canvas.restore(),
        Command::ClipRect(clip) => canvas.clip_rect(clip.rect, clip.op, clip.anti_alias),
        Command::SetMatrix(set) => canvas.set_matrix(set.matrix),
        Command::Concat44(concat) => canvas.concat44(&concat.matrix),
        Command::DrawAnnotation(note) => canvas.draw_annotation(note.rect, note.key),
        Command::DrawPicture(pic) => canvas.draw_picture(&pic.picture, pic.paint.as_ref()),
        Command::DrawRect(draw) => canvas.draw_rect(draw.rect, &draw.paint),
        Command::DrawOval(draw) => canvas.draw_oval(draw.oval, &draw.paint),
    }
}

impl Index<usize> for Record {
    type Output = Command;

    fn index(&self, i: usize) -> &Command {
        &self.commands[i]
    }
}

impl FromIterator<Command> for Record {
    fn from_iter<I: IntoIterator<Item = Command>>(iter: I) -> Self {
        Record {
            commands: iter.into_iter().collect(),
        }
    }
}

/// A [`Canvas`] that appends every operation to a [`Record`].
///
/// This is how records come to exist: a picture source (or a wire program)
/// is replayed into a recorder, and the result is handed to the optimizer.
#[derive(Debug, Default)]
pub struct Recorder {
    record: Record,
}

impl Recorder {
    /// A recorder over an empty record.
    pub fn new() -> Recorder {
        Recorder::default()
    }

    /// Finish recording and take the record.
    pub fn into_record(self) -> Record {
        self.record
    }
}

impl Canvas for Recorder {
    fn save(&mut self) {
        self.record.append(crate::Save);
    }

    fn save_layer(&mut self, bounds: Option<Rect>, paint: Option<&Paint>) {
        self.record.append(crate::SaveLayer {
            bounds,
            paint: paint.copied(),
            backdrop: false,
        });
    }

    fn restore(&mut self) {
        self.record.append(crate::Restore);
    }

    fn clip_rect(&mut self, rect: Rect, op: ClipOp, anti_alias: bool) {
        self.record.append(crate::ClipRect {
            rect,
            op,
            anti_alias,
        });
    }

    fn set_matrix(&mut self, matrix: Matrix33) {
        self.record.append(crate::SetMatrix { matrix });
    }

    fn concat44(&mut self, matrix: &Matrix44) {
        self.record.append(crate::Concat44 { matrix: *matrix });
    }

    fn draw_rect(&mut self, rect: Rect, paint: &Paint) {
        self.record.append(crate::DrawRect {
            rect,
            paint: *paint,
        });
    }

    fn draw_oval(&mut self, oval: Rect, paint: &Paint) {
        self.record.append(crate::DrawOval {
            oval,
            paint: *paint,
        });
    }

    fn draw_annotation(&mut self, rect: Rect, key: Symbol) {
        self.record.append(crate::DrawAnnotation { rect, key });
    }

    fn draw_picture(&mut self, picture: &Arc<Record>, paint: Option<&Paint>) {
        self.record.append(crate::DrawPicture {
            picture: Arc::clone(picture),
            paint: paint.copied(),
        });
    }
}
