/*!
The replay dumper.

Replays a record command by command onto a canvas, logging one line per
command: bytes the command allocated (per the [`meter`](crate::meter)),
its slot index, elapsed microseconds, and its name, indented by save
depth. `NoOp`s replay as nothing and are not logged. Nested pictures are
walked recursively, one line per nested command.

This is the benchmark's measurement loop; the per-file logs it writes are
the primary artifact of a benchmark run.
*/

use std::fmt;
use std::io::{self, Write};

use crate::record::replay_command;
use crate::util::Instant;
use crate::{meter, Canvas, Command, Record, Visitor};

/// Replays a record onto a canvas while logging per-command cost.
pub struct Dumper<'a, C: Canvas> {
    canvas: &'a mut C,
    out: &'a mut dyn Write,
    digits: usize,
    indent: usize,
    index: usize,
    total_allocated: u64,
    error: Option<io::Error>,
}

impl<'a, C: Canvas> Dumper<'a, C> {
    /// A dumper writing to `out`, sized to align `count` slot indices.
    pub fn new(canvas: &'a mut C, out: &'a mut dyn Write, count: usize) -> Dumper<'a, C> {
        let mut digits = 0;
        let mut n = count;
        while n > 0 {
            n /= 10;
            digits += 1;
        }
        Dumper {
            canvas,
            out,
            digits: digits.max(1),
            indent: 0,
            index: 0,
            total_allocated: 0,
            error: None,
        }
    }

    /// Replay and log the whole record.
    pub fn run(&mut self, record: &Record) -> io::Result<()> {
        for i in 0..record.count() {
            record.visit(i, self);
        }
        match self.error.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Total bytes allocated across every replayed command.
    pub fn total_allocated(&self) -> u64 {
        self.total_allocated
    }

    fn emit(&mut self, args: fmt::Arguments) {
        if self.error.is_none() {
            if let Err(error) = self.out.write_fmt(args) {
                self.error = Some(error);
            }
        }
    }

    // Replay one command with the meter zeroed around it; returns
    // (bytes, microseconds).
    fn replay_metered(&mut self, command: &Command) -> (u64, u128) {
        meter::reset();
        let start = Instant::now();
        replay_command(command, self.canvas);
        let micros = start.elapsed().as_micros();
        let bytes = meter::allocated();
        self.total_allocated += bytes;
        (bytes, micros)
    }

    fn print_line(&mut self, bytes: u64, micros: u128, tail: fmt::Arguments) {
        let digits = self.digits;
        let index = self.index;
        self.index += 1;
        let pad = "    ".repeat(self.indent);
        self.emit(format_args!(
            "{bytes:>10}B {index:>digits$} {pad}{micros:>6}us  {tail}\n"
        ));
    }

    fn replay_and_print(&mut self, command: &Command) {
        let (bytes, micros) = self.replay_metered(command);
        self.print_line(bytes, micros, format_args!("{}", command.name()));
    }
}

impl<C: Canvas> Visitor for Dumper<'_, C> {
    fn other(&mut self, command: &Command) {
        self.replay_and_print(command);
    }

    fn no_op(&mut self, _command: &Command) {
        // Move on without printing anything.
    }

    fn save(&mut self, command: &Command) {
        self.replay_and_print(command);
        self.indent += 1;
    }

    fn save_layer(&mut self, command: &Command) {
        self.replay_and_print(command);
        self.indent += 1;
    }

    fn restore(&mut self, command: &Command) {
        self.indent = self.indent.saturating_sub(1);
        self.replay_and_print(command);
    }

    fn draw_annotation(&mut self, command: &Command) {
        let note = match command {
            Command::DrawAnnotation(note) => *note,
            _ => unreachable!("draw_annotation dispatch"),
        };
        let (bytes, micros) = self.replay_metered(command);
        self.print_line(
            bytes,
            micros,
            format_args!(
                "DrawAnnotation [{} {} {} {}] {}",
                note.rect.left, note.rect.top, note.rect.right, note.rect.bottom, note.key
            ),
        );
    }

    fn draw_picture(&mut self, command: &Command) {
        let picture = match command {
            Command::DrawPicture(picture) => picture.clone(),
            _ => unreachable!("draw_picture dispatch"),
        };
        self.print_line(0, 0, format_args!("{}", command.name()));

        // Walk the nested record instead of replaying it as one opaque
        // draw, so its commands are metered individually.
        if let Some(paint) = &picture.paint {
            self.canvas.save_layer(None, Some(paint));
        }
        self.indent += 1;
        for i in 0..picture.picture.count() {
            picture.picture.visit(i, self);
        }
        self.indent -= 1;
        if picture.paint.is_some() {
            self.canvas.restore();
        }
    }
}
