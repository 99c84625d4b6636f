#![warn(missing_docs)]
/*!

`recopt` optimizes recorded 2D drawing programs.

A recorded program, a [`Record`], is a linear, indexed sequence of canvas
commands: save/restore/saveLayer scopes, clips, transforms, and draws. The
optimizers rewrite a record into an equivalent one that issues fewer
commands and allocates less memory when replayed, without changing a pixel.

Two kinds of optimizer live here:

- *Peephole passes* ([`optimize`], [`optimize2`]): local rewrites driven by
  the type-level [`pattern`] DSL, each guarded by the semantic side
  conditions that make it pixel-exact. Dead scopes become [`NoOp`]s and a
  final [`Record::defrag`] compacts them away.
- *The external bridge* ([`optimize_external`]): serializes the record over
  a [`wire`] contract, hands it to an opaque [`Rewriter`], and replays the
  returned program onto a [`Canvas`], mutating paints in the record where
  the program directs.

The optimizers never reorder draws past each other, and they refuse any
rewrite whose safety they cannot prove from the paint attributes at hand.

## Logging

Many parts of `recopt` dump useful logging info using the
[`log`](https://docs.rs/log/) crate. The easiest way to see this info is to
use the [`env_logger`](https://docs.rs/env_logger/) crate in your binary or
test. The simplest way to enable `env_logger` is to put the following line
near the top of your `main`: `env_logger::init();`. Then, set the
environment variable `RUST_LOG=recopt=info`, or use `warn` or `debug`
instead of `info` for less or more logging.

*/


mod bridge;
mod canvas;
mod command;
mod dump;
mod opts;
mod record;
mod util;

pub mod meter;
pub mod pattern;
pub mod picture;
pub mod raster;
pub mod summary;
pub mod wire;

pub use {
    bridge::{optimize_external, serialize_record, BridgeError, IdentityRewriter, Rewriter},
    canvas::Canvas,
    command::{
        BlendMode, ClipOp, ClipRect, Color, Command, Concat44, DrawAnnotation, DrawOval,
        DrawPicture, DrawRect, FromCommand, Matrix33, Matrix44, NoOp, Paint, Rect, Restore, Save,
        SaveLayer, SetMatrix, Visitor,
    },
    dump::Dumper,
    opts::{
        apply, collapse_set_matrices, merge_svg_opacity_and_filter_layers,
        noop_save_layer_draw_restores, noop_save_restores, optimize, optimize2, PeepholePass,
    },
    record::{Record, Recorder},
    raster::{Pixmap, RasterCanvas},
    util::Symbol,
    wire::WireError,
};

#[cfg(test)]
fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
