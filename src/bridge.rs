/*!
The external-rewriter bridge.

[`optimize_external`] sends a record over the wire, hands the frame to an
opaque [`Rewriter`], and replays the returned [`Program`] onto a canvas,
mutating paints in the underlying record where `CopyRecord` instructions
direct it to. A failed run leaves the record untouched and surfaces the
rewriter's list of unsupported command names.

The bridge never reorders on its own: instructions replay strictly in the
order the rewriter returned them, and balancing `Save`/`Restore`
instructions are the rewriter's obligation.
*/

use log::debug;
use thiserror::Error;

use crate::wire::{
    self, Instruction, Program, ProgramStatus, WireBlendMode, WireClipOp, WireCommand, WireEntry,
    WirePaint, WireRecord,
};
use crate::{
    BlendMode, Canvas, ClipOp, Command, Matrix44, Paint, Record, Symbol, Visitor, WireError,
};

/// An opaque rewriting engine.
///
/// Takes an encoded [`WireRecord`] frame and returns an encoded
/// [`Program`] frame. The engine is synchronous: the returned buffer is a
/// fully materialised program before replay begins.
pub trait Rewriter {
    /// Rewrite one record frame into one program frame.
    fn rewrite(&mut self, record_frame: &[u8]) -> Vec<u8>;
}

/// Why an external run left the record unchanged.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The rewriter reported failure, naming the commands it refused.
    ///
    /// The wire carries the names as strings; they are interned on decode
    /// so callers can aggregate them cheaply across many records.
    #[error("rewriter refused {} draw command(s)", unsupported.len())]
    RewriterFailed {
        /// Interned names of the unsupported draw commands.
        unsupported: Vec<Symbol>,
    },
    /// The rewriter's answer did not parse.
    #[error(transparent)]
    Wire(#[from] WireError),
}

fn paint_to_wire(paint: &Paint) -> WirePaint {
    WirePaint {
        color: paint.color,
        blend: match paint.blend {
            BlendMode::SrcOver => WireBlendMode::SrcOver,
            BlendMode::Src => WireBlendMode::Src,
            BlendMode::Other => WireBlendMode::Unknown,
        },
        image_filter: paint.image_filter,
        color_filter: paint.color_filter,
        path_effect: paint.path_effect,
        mask_filter: paint.mask_filter,
        shader: paint.shader,
    }
}

fn paint_from_wire(wire: &WirePaint) -> Paint {
    Paint {
        color: wire.color,
        blend: match wire.blend {
            WireBlendMode::SrcOver => BlendMode::SrcOver,
            WireBlendMode::Src => BlendMode::Src,
            WireBlendMode::Unknown => BlendMode::Other,
        },
        shader: wire.shader,
        color_filter: wire.color_filter,
        image_filter: wire.image_filter,
        mask_filter: wire.mask_filter,
        path_effect: wire.path_effect,
    }
}

/// Walks a record in order, emitting one wire entry per slot.
struct WireBuilder {
    entries: Vec<WireEntry>,
    count: u32,
}

impl WireBuilder {
    fn push(&mut self, command: WireCommand) {
        self.entries.push(WireEntry {
            index: self.count,
            command,
        });
        self.count += 1;
    }
}

impl Visitor for WireBuilder {
    // Draws, and any command the wire format does not model structurally,
    // go out as a name tag plus paint snapshot.
    fn other(&mut self, command: &Command) {
        self.push(WireCommand::Draw {
            name: command.name().to_owned(),
            paint: command.paint().map(paint_to_wire),
        });
    }

    fn save(&mut self, _command: &Command) {
        self.push(WireCommand::Save);
    }

    fn save_layer(&mut self, command: &Command) {
        let layer = match command {
            Command::SaveLayer(layer) => layer,
            _ => unreachable!("save_layer dispatch"),
        };
        self.push(WireCommand::SaveLayer {
            bounds: layer.bounds,
            paint: layer.paint.as_ref().map(paint_to_wire),
            backdrop: layer.backdrop,
        });
    }

    fn restore(&mut self, _command: &Command) {
        self.push(WireCommand::Restore);
    }

    fn clip_rect(&mut self, command: &Command) {
        let clip = match command {
            Command::ClipRect(clip) => clip,
            _ => unreachable!("clip_rect dispatch"),
        };
        self.push(WireCommand::ClipRect {
            bounds: clip.rect,
            op: match clip.op {
                ClipOp::Intersect => WireClipOp::Intersect,
                ClipOp::Difference => WireClipOp::Difference,
            },
            anti_alias: clip.anti_alias,
        });
    }

    fn concat44(&mut self, command: &Command) {
        let concat = match command {
            Command::Concat44(concat) => concat,
            _ => unreachable!("concat44 dispatch"),
        };
        self.push(WireCommand::Concat44 {
            matrix: concat.matrix.0,
        });
    }
}

/// Snapshot a record into its wire form, one entry per slot.
pub fn serialize_record(record: &Record) -> WireRecord {
    assert!(
        record.balanced(),
        "unbalanced record reached the serializer"
    );
    let mut builder = WireBuilder {
        entries: Vec::with_capacity(record.count()),
        count: 0,
    };
    for i in 0..record.count() {
        record.visit(i, &mut builder);
    }
    WireRecord {
        records: builder.entries,
    }
}

/// Replay one program instruction onto `canvas`.
///
/// `CopyRecord` first applies its alpha override to the record's own paint
/// (a wire alpha of 255 means "unchanged", and an unknown blend mode never
/// disturbs the existing one since only the alpha channel is touched), then
/// replays that slot.
fn replay_instruction<C: Canvas>(instruction: &Instruction, record: &mut Record, canvas: &mut C) {
    match instruction {
        Instruction::CopyRecord { index, paint } => {
            let index = *index as usize;
            if let Some(paint) = paint {
                let alpha = paint.color.a;
                if alpha != 0xFF {
                    record.mutate_paint(index, |target| target.set_alpha(alpha));
                }
            }
            record.replay(index, canvas);
        }
        Instruction::Save => canvas.save(),
        Instruction::SaveLayer { bounds, paint } => {
            canvas.save_layer(*bounds, Some(&paint_from_wire(paint)))
        }
        Instruction::Restore => canvas.restore(),
        Instruction::ClipRect {
            bounds,
            op,
            anti_alias,
        } => {
            let op = match op {
                WireClipOp::Intersect | WireClipOp::Unknown => ClipOp::Intersect,
                WireClipOp::Difference => ClipOp::Difference,
            };
            canvas.clip_rect(*bounds, op, *anti_alias);
        }
        Instruction::Concat44 { matrix } => canvas.concat44(&Matrix44(*matrix)),
    }
}

/// Optimize a record through an external rewriter, replaying the result
/// onto `canvas`.
///
/// On success the record's paints may have been mutated per `CopyRecord`
/// directives and the canvas has received the rewritten scene. On failure
/// the record is untouched and the error carries the rewriter's metadata;
/// a failure is per-record and the caller is free to continue with others.
pub fn optimize_external<C: Canvas>(
    record: &mut Record,
    canvas: &mut C,
    rewriter: &mut dyn Rewriter,
) -> Result<(), BridgeError> {
    let frame = wire::encode(&serialize_record(record));
    let answer = rewriter.rewrite(&frame);
    let program: Program = wire::decode(&answer)?;

    match program.status {
        ProgramStatus::Failed => {
            debug!(
                "rewriter failed with {} unsupported command(s)",
                program.unsupported.len()
            );
            Err(BridgeError::RewriterFailed {
                unsupported: program
                    .unsupported
                    .iter()
                    .map(|name| Symbol::from(name.as_str()))
                    .collect(),
            })
        }
        ProgramStatus::Ok => {
            debug!(
                "replaying {} rewritten instruction(s)",
                program.instructions.len()
            );
            for instruction in &program.instructions {
                replay_instruction(instruction, record, canvas);
            }
            Ok(())
        }
    }
}

/// The rewriter that changes nothing: its program copies every slot back
/// in order.
///
/// This is the wire round-trip witness (serializing a record and replaying
/// the identity program reproduces the record's behaviour) and the default
/// plumbing for exercising the bridge without an engine attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityRewriter;

impl Rewriter for IdentityRewriter {
    fn rewrite(&mut self, record_frame: &[u8]) -> Vec<u8> {
        let program = match wire::decode::<WireRecord>(record_frame) {
            Ok(record) => Program {
                status: ProgramStatus::Ok,
                instructions: record
                    .records
                    .iter()
                    .map(|entry| Instruction::CopyRecord {
                        index: entry.index,
                        paint: None,
                    })
                    .collect(),
                unsupported: vec![],
            },
            Err(_) => Program {
                status: ProgramStatus::Failed,
                instructions: vec![],
                unsupported: vec!["<unparseable record>".to_owned()],
            },
        };
        wire::encode(&program)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Color, DrawRect, Recorder, Rect, Restore, Save, SaveLayer};

    fn sample() -> Record {
        let mut record = Record::new();
        record.append(Save);
        record.append(SaveLayer {
            bounds: None,
            paint: None,
            backdrop: false,
        });
        record.append(DrawRect {
            rect: Rect::new(0.0, 0.0, 4.0, 4.0),
            paint: Paint::new(Color::from_argb32(0xFF11_2233)),
        });
        record.append(Restore);
        record.append(Restore);
        record
    }

    #[test]
    fn serializer_indexes_every_slot() {
        let record = sample();
        let wire = serialize_record(&record);
        assert_eq!(wire.records.len(), record.count());
        for (i, entry) in wire.records.iter().enumerate() {
            assert_eq!(entry.index as usize, i);
        }
        assert!(matches!(wire.records[0].command, WireCommand::Save));
        assert!(matches!(
            wire.records[2].command,
            WireCommand::Draw { ref name, .. } if name == "DrawRect"
        ));
    }

    #[test]
    fn identity_round_trip_reproduces_behaviour() {
        let mut record = sample();
        let original = record.clone();
        let mut replayed = Recorder::new();
        optimize_external(&mut record, &mut replayed, &mut IdentityRewriter).unwrap();
        assert_eq!(replayed.into_record(), original);
        assert_eq!(record, original);
    }

    #[test]
    fn copy_record_alpha_255_means_unchanged() {
        let mut record = sample();
        let program = Program {
            status: ProgramStatus::Ok,
            instructions: vec![Instruction::CopyRecord {
                index: 2,
                paint: Some(paint_to_wire(&Paint::new(Color::from_argb32(
                    0xFF00_0000,
                )))),
            }],
            unsupported: vec![],
        };
        let mut canvas = Recorder::new();
        for instruction in &program.instructions {
            replay_instruction(instruction, &mut record, &mut canvas);
        }
        assert_eq!(record[2].paint().unwrap().alpha(), 0xFF);
        assert_eq!(
            record[2].paint().unwrap().color,
            Color::from_argb32(0xFF11_2233)
        );
    }
}
