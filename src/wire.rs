/*!
The wire contract with the external rewriter.

A record crosses the boundary as a [`WireRecord`]: one entry per slot, each
carrying its 0-based index and a structural snapshot of the command. Paint
snapshots keep the color, the blend mode, and *presence bits* for the five
effect slots, never effect values. The rewriter answers with a
[`Program`]: either `Ok` and an ordered instruction list, or `Failed` and
the names of the draw commands it could not handle.

Messages are framed as a little-endian `u32` byte length followed by a JSON
document. Both sides own their buffers outright; dropping a `Vec<u8>`
releases it.
*/

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

use crate::{Color, Rect};

/// A framing or parse failure on the wire.
#[derive(Debug, Error)]
pub enum WireError {
    /// The buffer is shorter than its length prefix promises.
    #[error("wire frame truncated: header wants {expected} bytes, buffer has {got}")]
    Truncated {
        /// Bytes the length prefix promised.
        expected: usize,
        /// Bytes actually present after the prefix.
        got: usize,
    },
    /// The frame payload is not a valid message.
    #[error("malformed wire frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Frame a message: length prefix plus JSON payload.
pub fn encode<T: Serialize>(message: &T) -> Vec<u8> {
    let payload = serde_json::to_vec(message).expect("wire messages always serialize");
    let mut frame = Vec::with_capacity(4 + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    frame.extend_from_slice(&payload);
    frame
}

/// Parse a framed message.
pub fn decode<T: DeserializeOwned>(frame: &[u8]) -> Result<T, WireError> {
    if frame.len() < 4 {
        return Err(WireError::Truncated {
            expected: 4,
            got: frame.len(),
        });
    }
    let len = u32::from_le_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
    let payload = &frame[4..];
    if payload.len() < len {
        return Err(WireError::Truncated {
            expected: len,
            got: payload.len(),
        });
    }
    Ok(serde_json::from_slice(&payload[..len])?)
}

/// Blend mode on the wire; everything beyond the two the rewrites reason
/// about is `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WireBlendMode {
    /// Source over destination.
    SrcOver,
    /// Source replaces destination.
    Src,
    /// Any other operator.
    Unknown,
}

/// Clip op on the wire.
///
/// The serializer never produces `Unknown`; a decoder receiving it maps it
/// to intersect rather than misbehave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WireClipOp {
    /// Keep the area inside the rect.
    Intersect,
    /// Keep the area outside the rect.
    Difference,
    /// Not representable; decoded as intersect.
    Unknown,
}

/// A paint snapshot: color, blend, and effect presence bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WirePaint {
    /// The paint color.
    pub color: Color,
    /// The blend mode.
    pub blend: WireBlendMode,
    /// An image filter is attached.
    pub image_filter: bool,
    /// A color filter is attached.
    pub color_filter: bool,
    /// A path effect is attached.
    pub path_effect: bool,
    /// A mask filter is attached.
    pub mask_filter: bool,
    /// A shader is attached.
    pub shader: bool,
}

/// One serialized record slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command")]
pub enum WireCommand {
    /// Any paint-carrying draw, tagged by name; also the fallback for
    /// commands the wire format does not model structurally.
    Draw {
        /// The command's name tag.
        name: String,
        /// The draw's paint snapshot, when it has one.
        paint: Option<WirePaint>,
    },
    /// A save.
    Save,
    /// A saveLayer.
    SaveLayer {
        /// The bounds hint, if any.
        bounds: Option<Rect>,
        /// The layer paint snapshot, if any.
        paint: Option<WirePaint>,
        /// A backdrop filter is attached.
        backdrop: bool,
    },
    /// A restore.
    Restore,
    /// A clip rect.
    ClipRect {
        /// The clip rect.
        bounds: Rect,
        /// Intersect or difference.
        op: WireClipOp,
        /// Anti-aliased clip edge.
        anti_alias: bool,
    },
    /// A 4×4 concat, column-major.
    Concat44 {
        /// The matrix scalars.
        matrix: [f32; 16],
    },
}

/// One record slot with its index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireEntry {
    /// 0-based slot index in the source record.
    pub index: u32,
    /// The command snapshot.
    #[serde(flatten)]
    pub command: WireCommand,
}

/// The serialized record sent to the rewriter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WireRecord {
    /// One entry per slot, in order.
    pub records: Vec<WireEntry>,
}

/// One instruction of a returned program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "instruction")]
pub enum Instruction {
    /// Replay the original record at `index`. When the attached paint's
    /// alpha is not 255, the record's own paint alpha is overridden first.
    CopyRecord {
        /// Slot index into the caller's record.
        index: u32,
        /// Optional paint carrying the alpha override.
        paint: Option<WirePaint>,
    },
    /// Emit a bare save.
    Save,
    /// Emit a saveLayer with a paint built from the snapshot.
    SaveLayer {
        /// The bounds hint, if any.
        bounds: Option<Rect>,
        /// The layer paint.
        paint: WirePaint,
    },
    /// Emit a restore.
    Restore,
    /// Emit a clip rect; `Unknown` decodes as intersect.
    ClipRect {
        /// The clip rect.
        bounds: Rect,
        /// Intersect, difference, or unknown.
        op: WireClipOp,
        /// Anti-aliased clip edge.
        anti_alias: bool,
    },
    /// Emit a column-major 4×4 concat.
    Concat44 {
        /// The matrix scalars.
        matrix: [f32; 16],
    },
}

/// Whether a rewrite run succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgramStatus {
    /// The program replaces the record.
    Ok,
    /// The rewriter could not handle the record; it is left unchanged.
    Failed,
}

/// The rewriter's answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    /// Success or failure.
    pub status: ProgramStatus,
    /// On success, the instructions to replay, in order.
    #[serde(default)]
    pub instructions: Vec<Instruction>,
    /// On failure, the names of the draw commands the rewriter refused.
    /// Plain strings on the wire; the bridge interns them on decode.
    #[serde(default)]
    pub unsupported: Vec<String>,
}
