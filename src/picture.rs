/*!
The JSON picture source.

Pictures arrive as JSON documents, `{"commands": [...]}` with a
`"command"` tag per entry, and are replayed through a
[`Recorder`](crate::Recorder) to produce the [`Record`] the optimizer works
on. Parsing is deliberately forgiving about fields it does not model
(unknown fields are ignored), and deliberately strict about shape: a
malformed document is a per-file error, not a panic.
*/

use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::{Canvas, ClipOp, Color, Paint, Record, Recorder, Rect};

/// A picture file could not be turned into a record.
#[derive(Debug, Error)]
pub enum PictureError {
    /// The file could not be read.
    #[error("could not read {path}: {source}")]
    Io {
        /// The offending path.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The document is not a valid picture.
    #[error("could not parse picture: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A paint as it appears in picture JSON: an ARGB quadruple.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PicturePaint {
    /// ARGB channels, 0–255.
    #[serde(default = "default_color")]
    pub color: [u8; 4],
}

fn default_color() -> [u8; 4] {
    [255, 0, 0, 0]
}

impl PicturePaint {
    fn to_paint(self) -> Paint {
        let [a, r, g, b] = self.color;
        Paint::new(Color::argb(a, r, g, b))
    }
}

/// One entry of a picture's command list.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "command")]
pub enum PictureCommand {
    /// Fill a rect.
    DrawRect {
        /// Left, top, right, bottom.
        coords: [f32; 4],
        /// The fill paint.
        paint: PicturePaint,
    },
    /// Fill an oval.
    DrawOval {
        /// Left, top, right, bottom of the bounding rect.
        coords: [f32; 4],
        /// The fill paint.
        paint: PicturePaint,
    },
    /// Intersect a rect into the clip.
    ClipRect {
        /// Left, top, right, bottom.
        coords: [f32; 4],
    },
    /// Push the canvas state.
    Save,
    /// Push an offscreen layer.
    SaveLayer {
        /// The layer paint, if any.
        paint: Option<PicturePaint>,
    },
    /// Pop the canvas state.
    Restore,
}

/// A parsed picture document.
#[derive(Debug, Clone, Deserialize)]
pub struct Picture {
    /// The recorded commands, in order.
    pub commands: Vec<PictureCommand>,
    /// The culling rect, if the document carries one.
    #[serde(default)]
    pub cull: Option<[f32; 4]>,
}

fn coords_rect(coords: [f32; 4]) -> Rect {
    Rect::new(coords[0], coords[1], coords[2], coords[3])
}

impl Picture {
    /// Parse a picture from JSON text.
    pub fn from_json(text: &str) -> Result<Picture, PictureError> {
        Ok(serde_json::from_str(text)?)
    }

    /// The picture extent: the cull rect if present, else the union of
    /// everything the commands touch.
    pub fn bounds(&self) -> Rect {
        if let Some(cull) = self.cull {
            return coords_rect(cull);
        }
        let mut bounds: Option<Rect> = None;
        for command in &self.commands {
            let touched = match command {
                PictureCommand::DrawRect { coords, .. }
                | PictureCommand::DrawOval { coords, .. }
                | PictureCommand::ClipRect { coords } => coords_rect(*coords),
                _ => continue,
            };
            bounds = Some(match bounds {
                Some(b) => b.union(&touched),
                None => touched,
            });
        }
        bounds.unwrap_or(Rect::new(0.0, 0.0, 1.0, 1.0))
    }

    /// Replay the picture into a fresh record.
    pub fn to_record(&self) -> Record {
        let mut recorder = Recorder::new();
        for command in &self.commands {
            match command {
                PictureCommand::DrawRect { coords, paint } => {
                    recorder.draw_rect(coords_rect(*coords), &paint.to_paint());
                }
                PictureCommand::DrawOval { coords, paint } => {
                    recorder.draw_oval(coords_rect(*coords), &paint.to_paint());
                }
                PictureCommand::ClipRect { coords } => {
                    recorder.clip_rect(coords_rect(*coords), ClipOp::Intersect, true);
                }
                PictureCommand::Save => recorder.save(),
                PictureCommand::SaveLayer { paint } => {
                    recorder.save_layer(None, paint.map(PicturePaint::to_paint).as_ref());
                }
                PictureCommand::Restore => recorder.restore(),
            }
        }
        recorder.into_record()
    }
}

/// Read and parse a picture file, then replay it into a record.
pub fn load_picture(path: &Path) -> Result<(Picture, Record), PictureError> {
    let text = fs::read_to_string(path).map_err(|source| PictureError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let picture = Picture::from_json(&text)?;
    let record = picture.to_record();
    Ok((picture, record))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "commands": [
            { "command": "Save", "visible": true },
            { "command": "ClipRect", "coords": [0, 0, 64, 64] },
            { "command": "SaveLayer", "paint": { "color": [128, 0, 0, 0] } },
            { "command": "DrawRect", "coords": [8, 8, 32, 32],
              "paint": { "color": [255, 16, 32, 48] } },
            { "command": "Restore" },
            { "command": "Restore" }
        ]
    }"#;

    #[test]
    fn parses_and_records() {
        let picture = Picture::from_json(SAMPLE).unwrap();
        let record = picture.to_record();
        assert_eq!(record.count(), 6);
        assert_eq!(record[0].name(), "Save");
        assert_eq!(record[2].name(), "SaveLayer");
        assert_eq!(record[3].paint().unwrap().alpha(), 255);
        assert!(record.balanced());
    }

    #[test]
    fn bounds_union_covers_the_draws() {
        let picture = Picture::from_json(SAMPLE).unwrap();
        assert_eq!(picture.bounds(), Rect::new(0.0, 0.0, 64.0, 64.0));
    }

    #[test]
    fn malformed_documents_are_errors() {
        assert!(Picture::from_json("{\"commands\": [{\"command\": \"DrawRect\"}]}").is_err());
        assert!(Picture::from_json("not json").is_err());
    }

    #[test]
    fn missing_paint_color_defaults_to_opaque_black() {
        let picture = Picture::from_json(
            r#"{"commands": [{"command": "DrawRect", "coords": [0,0,1,1], "paint": {}}]}"#,
        )
        .unwrap();
        let record = picture.to_record();
        assert_eq!(record[0].paint().unwrap().color, Color::BLACK);
    }
}
