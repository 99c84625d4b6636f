use recopt::test::{draw_rect, record, restore, save_layer};
use recopt::wire::{self, Instruction, Program, ProgramStatus, WireRecord};
use recopt::{
    optimize_external, serialize_record, BridgeError, IdentityRewriter, Record, Recorder, Rewriter,
    Symbol,
};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A rewriter that answers with a canned program, whatever the record.
struct Scripted(Program);

impl Rewriter for Scripted {
    fn rewrite(&mut self, _record_frame: &[u8]) -> Vec<u8> {
        wire::encode(&self.0)
    }
}

fn replay(record: &mut Record, rewriter: &mut dyn Rewriter) -> Result<Record, BridgeError> {
    let mut recorder = Recorder::new();
    optimize_external(record, &mut recorder, rewriter)?;
    Ok(recorder.into_record())
}

#[test]
fn identity_program_reproduces_the_record() {
    init();
    let mut r = record(vec![
        save_layer(None),
        draw_rect(8.0, 0xFF00_00FF),
        restore(),
    ]);
    let original = r.clone();
    let replayed = replay(&mut r, &mut IdentityRewriter).unwrap();
    assert_eq!(replayed, original);
    assert_eq!(r, original);
}

#[test]
fn scripted_rewriter_drops_an_empty_layer() {
    init();
    // The external path is free to eliminate a paintless, drawless layer
    // that the peephole pipelines leave alone.
    let mut r = record(vec![
        draw_rect(8.0, 0xFF00_00FF),
        save_layer(None),
        restore(),
    ]);
    let mut rewriter = Scripted(Program {
        status: ProgramStatus::Ok,
        instructions: vec![Instruction::CopyRecord {
            index: 0,
            paint: None,
        }],
        unsupported: vec![],
    });
    let replayed = replay(&mut r, &mut rewriter).unwrap();
    assert_eq!(replayed.count(), 1);
    assert_eq!(replayed[0].name(), "DrawRect");
}

#[test]
fn copy_record_overrides_alpha_when_not_opaque() {
    init();
    let mut r = record(vec![draw_rect(8.0, 0xFF10_2030)]);
    let wire_record = serialize_record(&r);
    let mut paint = match &wire_record.records[0].command {
        wire::WireCommand::Draw { paint, .. } => paint.unwrap(),
        other => panic!("unexpected {other:?}"),
    };
    paint.color.a = 0x40;

    let mut rewriter = Scripted(Program {
        status: ProgramStatus::Ok,
        instructions: vec![Instruction::CopyRecord {
            index: 0,
            paint: Some(paint),
        }],
        unsupported: vec![],
    });
    let replayed = replay(&mut r, &mut rewriter).unwrap();
    // The record's own paint was mutated, then replayed.
    assert_eq!(r[0].paint().unwrap().alpha(), 0x40);
    assert_eq!(replayed[0].paint().unwrap().alpha(), 0x40);
    assert_eq!(replayed[0].paint().unwrap().color.r, 0x10);
}

#[test]
fn failed_run_preserves_the_record_and_names_commands() {
    init();
    let mut r = record(vec![draw_rect(8.0, 0xFF00_00FF)]);
    let original = r.clone();
    let mut rewriter = Scripted(Program {
        status: ProgramStatus::Failed,
        instructions: vec![],
        unsupported: vec!["DrawVertices".to_owned(), "DrawPatch".to_owned()],
    });
    let mut recorder = Recorder::new();
    let error = optimize_external(&mut r, &mut recorder, &mut rewriter).unwrap_err();
    match error {
        BridgeError::RewriterFailed { unsupported } => {
            assert_eq!(
                unsupported,
                vec![Symbol::from("DrawVertices"), Symbol::from("DrawPatch")]
            );
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(r, original);
    assert_eq!(recorder.into_record().count(), 0);
}

#[test]
fn unknown_clip_op_replays_as_intersect() {
    init();
    let mut r = Record::new();
    let mut rewriter = Scripted(Program {
        status: ProgramStatus::Ok,
        instructions: vec![Instruction::ClipRect {
            bounds: recopt::Rect::new(0.0, 0.0, 4.0, 4.0),
            op: wire::WireClipOp::Unknown,
            anti_alias: true,
        }],
        unsupported: vec![],
    });
    let replayed = replay(&mut r, &mut rewriter).unwrap();
    match &replayed[0] {
        recopt::Command::ClipRect(clip) => assert_eq!(clip.op, recopt::ClipOp::Intersect),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn synthetic_save_layer_and_transform_instructions_replay() {
    init();
    let mut r = record(vec![draw_rect(8.0, 0xFF00_00FF)]);
    let layer_paint = wire::WirePaint {
        color: recopt::Color::argb(0x80, 0, 0, 0),
        blend: wire::WireBlendMode::SrcOver,
        image_filter: false,
        color_filter: false,
        path_effect: false,
        mask_filter: false,
        shader: false,
    };
    let mut matrix = [0.0f32; 16];
    matrix[0] = 2.0;
    matrix[5] = 2.0;
    matrix[10] = 1.0;
    matrix[15] = 1.0;

    let mut rewriter = Scripted(Program {
        status: ProgramStatus::Ok,
        instructions: vec![
            Instruction::Save,
            Instruction::Concat44 { matrix },
            Instruction::SaveLayer {
                bounds: None,
                paint: layer_paint,
            },
            Instruction::CopyRecord {
                index: 0,
                paint: None,
            },
            Instruction::Restore,
            Instruction::Restore,
        ],
        unsupported: vec![],
    });
    let replayed = replay(&mut r, &mut rewriter).unwrap();
    assert_eq!(
        recopt::test::names(&replayed),
        vec![
            "Save",
            "Concat44",
            "SaveLayer",
            "DrawRect",
            "Restore",
            "Restore"
        ]
    );
    match &replayed[2] {
        recopt::Command::SaveLayer(layer) => {
            assert_eq!(layer.paint.unwrap().alpha(), 0x80);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(replayed.balanced());
}

#[test]
fn wire_snapshot_carries_presence_bits_only() {
    init();
    let mut paint = recopt::Paint::new(recopt::Color::from_argb32(0x80AA_BBCC));
    paint.shader = true;
    paint.mask_filter = true;
    let mut r = Record::new();
    r.append(recopt::DrawRect {
        rect: recopt::Rect::new(0.0, 0.0, 2.0, 2.0),
        paint,
    });

    let wire_record = serialize_record(&r);
    match &wire_record.records[0].command {
        wire::WireCommand::Draw { name, paint } => {
            assert_eq!(name, "DrawRect");
            let paint = paint.unwrap();
            assert!(paint.shader);
            assert!(paint.mask_filter);
            assert!(!paint.image_filter);
            assert_eq!(paint.color, recopt::Color::from_argb32(0x80AA_BBCC));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn frames_survive_the_full_encode_decode_cycle() {
    init();
    let r = record(vec![
        save_layer(None),
        draw_rect(8.0, 0xFF00_00FF),
        restore(),
    ]);
    let frame = wire::encode(&serialize_record(&r));
    let back: WireRecord = wire::decode(&frame).unwrap();
    assert_eq!(back, serialize_record(&r));
}
