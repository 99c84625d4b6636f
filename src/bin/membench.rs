//! Memory benchmark over JSON picture files.
//!
//! For every input picture, replays the record under each optimization mode
//! onto the reference raster canvas, logging per-command allocation and
//! time, and writes a CSV plus JSON summary comparing the modes. PNG
//! renders are kept for the unoptimized and externally-rewritten replays so
//! results can be eyeballed against each other.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use indexmap::IndexMap;
use log::warn;

use recopt::picture::load_picture;
use recopt::summary::{
    BenchmarkSummary, Optimization, OptimizationRun, PictureBenchmark, RunStatus, UnsupportedStat,
};
use recopt::{
    optimize, optimize2, optimize_external, BridgeError, Dumper, IdentityRewriter, Pixmap,
    RasterCanvas, Record, Recorder, Symbol,
};

#[derive(Parser)]
#[command(about = "Run the record-optimizer memory bench over picture files")]
struct Args {
    /// JSON picture files to run the bench on.
    #[arg(long, required = true, num_args = 1..)]
    skps: Vec<PathBuf>,

    /// Directory to write logs, renders, and the summary into.
    #[arg(long)]
    out_dir: PathBuf,
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

struct ModeOutcome {
    bytes: i64,
    status: RunStatus,
    render: Option<Pixmap>,
}

fn run_mode(
    args: &Args,
    skp: &Path,
    record: &Record,
    (width, height): (u32, u32),
    mode: Optimization,
    unsupported: &mut IndexMap<Symbol, usize>,
) -> Result<ModeOutcome> {
    let mut record = record.clone();

    if let Optimization::External = mode {
        // The bridge replays through the wire contract; rebuild the record
        // from the returned program so the dump loop below measures the
        // rewritten scene.
        let mut replayed = Recorder::new();
        match optimize_external(&mut record, &mut replayed, &mut IdentityRewriter) {
            Ok(()) => record = replayed.into_record(),
            Err(BridgeError::RewriterFailed { unsupported: names }) => {
                warn!("rewriter failed on {}; skipping this mode", skp.display());
                for name in names {
                    warn!("unsupported draw command: {name}");
                    *unsupported.entry(name).or_insert(0) += 1;
                }
                return Ok(ModeOutcome {
                    bytes: -1,
                    status: RunStatus::Failed,
                    render: None,
                });
            }
            Err(error) => return Err(error.into()),
        }
    } else {
        match mode {
            Optimization::NoOpt => {}
            Optimization::Opts => optimize(&mut record),
            Optimization::Opts2 => optimize2(&mut record),
            Optimization::External => unreachable!(),
        }
    }

    let log_path = args
        .out_dir
        .join(format!("{}_{}_log.txt", file_name(skp), mode.name()));
    println!("Writing {}", log_path.display());
    let mut log = BufWriter::new(
        File::create(&log_path).with_context(|| format!("creating {}", log_path.display()))?,
    );

    let mut canvas = RasterCanvas::new(width, height);
    let mut dumper = Dumper::new(&mut canvas, &mut log, record.count());
    dumper
        .run(&record)
        .with_context(|| format!("writing {}", log_path.display()))?;
    let bytes = dumper.total_allocated() as i64;

    Ok(ModeOutcome {
        bytes,
        status: RunStatus::Success,
        render: Some(canvas.finish()),
    })
}

fn write_png(path: &Path, pixmap: &Pixmap) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut encoder = png::Encoder::new(BufWriter::new(file), pixmap.width(), pixmap.height());
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(&pixmap.to_rgba8())?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("creating {}", args.out_dir.display()))?;
    fs::create_dir_all(args.out_dir.join("renders"))?;
    fs::create_dir_all(args.out_dir.join("rewriter_renders"))?;

    let csv_path = args.out_dir.join("000_summary_csv.txt");
    println!("Writing summary to {}", csv_path.display());
    let mut csv = BufWriter::new(
        File::create(&csv_path).with_context(|| format!("creating {}", csv_path.display()))?,
    );

    write!(csv, "skp")?;
    for mode in Optimization::ALL {
        write!(csv, ",{}", mode.name())?;
    }
    writeln!(csv)?;

    let mut summary = BenchmarkSummary::default();
    let mut unsupported: IndexMap<Symbol, usize> = IndexMap::new();

    for skp in &args.skps {
        let (picture, record) = match load_picture(skp) {
            Ok(loaded) => loaded,
            Err(error) => {
                warn!("could not load {}: {error}; skipping", skp.display());
                continue;
            }
        };
        let bounds = picture.bounds();
        let dims = (
            (bounds.right.ceil() as u32).max(1),
            (bounds.bottom.ceil() as u32).max(1),
        );

        let mut benchmark = PictureBenchmark {
            name: skp.display().to_string(),
            runs: vec![],
        };
        write!(csv, "{}", skp.display())?;

        for mode in Optimization::ALL {
            let outcome = run_mode(&args, skp, &record, dims, mode, &mut unsupported)?;
            write!(csv, ",{}", outcome.bytes)?;
            benchmark.runs.push(OptimizationRun {
                optimization: mode,
                status: outcome.status,
                malloc_allocated_bytes: outcome.bytes,
            });

            let render_dir = match mode {
                Optimization::NoOpt => Some("renders"),
                Optimization::External => Some("rewriter_renders"),
                _ => None,
            };
            if let (Some(dir), Some(pixmap)) = (render_dir, &outcome.render) {
                let png_path = args.out_dir.join(dir).join(format!("{}.png", file_name(skp)));
                println!("{}", png_path.display());
                write_png(&png_path, pixmap)?;
            }
        }
        writeln!(csv)?;
        summary.pictures.push(benchmark);
    }
    csv.flush()?;

    unsupported.sort_by(|_, a, _, b| b.cmp(a));
    summary.unsupported_draw_commands = unsupported
        .into_iter()
        .map(|(draw_command, count)| UnsupportedStat {
            draw_command: draw_command.to_string(),
            count,
        })
        .collect();

    let json_path = args.out_dir.join("000_summary_csv.txt.json");
    let json = File::create(&json_path).with_context(|| format!("creating {}", json_path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(json), &summary)?;

    Ok(())
}
