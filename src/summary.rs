/*!
The benchmark summary schema.

The `membench` binary fills these in and writes them out as JSON next to
its CSV; they are the machine-readable record of a benchmark run.
*/

use serde::{Deserialize, Serialize};

/// The optimization modes the benchmark compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Optimization {
    /// Replay the record untouched.
    NoOpt,
    /// The default peephole pipeline, [`optimize`](crate::optimize).
    Opts,
    /// The extended pipeline, [`optimize2`](crate::optimize2).
    Opts2,
    /// The external-rewriter bridge.
    External,
}

impl Optimization {
    /// Every mode, in the order the benchmark runs them.
    pub const ALL: [Optimization; 4] = [
        Optimization::NoOpt,
        Optimization::Opts,
        Optimization::Opts2,
        Optimization::External,
    ];

    /// The mode's name as it appears in CSV headers and file names.
    pub fn name(self) -> &'static str {
        match self {
            Optimization::NoOpt => "no_opt",
            Optimization::Opts => "opts",
            Optimization::Opts2 => "opts2",
            Optimization::External => "external",
        }
    }
}

/// Whether one mode succeeded on one picture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// The record replayed and was measured.
    Success,
    /// The mode failed; the picture's row carries no byte count.
    Failed,
}

/// The measurement of one mode on one picture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationRun {
    /// Which mode ran.
    pub optimization: Optimization,
    /// Whether it succeeded.
    pub status: RunStatus,
    /// Total bytes allocated during replay; -1 on failure.
    pub malloc_allocated_bytes: i64,
}

/// All modes' measurements for one picture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PictureBenchmark {
    /// The picture's path as given on the command line.
    pub name: String,
    /// One entry per mode, in run order.
    pub runs: Vec<OptimizationRun>,
}

/// How often one unsupported draw command kept the rewriter from running.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnsupportedStat {
    /// The command's name tag.
    pub draw_command: String,
    /// Occurrences across all failed pictures.
    pub count: usize,
}

/// The whole benchmark run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BenchmarkSummary {
    /// Per-picture measurements.
    pub pictures: Vec<PictureBenchmark>,
    /// Unsupported-command counts aggregated across all pictures,
    /// most frequent first.
    pub unsupported_draw_commands: Vec<UnsupportedStat>,
}
