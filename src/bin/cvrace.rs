//! cvrace - record moving-object positions from a camera or image sequence
//!
//! Subcommands:
//! 1. `record`: run a paced capture session, write the position CSV
//! 2. `still`: diff two still images, print spots, optionally dump images
//! 3. `inspect`: summarize an existing position CSV

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::Duration;

use cvrace::ingest::file::load_luma;
use cvrace::ui::{format_duration, Ui, UiMode};
use cvrace::{
    group_rows, load_position_rows, CaptureWorker, DiffMode, ExtractorKind, Frame, MonotonicClock,
    MotionPipeline, Session, SessionConfig, SessionOverrides,
};

#[derive(Parser, Debug)]
#[command(name = "cvrace", version, about = "Frame-difference motion positions")]
struct Args {
    /// Session config file (TOML, or JSON with a .json extension).
    #[arg(long, global = true, env = "CVRACE_CONFIG")]
    config: Option<PathBuf>,

    /// auto | plain | pretty
    #[arg(long, global = true, default_value = "auto")]
    ui: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Capture until Ctrl-C (or the frame limit) and write positions as CSV
    Record {
        /// synthetic | images | v4l2
        #[arg(long)]
        source: Option<String>,
        /// Image directory or device node.
        #[arg(long)]
        location: Option<String>,
        /// contour | delaunay
        #[arg(long)]
        extractor: Option<String>,
        /// signed | clipped | absolute
        #[arg(long)]
        diff_mode: Option<String>,
        #[arg(long)]
        fps: Option<f64>,
        #[arg(long)]
        max_frames: Option<u64>,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// epoch_seconds | monotonic_millis
        #[arg(long)]
        time_format: Option<String>,
    },

    /// Run the pipeline once on two still images
    Still {
        before: PathBuf,
        after: PathBuf,
        #[arg(long)]
        extractor: Option<String>,
        #[arg(long)]
        diff_mode: Option<String>,
        /// Write diff.png and mask.png here.
        #[arg(long)]
        dump_dir: Option<PathBuf>,
    },

    /// Summarize a position file
    Inspect {
        csv: PathBuf,
        /// Print every sample.
        #[arg(short, long)]
        verbose: bool,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let ui = Ui::new(UiMode::parse(&args.ui)?, std::io::stderr().is_terminal());

    match args.command {
        Command::Record {
            source,
            location,
            extractor,
            diff_mode,
            fps,
            max_frames,
            output,
            time_format,
        } => {
            let mut config = SessionConfig::load_unvalidated(args.config.as_deref())?;
            config.apply_overrides(&SessionOverrides {
                source,
                location,
                extractor,
                diff_mode,
                fps,
                max_frames,
                output,
                time_format,
            })?;
            config.validate()?;
            record(config, &ui)
        }
        Command::Still {
            before,
            after,
            extractor,
            diff_mode,
            dump_dir,
        } => {
            // Only detector settings matter here; the capture source is unused.
            let config = SessionConfig::load_unvalidated(args.config.as_deref())?;
            let extractor = match extractor {
                Some(name) => ExtractorKind::parse(&name)?,
                None => config.extractor,
            };
            let mode = match diff_mode {
                Some(name) => DiffMode::parse(&name)?,
                None => config.diff_mode,
            };
            still(&config, extractor, mode, &before, &after, dump_dir.as_deref())
        }
        Command::Inspect { csv, verbose } => inspect(&csv, verbose),
    }
}

fn record(config: SessionConfig, ui: &Ui) -> Result<()> {
    let output = config.output.clone();
    let time_format = config.time_format;

    let worker = CaptureWorker::spawn(move || Session::open(&config, MonotonicClock::shared()))?;
    let stop = worker.stop_flag();
    ctrlc::set_handler(move || {
        stop.store(true, std::sync::atomic::Ordering::SeqCst);
    })
    .expect("error setting Ctrl-C handler");

    log::info!("recording; press Ctrl-C to stop");
    let report = {
        let stage = ui.stage("recording");
        while !worker.is_finished() {
            std::thread::sleep(Duration::from_millis(200));
            stage.update(&format_duration(stage.elapsed()));
        }
        worker.join()?
    };
    {
        let _stage = ui.stage(&format!("writing {}", output.display()));
        report.history.save_csv(&output, time_format)?;
    }
    log::info!(
        "{} samples ({} spots) in {:.1}s, {} lag events",
        report.summary.samples,
        report.summary.spots,
        report.summary.elapsed.as_secs_f64(),
        report.summary.lag_events
    );
    Ok(())
}

fn still(
    config: &SessionConfig,
    extractor: ExtractorKind,
    mode: DiffMode,
    before: &Path,
    after: &Path,
    dump_dir: Option<&Path>,
) -> Result<()> {
    let previous = Frame::new(load_luma(before)?, Duration::ZERO);
    let current = Frame::new(load_luma(after)?, Duration::ZERO);
    if previous.dimensions() != current.dimensions() {
        return Err(anyhow!(
            "images differ in size: {:?} vs {:?}",
            previous.dimensions(),
            current.dimensions()
        ));
    }

    let pipeline = MotionPipeline::new(&config.settings, mode, extractor);
    let inspection = pipeline.inspect(&previous, &current)?;

    if let Some(dir) = dump_dir {
        std::fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
        inspection.diff.image().save(dir.join("diff.png"))?;
        inspection.mask.save(dir.join("mask.png"))?;
        log::info!("wrote diff.png and mask.png to {}", dir.display());
    }

    println!(
        "{} region(s), {} spot(s) after merging ({} extractor)",
        inspection.raw_spots.len(),
        inspection.spots.len(),
        pipeline.extractor_name()
    );
    for spot in &inspection.spots {
        println!("{:.2},{:.2}", spot.x, spot.y);
    }
    Ok(())
}

fn inspect(path: &Path, verbose: bool) -> Result<()> {
    let rows = load_position_rows(path)?;
    let groups = group_rows(&rows);
    let (Some(first), Some(last)) = (groups.first(), groups.last()) else {
        println!("{}: no positions", path.display());
        return Ok(());
    };

    let max_spots = groups.iter().map(|g| g.spots.len()).max().unwrap_or(0);
    println!("{}", path.display());
    println!("  rows:     {}", rows.len());
    println!("  samples:  {}", groups.len());
    println!("  span:     {} .. {} ({:.3})", first.time, last.time, last.time - first.time);
    println!("  max spots per sample: {}", max_spots);
    if verbose {
        for group in &groups {
            let spots: Vec<String> = group
                .spots
                .iter()
                .map(|s| format!("({:.1}, {:.1})", s.x, s.y))
                .collect();
            println!("  {} {}", group.time, spots.join(" "));
        }
    }
    Ok(())
}
