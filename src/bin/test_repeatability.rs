//! `test_repeatability`: loads a detector (a learned tree or a reference
//! detector by name) plus a repeatability dataset, runs detection over
//! every image, and reports the exact repeatability.
//!
//! Simplified from `original_source/test_repeatability.cc`'s `mmain`: the
//! original sweeps detection over a table of target corner-per-frame
//! counts and an additive-noise series; this driver reports one
//! repeatability figure for one detector configuration as a held-out
//! evaluation run, rather than reimplementing that sweep.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;

use faster_rs::bytecode::{self};
use faster_rs::dataset::{Dataset, DatasetFormat};
use faster_rs::detectors;
use faster_rs::offsets::OffsetTable;
use faster_rs::repeatability::exact_repeatability;
use faster_rs::tree::Tree;
use faster_rs::Configuration;

/// Evaluate a detector's exact repeatability over a held-out dataset.
#[derive(Parser, Debug)]
#[command(name = "test_repeatability", version, about = "Report exact repeatability for a learned tree or reference detector")]
struct Args {
    /// Path to a `key = value` configuration file naming the dataset.
    #[arg(short = 'c', long = "config")]
    config: PathBuf,

    /// Path to a serialized tree (C2 format) to evaluate. Mutually
    /// exclusive with `--detector`.
    #[arg(long = "tree")]
    tree: Option<PathBuf>,

    /// Name of a reference detector (`fast9`, `fast12`, `harris`,
    /// `shitomasi`) to evaluate instead of a learned tree.
    #[arg(long = "detector")]
    detector: Option<String>,

    /// Suppress progress messages on stdout.
    #[arg(short = 'q', long = "quiet", default_value_t = false)]
    quiet: bool,
}

fn log_if(show: bool, msg: String) {
    if show {
        println!("{}", msg);
    }
}

fn run() -> Result<(), String> {
    let args = Args::parse();

    if args.tree.is_some() == args.detector.is_some() {
        return Err("exactly one of --tree or --detector must be given".to_string());
    }

    let config_text = fs::read_to_string(&args.config).map_err(|e| format!("failed to read {:?}: {e}", args.config))?;
    let config = Configuration::parse(&config_text).map_err(|e| format!("malformed config: {e}"))?;

    let dir = PathBuf::from(config.get_str("repeatability_dataset.directory").map_err(|e| e.to_string())?);
    let format_name = config.get_str_or("repeatability_dataset.format", "cambridge");
    let format = DatasetFormat::parse(format_name).map_err(|e| e.to_string())?;
    let num_images = config.get_usize_or("repeatability_dataset.size", 2);
    let fuzz = config.get_f64_or("fuzz", 5.0);
    let threshold = config.get_i64_or("FAST_threshold", 20) as i32;

    let t0 = Instant::now();
    let mut dataset = Dataset::load(&dir, num_images, format).map_err(|e| format!("failed to load dataset: {e}"))?;
    dataset.prune();
    log_if(!args.quiet, format!("Loaded {} images in {:.3}s", num_images, t0.elapsed().as_secs_f64()));

    let t1 = Instant::now();
    let corners: Vec<Vec<(i32, i32)>> = if let Some(tree_path) = &args.tree {
        let text = fs::read_to_string(tree_path).map_err(|e| format!("failed to read {:?}: {e}", tree_path))?;
        let tree = Tree::deserialize(&text).map_err(|e| format!("malformed tree: {e}"))?;

        let min_radius = config.get_f64_or("offsets.min_radius", 2.0);
        let max_radius = config.get_f64_or("offsets.max_radius", 3.0);
        let offsets = OffsetTable::new(min_radius, max_radius);
        let bbox = offsets.bbox();

        dataset
            .images
            .iter()
            .map(|image| {
                let program = bytecode::compile(&tree, &offsets, image.width);
                let xmin = -bbox.min.dx;
                let xmax = image.width - bbox.max.dx;
                let ymin = -bbox.min.dy;
                let ymax = image.height - bbox.max.dy;
                bytecode::detect_with_nms(&program, image, threshold, xmin, xmax, ymin, ymax)
                    .into_iter()
                    .map(|(x, y, _)| (x, y))
                    .collect()
            })
            .collect()
    } else {
        let name = args.detector.as_deref().unwrap();
        let detector = detectors::registry(name).map_err(|e| e.to_string())?;
        dataset
            .images
            .iter()
            .map(|image| detector.detect(image, &config).map_err(|e| e.to_string()))
            .collect::<Result<_, _>>()?
    };

    let mean_corners = corners.iter().map(|c| c.len()).sum::<usize>() as f64 / corners.len() as f64;
    let repeatability = exact_repeatability(&dataset.warps, &corners, fuzz);
    log_if(
        !args.quiet,
        format!("Detection took {:.3}s, {:.1} corners/image on average", t1.elapsed().as_secs_f64(), mean_corners),
    );

    println!("repeatability = {:.6}", repeatability);
    println!("mean_corners_per_image = {:.2}", mean_corners);
    Ok(())
}

fn main() {
    env_logger::init();
    if let Err(msg) = run() {
        eprintln!("{msg}");
        std::process::exit(1);
    }
}
