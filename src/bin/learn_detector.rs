//! `learn_detector`: runs the simulated-annealing tree learner over a
//! repeatability dataset and prints the final accepted tree.
//!
//! Ported from `original_source/learn_detector.cc`'s `mmain`: load a
//! GVars3-style config file, build the offset table from
//! `offsets.min_radius`/`offsets.max_radius`, load the dataset named by
//! `repeatability_dataset.{directory,format,size}`, anneal, print the tree.

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;

use faster_rs::dataset::{Dataset, DatasetFormat};
use faster_rs::offsets::OffsetTable;
use faster_rs::{learner, Configuration};

/// Learn a repeatability-optimized ternary decision tree corner detector.
#[derive(Parser, Debug)]
#[command(name = "learn_detector", version, about = "Anneal a FAST-ER corner detector tree from a repeatability dataset")]
struct Args {
    /// Path to a `key = value` configuration file.
    #[arg(short = 'c', long = "config")]
    config: PathBuf,

    /// Where to write the learned tree. `-` (the default) means stdout; a
    /// `.gz` suffix gzip-compresses the output.
    #[arg(short = 'o', long = "output", default_value = "-")]
    output: PathBuf,

    /// Suppress progress messages on stdout.
    #[arg(short = 'q', long = "quiet", default_value_t = false)]
    quiet: bool,
}

fn log_if(show: bool, msg: String) {
    if show {
        println!("{}", msg);
    }
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let config_text = match fs::read_to_string(&args.config) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("failed to read config {:?}: {e}", args.config);
            std::process::exit(2);
        }
    };
    let config = match Configuration::parse(&config_text) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("malformed config {:?}: {e}", args.config);
            std::process::exit(2);
        }
    };

    let min_radius = config.get_f64_or("offsets.min_radius", 2.0);
    let max_radius = config.get_f64_or("offsets.max_radius", 3.0);
    let offsets = OffsetTable::new(min_radius, max_radius);
    log_if(!args.quiet, format!("Offset table: {} offsets per orientation", offsets.num_offsets()));

    let dir = match config.get_str("repeatability_dataset.directory") {
        Ok(d) => PathBuf::from(d),
        Err(e) => {
            eprintln!("config error: {e}");
            std::process::exit(2);
        }
    };
    let format_name = config.get_str_or("repeatability_dataset.format", "cambridge");
    let format = match DatasetFormat::parse(format_name) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("config error: {e}");
            std::process::exit(2);
        }
    };
    let num_images = config.get_usize_or("repeatability_dataset.size", 2);

    let t0 = Instant::now();
    let mut dataset = match Dataset::load(&dir, num_images, format) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("failed to load dataset from {:?}: {e}", dir);
            std::process::exit(5);
        }
    };
    dataset.prune();
    log_if(!args.quiet, format!("Loaded {} images from {:?} in {:.3}s", num_images, dir, t0.elapsed().as_secs_f64()));

    let iterations = config.get_usize_or("iterations", 1000);
    log_if(!args.quiet, format!("Annealing for {} iterations", iterations));

    let t1 = Instant::now();
    let tree = learner::learn(&config, &offsets, &dataset);
    log_if(
        !args.quiet,
        format!(
            "Learned a {}-node tree in {:.3}s",
            tree.num_nodes(),
            t1.elapsed().as_secs_f64()
        ),
    );

    let text = tree.serialize();
    if args.output.as_os_str() == "-" {
        print!("{}", text);
    } else {
        if let Err(e) = faster_rs::io::write_text_output(&args.output, &text) {
            eprintln!("failed to write tree to {:?}: {e}", args.output);
            std::process::exit(6);
        }
        log_if(!args.quiet, format!("Wrote tree to {:?}", args.output));
    }
    let _ = std::io::stdout().flush();
}
