//! `fast_n_features`: enumerates every ternary ring descriptor (classifying
//! each by the contiguous-arc rule) and folds in occurrence counts sampled
//! from a corpus of images, emitting `learn_fast_tree`-compatible rows.
//!
//! Ported from `original_source/fast_N_features.cc`'s `main`: the ring
//! radius `R`, the arc threshold `T`, and the input images are read; the
//! output is `N`, the offset list, then one `<descriptor> <count> <class>`
//! row per distinct descriptor in sorted order.

use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;

use faster_rs::bytecode::FlatImage;
use faster_rs::fast::{classify_descriptor, enumerate_all, extract_from_image, ring_offsets};

/// Enumerate FAST-N ternary feature descriptors and count their occurrences
/// in a corpus of images.
#[derive(Parser, Debug)]
#[command(name = "fast_n_features", version, about = "Enumerate and sample ternary ring descriptors for learn_fast_tree")]
struct Args {
    /// Ring radius (the original's `R` gvar).
    #[arg(long = "radius", default_value_t = 3.3)]
    radius: f64,

    /// Contiguous-arc length required for a corner classification.
    #[arg(long = "arc-len", default_value_t = 9)]
    arc_len: usize,

    /// Brighter/darker classification threshold (the original's `T` gvar).
    #[arg(long = "threshold", default_value_t = 30)]
    threshold: i32,

    /// Output file; writes stdout when omitted. A `.gz` suffix
    /// gzip-compresses the output.
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Suppress progress messages on stderr.
    #[arg(short = 'q', long = "quiet", default_value_t = false)]
    quiet: bool,

    /// Grayscale images to extract occurrence counts from.
    images: Vec<PathBuf>,
}

fn log_if(show: bool, msg: String) {
    if show {
        eprintln!("{}", msg);
    }
}

fn load_gray(path: &PathBuf) -> Result<FlatImage, String> {
    let img = image::open(path).map_err(|e| format!("failed to read {:?}: {e}", path))?;
    let gray = img.to_luma8();
    let (w, h) = (gray.width() as i32, gray.height() as i32);
    Ok(FlatImage::new(w, h, gray.into_raw()))
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let ring = ring_offsets(args.radius);
    let n = ring.len();
    log_if(!args.quiet, format!("Ring radius {} -> {} offsets", args.radius, n));

    let t0 = Instant::now();
    let classified = enumerate_all(n, args.arc_len);
    log_if(
        !args.quiet,
        format!("Enumerated {} distinct descriptors in {:.3}s", classified.len(), t0.elapsed().as_secs_f64()),
    );

    let mut class_of: HashMap<String, bool> = HashMap::new();
    let mut counts: HashMap<String, u64> = HashMap::new();
    for (descriptor, is_corner) in classified {
        class_of.insert(descriptor.clone(), is_corner);
        counts.insert(descriptor, 0);
    }

    for path in &args.images {
        let image = match load_gray(path) {
            Ok(im) => im,
            Err(e) => {
                eprintln!("{e}");
                std::process::exit(1);
            }
        };
        let extracted = extract_from_image(&image, &ring, args.threshold);
        for (descriptor, c) in extracted {
            // classify_descriptor is re-derived rather than trusted from the
            // brute-force table in case a descriptor somehow wasn't
            // pre-enumerated (never happens for n <= 20 but keeps this loop
            // correct for any n).
            class_of.entry(descriptor.clone()).or_insert_with(|| classify_descriptor(&parse_back(&descriptor), args.arc_len));
            *counts.entry(descriptor).or_insert(0) += c;
        }
    }

    let total: u64 = counts.values().sum();
    log_if(!args.quiet, format!("Total instances: {total}"));

    let mut rows: Vec<(&String, &bool)> = class_of.iter().collect();
    rows.sort_by(|a, b| a.0.cmp(b.0));

    let mut out = String::new();
    out.push_str(&format!("{}\n", n));
    for &(dx, dy) in &ring {
        out.push_str(&format!("[{} {}] ", dx, dy));
    }
    out.push('\n');
    for (descriptor, is_corner) in rows {
        let count = counts.get(descriptor).copied().unwrap_or(0);
        out.push_str(&format!("{} {} {}\n", descriptor, count, if *is_corner { 1 } else { 0 }));
    }

    match &args.output {
        Some(path) => {
            if let Err(e) = faster_rs::io::write_text_output(path, &out) {
                eprintln!("failed to write {:?}: {e}", path);
                std::process::exit(6);
            }
        }
        None => {
            print!("{}", out);
            let _ = std::io::stdout().flush();
        }
    }
}

fn parse_back(descriptor: &str) -> Vec<faster_rs::trit::Trit> {
    faster_rs::trit::parse_descriptor(descriptor).expect("extract_from_image only ever emits b/d/s characters")
}
