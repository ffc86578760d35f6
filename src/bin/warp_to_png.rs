//! `warp_to_png`: re-encodes text warp files into the 16-bit RGB PNG warp
//! format.
//!
//! Ported from `original_source/warp_to_png.cc`'s `main`: by default, reads
//! one text warp (whitespace-separated `x y` pairs, row-major) from stdin
//! and writes one PNG to stdout, sized by `--width`/`--height` (the
//! original's `size` gvar, default 768x576). With `--dataset`, batch-
//! converts every `warps/warp_<i>_<j>.warp` file in a Cambridge-layout
//! dataset directory into `pngwarps/warp_<i>_<j>.png`.

use std::io::{self, Read, Write};
use std::path::PathBuf;

use clap::Parser;

use faster_rs::dataset::{WarpField, SENTINEL};
use faster_rs::warp_png;

/// Convert text warp files to the 16-bit PNG warp format.
#[derive(Parser, Debug)]
#[command(name = "warp_to_png", version, about = "Convert text warp files into 16-bit RGB PNG warp files")]
struct Args {
    /// Image width, used when reading a single warp from stdin.
    #[arg(long = "width", default_value_t = 768)]
    width: i32,

    /// Image height, used when reading a single warp from stdin.
    #[arg(long = "height", default_value_t = 576)]
    height: i32,

    /// Output file for single-warp mode; writes stdout when omitted.
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Batch mode: a dataset directory whose `warps/` subdirectory holds
    /// `warp_<i>_<j>.warp` text files to convert into `pngwarps/`.
    #[arg(long = "dataset")]
    dataset: Option<PathBuf>,

    /// Number of images in the dataset, for batch mode.
    #[arg(long = "num", default_value_t = 2)]
    num: usize,

    /// Suppress progress messages on stderr.
    #[arg(short = 'q', long = "quiet", default_value_t = false)]
    quiet: bool,
}

fn log_if(show: bool, msg: String) {
    if show {
        eprintln!("{}", msg);
    }
}

fn read_warp_field(text: &str, width: i32, height: i32) -> Result<WarpField, String> {
    let expected = (width as usize) * (height as usize);
    let mut field = WarpField::filled(width, height, SENTINEL);
    let mut tokens = text.split_whitespace();
    for i in 0..expected {
        let x: f32 = tokens
            .next()
            .ok_or_else(|| format!("warp ended after {i} of {expected} pixels"))?
            .parse()
            .map_err(|_| format!("malformed x coordinate at pixel {i}"))?;
        let y: f32 = tokens
            .next()
            .ok_or_else(|| format!("warp ended after {i} of {expected} pixels"))?
            .parse()
            .map_err(|_| format!("malformed y coordinate at pixel {i}"))?;
        field.values[i] = (x, y);
    }
    Ok(field)
}

fn convert_one(text: &str, width: i32, height: i32) -> Result<Vec<u8>, String> {
    let field = read_warp_field(text, width, height)?;
    warp_png::encode(&field).map_err(|e| e.to_string())
}

fn run_batch(dir: &PathBuf, num: usize, quiet: bool) -> Result<(), String> {
    let png_dir = dir.join("pngwarps");
    std::fs::create_dir_all(&png_dir).map_err(|e| format!("failed to create {:?}: {e}", png_dir))?;

    // Infer width/height from the first loadable frame, matching the
    // Cambridge on-disk layout's `frames/frame_<k>.pgm` convention.
    let first_frame = dir.join("frames").join("frame_0.pgm");
    let probe = image::open(&first_frame).map_err(|e| format!("failed to read {:?} to infer size: {e}", first_frame))?;
    let (width, height) = (probe.width() as i32, probe.height() as i32);

    for from in 0..num {
        for to in 0..num {
            if from == to {
                continue;
            }
            let text_path = dir.join("warps").join(format!("warp_{}_{}.warp", from, to));
            let text = std::fs::read_to_string(&text_path).map_err(|e| format!("failed to read {:?}: {e}", text_path))?;
            let bytes = convert_one(&text, width, height)?;
            let png_path = png_dir.join(format!("warp_{}_{}.png", from, to));
            std::fs::write(&png_path, &bytes).map_err(|e| format!("failed to write {:?}: {e}", png_path))?;
            log_if(!quiet, format!("wrote {:?}", png_path));
        }
    }
    Ok(())
}

fn run() -> Result<(), String> {
    let args = Args::parse();

    if let Some(dir) = &args.dataset {
        return run_batch(dir, args.num, args.quiet);
    }

    let mut text = String::new();
    io::stdin().read_to_string(&mut text).map_err(|e| format!("failed to read stdin: {e}"))?;
    let bytes = convert_one(&text, args.width, args.height)?;

    match &args.output {
        Some(path) => std::fs::write(path, &bytes).map_err(|e| format!("failed to write {:?}: {e}", path))?,
        None => {
            io::stdout().write_all(&bytes).map_err(|e| format!("failed to write stdout: {e}"))?;
        }
    }
    Ok(())
}

fn main() {
    env_logger::init();
    if let Err(msg) = run() {
        eprintln!("{msg}");
        std::process::exit(1);
    }
}
