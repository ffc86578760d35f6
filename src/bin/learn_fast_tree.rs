//! `learn_fast_tree`: reads ternary feature rows from stdin and learns an
//! ID3 decision tree, pretty-printed with the collapsing grammar.
//!
//! Ported from `original_source/learn_fast_tree.cc`'s `main`/`load_features`:
//! the first input line is the feature count, the second is the list of
//! offsets (passed through to the output unexamined), and the remaining
//! lines are `<descriptor> <count> <class>` rows.

use std::io::{self, Read, Write};
use std::path::PathBuf;

use clap::Parser;

use faster_rs::error::ParseError;
use faster_rs::fast::id3::{build_tree, Datapoint};
use faster_rs::fast::printer::print_tree;
use faster_rs::trit::parse_descriptor;

/// Learn an ID3 ternary decision tree from labeled feature descriptors.
#[derive(Parser, Debug)]
#[command(name = "learn_fast_tree", version, about = "Learn a FAST ternary decision tree from labeled feature rows")]
struct Args {
    /// Input file; reads stdin when omitted.
    #[arg(short = 'i', long = "input")]
    input: Option<PathBuf>,

    /// Output file; writes stdout when omitted. A `.gz` suffix
    /// gzip-compresses the output.
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Per-feature entropy weights, comma separated; defaults to 1.0 each.
    #[arg(long = "weights", value_delimiter = ',')]
    weights: Vec<f64>,

    /// Suppress progress messages on stderr.
    #[arg(short = 'q', long = "quiet", default_value_t = false)]
    quiet: bool,
}

fn log_if(show: bool, msg: String) {
    if show {
        eprintln!("{}", msg);
    }
}

/// Parse a single offset token of the form `[dx dy]`.
fn parse_offset_token(tok: &str) -> Option<(i32, i32)> {
    let inner = tok.strip_prefix('[')?.strip_suffix(']')?;
    let mut parts = inner.split_whitespace();
    let dx: i32 = parts.next()?.parse().ok()?;
    let dy: i32 = parts.next()?.parse().ok()?;
    Some((dx, dy))
}

fn run() -> Result<(), String> {
    let args = Args::parse();

    let text = match &args.input {
        Some(path) => std::fs::read_to_string(path).map_err(|e| format!("failed to read {:?}: {e}", path))?,
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf).map_err(|e| format!("failed to read stdin: {e}"))?;
            buf
        }
    };

    let mut lines = text.lines();

    let num_features: usize = lines
        .next()
        .ok_or("missing feature count line")?
        .trim()
        .parse()
        .map_err(|_| "first line must be the feature count".to_string())?;

    let offsets_line = lines.next().ok_or("missing offset list line")?;
    let offsets: Vec<(i32, i32)> = offsets_line
        .split_whitespace()
        .map(|tok| parse_offset_token(tok).ok_or_else(|| format!("malformed offset token: {tok}")))
        .collect::<Result<_, _>>()?;
    if offsets.len() != num_features {
        return Err(format!(
            "offset list has {} entries but feature count is {}",
            offsets.len(),
            num_features
        ));
    }

    let mut datapoints = Vec::new();
    for (lineno, line) in lines.enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut fields = line.split_whitespace();
        let descriptor_str = fields.next().ok_or_else(|| format!("row {}: missing descriptor", lineno + 3))?;
        let count: u64 = fields
            .next()
            .ok_or_else(|| format!("row {}: missing count", lineno + 3))?
            .parse()
            .map_err(|_| format!("row {}: count is not an integer", lineno + 3))?;
        let class: u32 = fields
            .next()
            .ok_or_else(|| format!("row {}: missing class", lineno + 3))?
            .parse()
            .map_err(|_| format!("row {}: class is not 0 or 1", lineno + 3))?;

        if descriptor_str.len() != num_features {
            return Err(format!(
                "row {}: descriptor length {} does not match feature count {}",
                lineno + 3,
                descriptor_str.len(),
                num_features
            ));
        }
        let descriptor = parse_descriptor(descriptor_str).map_err(|e: ParseError| format!("row {}: {e}", lineno + 3))?;
        datapoints.push(Datapoint::new(descriptor, count, class != 0));
    }

    let weights = if args.weights.is_empty() {
        vec![1.0; num_features]
    } else if args.weights.len() == num_features {
        args.weights.clone()
    } else {
        return Err(format!(
            "--weights has {} entries but feature count is {}",
            args.weights.len(),
            num_features
        ));
    };

    log_if(!args.quiet, format!("Loaded {} distinct feature rows", datapoints.len()));

    let tree = build_tree(datapoints, &weights).map_err(|e| e.to_string())?;

    let mut out = String::new();
    out.push_str(&format!("{}\n", num_features));
    for (dx, dy) in &offsets {
        out.push_str(&format!("[{} {}] ", dx, dy));
    }
    out.push('\n');
    out.push_str(&print_tree(&tree));

    match &args.output {
        Some(path) => faster_rs::io::write_text_output(path, &out).map_err(|e| format!("failed to write {:?}: {e}", path))?,
        None => {
            print!("{}", out);
            let _ = io::stdout().flush();
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
