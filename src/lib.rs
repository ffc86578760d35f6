//! FAST-ER: a repeatability-optimized ternary decision tree corner detector,
//! plus the machinery to learn, compile, and run it.
//!
//! Modules, leaves-first:
//! - `trit`: the three-valued comparison result.
//! - `offsets`: the pixel offset table and its 8 symmetry orientations.
//! - `tree`: the ternary decision tree data model.
//! - `eval`: the recursive tree evaluator.
//! - `bytecode`: compiling a tree to a flat instruction graph and running it
//!   over whole images.
//! - `dataset`: images, warp fields between image pairs, and dataset loading
//!   from the Cambridge/VGG on-disk layouts.
//! - `warp_png`: the 16-bit-per-channel warp PNG codec.
//! - `repeatability`: exact and fast-cached repeatability scoring.
//! - `learner`: the simulated-annealing tree learner.
//! - `fast`: the FAST feature enumerator, ID3 tree builder, and pretty
//!   printer.
//! - `detectors`: the narrow `Detector` capability and reference detectors
//!   used for comparison.
//! - `config`: the flat key/value configuration store.
//! - `error`: crate-wide error types.
//! - `io`: the gzip-aware output writer the CLI binaries share.

pub mod trit;
pub mod offsets;
pub mod tree;
pub mod eval;
pub mod bytecode;
pub mod dataset;
pub mod warp_png;
pub mod repeatability;
pub mod learner;
pub mod fast;
pub mod detectors;
pub mod config;
pub mod error;
pub mod io;

pub use config::Configuration;
pub use error::FasterError;
pub use offsets::OffsetTable;
pub use tree::Tree;



