//! FAST feature enumeration, the ID3 tree builder, and the pretty printer
//! for the independent FAST/ID3 learning pipeline.
//!
//! Grounded in `original_source/fast_N_features.cc` and
//! `original_source/learn_fast_tree.cc`.

pub mod enumerate;
pub mod id3;
pub mod printer;

pub use enumerate::{classify_descriptor, enumerate_all, extract_from_image, ring_offsets};
pub use id3::{build_tree, entropy, find_best_split, Datapoint, Id3Tree};
pub use printer::print_tree;
