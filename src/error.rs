//! Crate-wide error types.
//!
//! Grouped the way a layered `thiserror` stack usually is in this pack: one
//! enum per subsystem, folded into a single top-level [`FasterError`] via
//! `#[from]` so library functions can return one `Result` type regardless of
//! which subsystem failed.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while reading or interpreting the flat key/value
/// configuration store.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required configuration key `{0}`")]
    MissingKey(String),

    #[error("configuration key `{key}` has value `{value}` which is not a valid {expected}")]
    WrongType {
        key: String,
        value: String,
        expected: &'static str,
    },

    #[error("unknown dataset format `{0}` (expected cambridge, cam-png, or vgg)")]
    UnknownFormat(String),

    #[error("unknown detector `{0}`")]
    UnknownDetector(String),

    #[error("detector `{0}` is recognized but not implemented by this build")]
    UnsupportedDetector(String),

    #[error("malformed configuration line {line}: {text}")]
    MalformedLine { line: usize, text: String },
}

/// Errors raised while loading a dataset (images + warp fields).
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to read image {path:?}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to read warp file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("warp file {path:?} ended after {found} of {expected} expected pixels")]
    TruncatedWarp {
        path: PathBuf,
        found: usize,
        expected: usize,
    },

    #[error("warp PNG {path:?} has size {found:?}, expected {expected:?}")]
    WarpSizeMismatch {
        path: PathBuf,
        found: (u32, u32),
        expected: (u32, u32),
    },

    #[error("image {path:?} has size {found:?}, expected {expected:?}")]
    ImageSizeMismatch {
        path: PathBuf,
        found: (u32, u32),
        expected: (u32, u32),
    },

    #[error("dataset has no images")]
    Empty,

    #[error("homography file {0:?} did not contain 9 values")]
    MalformedHomography(PathBuf),

    #[error("homography for image {0} is not invertible")]
    SingularHomography(usize),

    #[error("PNG warp codec error: {0}")]
    Png(String),
}

/// Errors raised while parsing a serialized tree or feature line.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("empty or whitespace-only line where a tree node was expected")]
    EmptyLine,

    #[error("expected {expected} fields, found {found} in line: {line}")]
    FieldCount {
        expected: usize,
        found: usize,
        line: String,
    },

    #[error("could not parse `{text}` as {expected}")]
    BadToken { text: String, expected: &'static str },

    #[error("unrecognized node tag `{0}` (expected an offset index or `Is`)")]
    UnknownTag(String),

    #[error("feature descriptor `{0}` contains a character other than b/d/s")]
    BadTrit(String),

    #[error("feature descriptor length {found} exceeds the maximum supported length {max}")]
    DescriptorTooLong { found: usize, max: usize },
}

/// Errors raised by the ID3 tree builder.
#[derive(Debug, Error)]
pub enum Id3Error {
    #[error(
        "could not find a splitting feature for {num_datapoints} datapoints: \
         the class is not a deterministic function of the given features"
    )]
    Unsplittable { num_datapoints: u64 },

    #[error("feature count mismatch: weights has {weights} entries but descriptors have {features}")]
    WeightCountMismatch { weights: usize, features: usize },
}

/// The crate's top-level error type.
#[derive(Debug, Error)]
pub enum FasterError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Id3(#[from] Id3Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Exit codes: 0 success; nonzero on malformed tree, malformed feature
/// descriptor, unsplittable ID3 input, or unsupported descriptor length.
impl FasterError {
    pub fn exit_code(&self) -> i32 {
        match self {
            FasterError::Parse(ParseError::DescriptorTooLong { .. }) => 4,
            FasterError::Parse(_) => 1,
            FasterError::Id3(_) => 3,
            FasterError::Config(_) => 2,
            FasterError::Dataset(_) => 5,
            FasterError::Io(_) => 6,
        }
    }
}
