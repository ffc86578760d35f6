//! output writing helper shared by the CLI binaries.
//!
//! Mirrors the teacher's `write_matrix_tsv`'s `.gz`-suffix convention: a
//! path ending in `.gz` gets its contents gzip-compressed on the way out
//! rather than written as plain text. The learned-tree and enumerated-
//! descriptor dumps these binaries emit can run to many megabytes, so the
//! convention carries over even though the text format itself hasn't
//! changed.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;

/// Write `text` to `path`, gzip-compressing it first if `path`'s name ends
/// in `.gz`.
pub fn write_text_output(path: &Path, text: &str) -> io::Result<()> {
    let file = File::create(path)?;
    if path.to_string_lossy().ends_with(".gz") {
        let mut out = BufWriter::new(GzEncoder::new(file, Compression::default()));
        out.write_all(text.as_bytes())
    } else {
        let mut out = BufWriter::new(file);
        out.write_all(text.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gz_suffixed_output_is_gzip_compressed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt.gz");
        write_text_output(&path, "hello\n").unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..2], &[0x1f, 0x8b], "gzip magic bytes");
    }

    #[test]
    fn plain_output_is_written_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        write_text_output(&path, "hello\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello\n");
    }
}
