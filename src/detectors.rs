//! the narrow `Detector` capability plus a handful of reference
//! detectors used to benchmark the learned tree against.
//!
//! `fast9`/`fast12` are grounded in `original_source/fast_N_features.cc`'s
//! ring-and-arc classification, applied directly rather than through a
//! learned tree. `harris`/`shitomasi` are grounded in the structure-tensor
//! approach declared (but not defined — the `.cc` is absent from the
//! retrieved sources) in `original_source/harrislike.h`. `dog`/`susan` are
//! recognized names only: their corresponding `.cc` files are likewise
//! absent from the retrieved pack and are merely wrapped for comparison,
//! not implemented.

use crate::bytecode::FlatImage;
use crate::config::Configuration;
use crate::error::{ConfigError, FasterError};
use crate::fast::{classify_descriptor, ring_offsets};
use crate::trit::Trit;

pub type Position = (i32, i32);

/// A corner detector that can be run over a whole image given a
/// configuration.
pub trait Detector {
    fn detect(&self, image: &FlatImage, config: &Configuration) -> Result<Vec<Position>, FasterError>;
}

/// Plain ring-and-arc FAST, applied pixel-by-pixel without compiling a
/// tree: a corner iff the ring around it, read circularly, contains an arc
/// of `arc_len` consecutive Brighter or Darker trits.
pub struct FastN {
    pub arc_len: usize,
}

impl Detector for FastN {
    fn detect(&self, image: &FlatImage, config: &Configuration) -> Result<Vec<Position>, FasterError> {
        let threshold = config.get_i64_or("FAST_threshold", 20) as i32;
        let ring = ring_offsets(3.3);
        let (mut lo, mut hi) = (0i32, 0i32);
        for &(dx, dy) in &ring {
            lo = lo.min(dx).min(dy);
            hi = hi.max(dx).max(dy);
        }

        let mut out = Vec::new();
        for y in -lo..(image.height - hi) {
            for x in -lo..(image.width - hi) {
                let c = image.get(x, y);
                let descriptor: Vec<Trit> = ring.iter().map(|&(dx, dy)| Trit::classify(image.get(x + dx, y + dy), c, threshold)).collect();
                if classify_descriptor(&descriptor, self.arc_len) {
                    out.push((x, y));
                }
            }
        }
        Ok(out)
    }
}

fn sobel(image: &FlatImage, x: i32, y: i32) -> (f64, f64) {
    let at = |dx: i32, dy: i32| image.at(x + dx, y + dy) as f64;
    let gx = (at(1, -1) + 2.0 * at(1, 0) + at(1, 1)) - (at(-1, -1) + 2.0 * at(-1, 0) + at(-1, 1));
    let gy = (at(-1, 1) + 2.0 * at(0, 1) + at(1, 1)) - (at(-1, -1) + 2.0 * at(0, -1) + at(1, -1));
    (gx, gy)
}

/// The structure tensor (summed over a `window` x `window` neighbourhood)
/// at `(x, y)`.
fn structure_tensor(image: &FlatImage, x: i32, y: i32, window: i32) -> (f64, f64, f64) {
    let (mut sxx, mut sxy, mut syy) = (0.0, 0.0, 0.0);
    for dy in -window..=window {
        for dx in -window..=window {
            let (gx, gy) = sobel(image, x + dx, y + dy);
            sxx += gx * gx;
            sxy += gx * gy;
            syy += gy * gy;
        }
    }
    (sxx, sxy, syy)
}

fn non_max_suppress(scores: &[f64], width: i32, height: i32, min_score: f64) -> Vec<Position> {
    let mut out = Vec::new();
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let s = scores[(y * width + x) as usize];
            if s <= min_score {
                continue;
            }
            let mut is_max = true;
            'n: for dy in -1..=1 {
                for dx in -1..=1 {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    if scores[((y + dy) * width + (x + dx)) as usize] > s {
                        is_max = false;
                        break 'n;
                    }
                }
            }
            if is_max {
                out.push((x, y));
            }
        }
    }
    out
}

/// The Harris corner response `det(M) - k * trace(M)^2`, thresholded and
/// non-max-suppressed.
pub struct Harris;

impl Detector for Harris {
    fn detect(&self, image: &FlatImage, config: &Configuration) -> Result<Vec<Position>, FasterError> {
        let window = config.get_i64_or("harris.window", 2) as i32;
        let k = config.get_f64_or("harris.k", 0.04);
        let min_score = config.get_f64_or("harris.threshold", 1e6);

        let (w, h) = (image.width, image.height);
        let mut scores = vec![0.0f64; (w as usize) * (h as usize)];
        for y in window + 1..h - window - 1 {
            for x in window + 1..w - window - 1 {
                let (sxx, sxy, syy) = structure_tensor(image, x, y, window);
                let det = sxx * syy - sxy * sxy;
                let trace = sxx + syy;
                scores[(y * w + x) as usize] = det - k * trace * trace;
            }
        }
        Ok(non_max_suppress(&scores, w, h, min_score))
    }
}

/// The Shi-Tomasi response, the structure tensor's smaller eigenvalue,
/// thresholded and non-max-suppressed.
pub struct ShiTomasi;

impl Detector for ShiTomasi {
    fn detect(&self, image: &FlatImage, config: &Configuration) -> Result<Vec<Position>, FasterError> {
        let window = config.get_i64_or("shitomasi.window", 2) as i32;
        let min_score = config.get_f64_or("shitomasi.threshold", 1e5);

        let (w, h) = (image.width, image.height);
        let mut scores = vec![0.0f64; (w as usize) * (h as usize)];
        for y in window + 1..h - window - 1 {
            for x in window + 1..w - window - 1 {
                let (sxx, sxy, syy) = structure_tensor(image, x, y, window);
                let trace = sxx + syy;
                let det = sxx * syy - sxy * sxy;
                let disc = (trace * trace - 4.0 * det).max(0.0).sqrt();
                let lambda_min = (trace - disc) / 2.0;
                scores[(y * w + x) as usize] = lambda_min;
            }
        }
        Ok(non_max_suppress(&scores, w, h, min_score))
    }
}

/// Dispatch a detector by configuration name, matching the `detector`
/// configuration key.
/// `"dog"`/`"susan"` are recognized names that report
/// [`ConfigError::UnsupportedDetector`] rather than an unknown-name error.
pub fn registry(name: &str) -> Result<Box<dyn Detector>, ConfigError> {
    match name {
        "fast9" => Ok(Box::new(FastN { arc_len: 9 })),
        "fast12" => Ok(Box::new(FastN { arc_len: 12 })),
        "harris" => Ok(Box::new(Harris)),
        "shitomasi" => Ok(Box::new(ShiTomasi)),
        "dog" | "susan" => Err(ConfigError::UnsupportedDetector(name.to_string())),
        other => Err(ConfigError::UnknownDetector(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_dispatches_known_detectors() {
        assert!(registry("fast9").is_ok());
        assert!(registry("fast12").is_ok());
        assert!(registry("harris").is_ok());
        assert!(registry("shitomasi").is_ok());
    }

    #[test]
    fn registry_reports_unsupported_for_recognized_but_unimplemented() {
        assert!(matches!(registry("dog"), Err(ConfigError::UnsupportedDetector(_))));
        assert!(matches!(registry("susan"), Err(ConfigError::UnsupportedDetector(_))));
    }

    #[test]
    fn registry_rejects_unknown_name() {
        assert!(matches!(registry("nonsense"), Err(ConfigError::UnknownDetector(_))));
    }

    #[test]
    fn fast9_detects_a_synthetic_bright_corner() {
        let mut image = FlatImage::filled(30, 30, 100);
        for y in 10..20 {
            for x in 10..20 {
                image.set(x, y, 200);
            }
        }
        let config = Configuration::new();
        let detector = FastN { arc_len: 9 };
        let corners = detector.detect(&image, &config).unwrap();
        assert!(corners.iter().any(|&(x, y)| (9..=11).contains(&x) && (9..=11).contains(&y)));
    }

    #[test]
    fn flat_image_has_no_harris_corners() {
        let image = FlatImage::filled(20, 20, 128);
        let config = Configuration::new();
        let corners = Harris.detect(&image, &config).unwrap();
        assert!(corners.is_empty());
    }
}
