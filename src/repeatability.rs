//! repeatability scoring, in the two variants the original ships.
//!
//! Ported from `original_source/test_repeatability.cc`
//! (`compute_repeatability_exact`, real-valued, rayon-parallel here) and
//! `original_source/learn_detector.cc` (`generate_disc`, `paint_circles`,
//! `compute_repeatability`, the cached variant used inside the annealing
//! loop's hot path).

use rayon::prelude::*;

use crate::dataset::WarpField;

/// A disc of offsets with squared-distance `<= radius^2`, the shape
/// [`paint_disc`] stamps around every detected corner. Mirrors
/// `generate_disc`.
pub fn generate_disc(radius: i32) -> Vec<(i32, i32)> {
    let mut out = Vec::new();
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= radius * radius {
                out.push((dx, dy));
            }
        }
    }
    out
}

/// Paint `true` at every position within `disc` of any corner, clipped to
/// `(width, height)`. Mirrors `paint_circles`.
pub fn paint_disc(
    corners: &[(i32, i32)],
    disc: &[(i32, i32)],
    width: i32,
    height: i32,
) -> Vec<bool> {
    let mut painted = vec![false; (width as usize) * (height as usize)];
    for &(cx, cy) in corners {
        for &(dx, dy) in disc {
            let (x, y) = (cx + dx, cy + dy);
            if x >= 0 && y >= 0 && x < width && y < height {
                painted[(y * width + x) as usize] = true;
            }
        }
    }
    painted
}

/// Exact repeatability: for every corner in every source image, if its warp
/// destination lands inside the target image, it's "repeatable"; it's
/// "repeated" if some detected corner in the target image is within `r` of
/// that destination (real-valued squared distance). Repeatability is
/// `repeated / repeatable`, `0` if nothing was repeatable.
///
/// Parallelized over the outer `(i, j)` frame-pair loop with rayon, since
/// each pair's corner-matching work is independent of every other.
pub fn exact_repeatability(
    warps: &[Vec<Option<WarpField>>],
    corners: &[Vec<(i32, i32)>],
    r: f64,
) -> f64 {
    let n = corners.len();
    let r2 = r * r;

    let pairs: Vec<(usize, usize)> = (0..n)
        .flat_map(|i| (0..n).map(move |j| (i, j)))
        .filter(|&(i, j)| i != j)
        .collect();

    let (repeatable, repeated): (u64, u64) = pairs
        .par_iter()
        .map(|&(i, j)| {
            let warp = match &warps[i][j] {
                Some(w) => w,
                None => return (0u64, 0u64),
            };
            let mut repeatable = 0u64;
            let mut repeated = 0u64;
            for &(cx, cy) in &corners[i] {
                let (px, py) = warp.get(cx, cy);
                if WarpField::is_sentinel((px, py)) {
                    continue;
                }
                repeatable += 1;
                let found = corners[j].iter().any(|&(dx, dy)| {
                    let ddx = px as f64 - dx as f64;
                    let ddy = py as f64 - dy as f64;
                    ddx * ddx + ddy * ddy < r2
                });
                if found {
                    repeated += 1;
                }
            }
            (repeatable, repeated)
        })
        .reduce(|| (0, 0), |a, b| (a.0 + b.0, a.1 + b.1));

    repeated as f64 / (repeatable as f64 + f64::EPSILON)
}

/// Fast cached repeatability: corners in the destination image are painted
/// into a disc-stamped bitmap once, then a warped source corner is a
/// "repeat" iff its rounded destination lands on a painted pixel. Sequential
/// (used inside the learner's hot loop, where the per-iteration corner sets
/// are already small and re-painting per call dominates any parallel gain).
pub fn fast_repeatability(
    warps: &[Vec<Option<WarpField>>],
    corners: &[Vec<(i32, i32)>],
    r: i32,
    width: i32,
    height: i32,
) -> f64 {
    let n = corners.len();
    let disc = generate_disc(r);
    let painted: Vec<Vec<bool>> = corners
        .iter()
        .map(|c| paint_disc(c, &disc, width, height))
        .collect();

    let mut tested = 0u64;
    let mut good = 0u64;
    for i in 0..n {
        for j in 0..n {
            if i == j {
                continue;
            }
            let warp = match &warps[i][j] {
                Some(w) => w,
                None => continue,
            };
            for &(cx, cy) in &corners[i] {
                let (px, py) = warp.get(cx, cy);
                if WarpField::is_sentinel((px, py)) {
                    continue;
                }
                let (dx, dy) = (px.round() as i32, py.round() as i32);
                if dx < 0 || dy < 0 || dx >= width || dy >= height {
                    continue;
                }
                tested += 1;
                if painted[j][(dy * width + dx) as usize] {
                    good += 1;
                }
            }
        }
    }

    good as f64 / (tested as f64 + f64::EPSILON)
}
