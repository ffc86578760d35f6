//! the offset table — the set of pixel offsets a tree test can examine,
//! replicated across the 8 symmetry orientations (4 rotations × {identity,
//! y-reflection}).
//!
//! Ported from `original_source/offsets.cc`'s `create_offsets`: an annulus of
//! integer offsets is enumerated once at orientation 0, then rotated and
//! reflected to produce orientations 1–7. All 8 sets share a size
//! (`num_offsets`) and a bounding box (`offsets_bbox`), which becomes the
//! detector's required image border.

use std::ops::Add;

/// An integer 2D offset from a centre pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Offset {
    pub dx: i32,
    pub dy: i32,
}

impl Offset {
    pub fn new(dx: i32, dy: i32) -> Self {
        Offset { dx, dy }
    }

    fn magnitude_sq(self) -> i64 {
        (self.dx as i64) * (self.dx as i64) + (self.dy as i64) * (self.dy as i64)
    }
}

impl Add<Offset> for Offset {
    type Output = Offset;
    fn add(self, rhs: Offset) -> Offset {
        Offset::new(self.dx + rhs.dx, self.dy + rhs.dy)
    }
}

/// An axis-aligned bounding box, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BBox {
    pub min: Offset,
    pub max: Offset,
}

/// The 8 orientation variants of one offset set, plus their shared bounding
/// box.
#[derive(Debug, Clone)]
pub struct OffsetTable {
    /// `orientations[k][i]` is offset `i` under orientation `k`.
    orientations: [Vec<Offset>; 8],
    num_offsets: usize,
    bbox: BBox,
}

impl OffsetTable {
    /// Enumerate all integer offsets in the closed annulus
    /// `min_radius^2 <= dx^2+dy^2 <= max_radius^2`, then build all 8
    /// orientation variants and the shared bounding box.
    pub fn new(min_radius: f64, max_radius: f64) -> Self {
        let base = annulus(min_radius, max_radius);

        let o0 = base;
        let o1 = transform(&o0, 1, false);
        let o2 = transform(&o0, 2, false);
        let o3 = transform(&o0, 3, false);
        let o4 = transform(&o0, 0, true);
        let o5 = transform(&o0, 1, true);
        let o6 = transform(&o0, 2, true);
        let o7 = transform(&o0, 3, true);

        let num_offsets = o0.len();
        let orientations = [o0, o1, o2, o3, o4, o5, o6, o7];
        let bbox = bounding_box(&orientations);

        OffsetTable {
            orientations,
            num_offsets,
            bbox,
        }
    }

    /// The offsets for orientation `k` (`k` in `0..8`).
    pub fn orientation(&self, k: usize) -> &[Offset] {
        &self.orientations[k]
    }

    /// `offsets[k][i]`.
    pub fn get(&self, k: usize, i: usize) -> Offset {
        self.orientations[k][i]
    }

    pub fn num_offsets(&self) -> usize {
        self.num_offsets
    }

    pub fn bbox(&self) -> BBox {
        self.bbox
    }
}

fn annulus(min_radius: f64, max_radius: f64) -> Vec<Offset> {
    let max_r = max_radius.ceil() as i32 + 1;
    let min_sq = min_radius * min_radius;
    let max_sq = max_radius * max_radius;

    let mut offsets = Vec::new();
    for y in -max_r..=max_r {
        for x in -max_r..=max_r {
            let o = Offset::new(x, y);
            let d = o.magnitude_sq() as f64;
            if d >= min_sq && d <= max_sq {
                offsets.push(o);
            }
        }
    }
    offsets
}

/// Rotate `offsets` by `angle * 90` degrees, optionally reflecting about the
/// x-axis first. Matches `transform_offsets` in `offsets.cc`: reflection is
/// applied before rotation (`R * F`), with rounding to the nearest integer
/// pixel.
fn transform(offsets: &[Offset], angle: i32, reflect: bool) -> Vec<Offset> {
    let a = angle as f64 * std::f64::consts::FRAC_PI_2;
    let (sin, cos) = a.sin_cos();
    let fy = if reflect { -1.0 } else { 1.0 };

    offsets
        .iter()
        .map(|o| {
            let x = o.dx as f64;
            let y = o.dy as f64 * fy;
            let rx = cos * x - sin * y;
            let ry = sin * x + cos * y;
            Offset::new(round_half_away_from_zero(rx), round_half_away_from_zero(ry))
        })
        .collect()
}

fn round_half_away_from_zero(v: f64) -> i32 {
    v.round() as i32
}

fn bounding_box(orientations: &[Vec<Offset>; 8]) -> BBox {
    let mut min = Offset::new(i32::MAX, i32::MAX);
    let mut max = Offset::new(i32::MIN, i32::MIN);

    for set in orientations {
        for o in set {
            min.dx = min.dx.min(o.dx);
            min.dy = min.dy.min(o.dy);
            max.dx = max.dx.max(o.dx);
            max.dy = max.dy.max(o.dy);
        }
    }

    BBox { min, max }
}
