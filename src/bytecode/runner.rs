//! the bytecode runner — interprets a compiled [`Program`] over whole
//! images, row by row, with scoring and non-maximal suppression.
//!
//! Ported from `original_source/faster_bytecode.h`'s `detect_no_score` /
//! `detect` (the `NOJIT` fallback path; the historical x86 JIT in
//! `faster_bytecode.cc` has no counterpart here) and the
//! non-max-suppression loop inlined in `faster_tree.cc`'s
//! `tree_detect_corners`.

use crate::eval::{PixelSource, INFINITE_MARGIN};

use super::Program;

/// A grayscale image stored flat and row-major, the layout
/// [`super::compiler::compile`] bakes its offsets against.
#[derive(Debug, Clone)]
pub struct FlatImage {
    pub width: i32,
    pub height: i32,
    pub pixels: Vec<u8>,
}

impl FlatImage {
    pub fn new(width: i32, height: i32, pixels: Vec<u8>) -> Self {
        assert_eq!(pixels.len(), (width as usize) * (height as usize));
        FlatImage { width, height, pixels }
    }

    pub fn filled(width: i32, height: i32, value: u8) -> Self {
        FlatImage::new(width, height, vec![value; (width as usize) * (height as usize)])
    }

    #[inline]
    fn index(&self, x: i32, y: i32) -> usize {
        (y * self.width + x) as usize
    }

    #[inline]
    pub fn get(&self, x: i32, y: i32) -> i32 {
        self.pixels[self.index(x, y)] as i32
    }

    pub fn set(&mut self, x: i32, y: i32, v: u8) {
        let idx = self.index(x, y);
        self.pixels[idx] = v;
    }

    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.width && y < self.height
    }
}

impl PixelSource for FlatImage {
    fn at(&self, x: i32, y: i32) -> i32 {
        if self.in_bounds(x, y) {
            self.get(x, y)
        } else {
            0
        }
    }
}

/// Classify the pixel at flat index `centre`, with no score bookkeeping —
/// `detect_no_score`, the fast path the row scanner calls for every pixel.
pub fn classify(program: &Program, image: &FlatImage, centre: usize, threshold: i32) -> bool {
    let c = image.pixels[centre] as i32;
    let cb = c + threshold;
    let c_b = c - threshold;
    let mut n = 0usize;
    loop {
        let blk = program.blocks[n];
        if blk.is_terminal() {
            return blk.terminal_is_corner();
        }
        let p = image.pixels[(centre as i64 + blk.offset) as usize] as i32;
        n = if p > cb {
            blk.gt
        } else if p < c_b {
            blk.lt
        } else {
            blk.eq
        };
    }
}

/// Classify with score bookkeeping — `detect`: 0 for a non-corner, else the
/// minimum increment to `threshold` that would still classify the pixel as
/// a corner (the margin defined in eval.rs's recursive evaluator).
pub fn score_at(program: &Program, image: &FlatImage, centre: usize, threshold: i32) -> i32 {
    let c = image.pixels[centre] as i32;
    let cb = c + threshold;
    let c_b = c - threshold;
    let mut n = 0usize;
    let mut m = INFINITE_MARGIN;
    loop {
        let blk = program.blocks[n];
        if blk.is_terminal() {
            return if blk.terminal_is_corner() { m } else { 0 };
        }
        let p = image.pixels[(centre as i64 + blk.offset) as usize] as i32;
        if p > cb {
            m = m.min(p - cb);
            n = blk.gt;
        } else if p < c_b {
            m = m.min(c_b - p);
            n = blk.lt;
        } else {
            n = blk.eq;
        }
    }
}

/// Score a single position: the margin [`evaluate`](crate::eval::evaluate)
/// would report, computed directly against the compiled program instead.
pub fn score(program: &Program, image: &FlatImage, x: i32, y: i32, threshold: i32) -> i32 {
    let centre = (y * image.width + x) as usize;
    score_at(program, image, centre, threshold)
}

/// Scan `[xmin, xmax) x [ymin, ymax)`, returning every pixel classified as a
/// corner. The rectangle must be chosen by the caller (typically from the
/// offset table's bounding box) so every offset access stays in-bounds.
pub fn detect(
    program: &Program,
    image: &FlatImage,
    threshold: i32,
    xmin: i32,
    xmax: i32,
    ymin: i32,
    ymax: i32,
) -> Vec<(i32, i32)> {
    let mut out = Vec::new();
    for y in ymin..ymax {
        for x in xmin..xmax {
            let centre = (y * image.width + x) as usize;
            if classify(program, image, centre, threshold) {
                out.push((x, y));
            }
        }
    }
    out
}

/// [`detect`] followed by scoring and 8-neighbour non-maximal suppression:
/// a detected position survives iff its score is strictly greater than all
/// 8 immediate neighbours' (neighbours that weren't themselves detected
/// score 0).
pub fn detect_with_nms(
    program: &Program,
    image: &FlatImage,
    threshold: i32,
    xmin: i32,
    xmax: i32,
    ymin: i32,
    ymax: i32,
) -> Vec<(i32, i32, i32)> {
    let positions = detect(program, image, threshold, xmin, xmax, ymin, ymax);
    let mut scores = vec![0i32; (image.width as usize) * (image.height as usize)];
    for &(x, y) in &positions {
        scores[(y * image.width + x) as usize] = score(program, image, x, y, threshold);
    }

    let mut out = Vec::new();
    for &(x, y) in &positions {
        let s = scores[(y * image.width + x) as usize];
        let mut is_max = true;
        'neighbours: for dy in -1..=1 {
            for dx in -1..=1 {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let (nx, ny) = (x + dx, y + dy);
                if nx < 0 || ny < 0 || nx >= image.width || ny >= image.height {
                    continue;
                }
                if scores[(ny * image.width + nx) as usize] >= s {
                    is_max = false;
                    break 'neighbours;
                }
            }
        }
        if is_max {
            out.push((x, y, s));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::compile;
    use crate::offsets::OffsetTable;
    use crate::tree::{Node, Tree};

    /// A tree with a single branch on offset index 0: lt/eq noncorner,
    /// gt corner.
    fn one_branch_tree(_offsets: &OffsetTable) -> Tree {
        let mut tree = Tree::leaf(false);
        let lt = tree.push(Node::Leaf { is_corner: false });
        let eq = tree.push(Node::Leaf { is_corner: false });
        let gt = tree.push(Node::Leaf { is_corner: true });
        *tree.node_mut(tree.root()) = Node::Branch { offset: 0, lt, eq, gt };
        tree
    }

    #[test]
    fn detect_matches_recursive_evaluator() {
        let offsets = OffsetTable::new(2.0, 3.0);
        let tree = one_branch_tree(&offsets);
        let probe = offsets.get(0, 0);

        let width = 20;
        let height = 20;
        let mut image = FlatImage::filled(width, height, 100);
        // Make one pixel's probe brighter by enough to trigger corner on
        // orientation 0, polarity identity.
        let cx = 10;
        let cy = 10;
        image.set(cx + probe.dx, cy + probe.dy, 150);

        let threshold = 9;
        let program = compile(&tree, &offsets, width);

        for y in 3..17 {
            for x in 3..17 {
                let got = classify(&program, &image, (y * width + x) as usize, threshold);
                let want = crate::eval::evaluate_is_corner(&tree, &offsets, &image, x, y, threshold);
                assert_eq!(got, want, "mismatch at ({x},{y})");
            }
        }
    }

    #[test]
    fn score_matches_recursive_margin() {
        let offsets = OffsetTable::new(2.0, 3.0);
        let tree = one_branch_tree(&offsets);
        let probe = offsets.get(0, 0);

        let width = 20;
        let height = 20;
        let mut image = FlatImage::filled(width, height, 100);
        image.set(10 + probe.dx, 10 + probe.dy, 150);

        let threshold = 9;
        let program = compile(&tree, &offsets, width);

        for y in 3..17 {
            for x in 3..17 {
                let got = score(&program, &image, x, y, threshold);
                let want = crate::eval::evaluate(&tree, &offsets, &image, x, y, threshold);
                assert_eq!(got, want, "mismatch at ({x},{y})");
            }
        }
    }

    #[test]
    fn nms_drops_non_maximal_neighbours() {
        let offsets = OffsetTable::new(2.0, 3.0);
        let tree = one_branch_tree(&offsets);
        let probe = offsets.get(0, 0);

        let width = 20;
        let height = 20;
        let mut image = FlatImage::filled(width, height, 100);
        // Two adjacent corners of differing strength: only the stronger
        // one should survive suppression.
        image.set(10 + probe.dx, 10 + probe.dy, 200);
        image.set(11 + probe.dx, 10 + probe.dy, 150);

        let threshold = 9;
        let program = compile(&tree, &offsets, width);
        let survivors = detect_with_nms(&program, &image, threshold, 3, 17, 3, 17);
        let positions: Vec<(i32, i32)> = survivors.iter().map(|&(x, y, _)| (x, y)).collect();
        assert!(positions.contains(&(10, 10)));
        assert!(!positions.contains(&(11, 10)));
    }

    #[test]
    fn single_leaf_tree_never_detects() {
        let offsets = OffsetTable::new(2.0, 3.0);
        let tree = Tree::leaf(false);
        let program = compile(&tree, &offsets, 20);
        let image = FlatImage::filled(20, 20, 100);
        let hits = detect(&program, &image, 9, 3, 17, 3, 17);
        assert!(hits.is_empty());
    }
}
