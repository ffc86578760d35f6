//! the recursive tree evaluator.
//!
//! This is the "reference" detector implementation: slow compared to the
//! compiled bytecode, but the one the bytecode is checked against.
//! Ported from `original_source/faster_tree.h`'s `detect_corner_oriented` and
//! `detect_corner`.

use crate::offsets::OffsetTable;
use crate::tree::{Node, Tree};

/// A source of pixel intensities. `image.rs`/`dataset.rs` implement this
/// over a loaded grayscale buffer; tests use a plain closure-backed grid.
pub trait PixelSource {
    /// Pixel intensity at `(x, y)`. Callers guarantee `(x, y)` plus every
    /// offset the tree may probe stays in-bounds (the bytecode runner's
    /// detection rectangle and the evaluator's callers are both responsible
    /// for this).
    fn at(&self, x: i32, y: i32) -> i32;
}

/// A margin large enough to stand in for "infinite" without risking integer
/// overflow when combined with further arithmetic, matching the sentinel the
/// original uses for an unconditional corner leaf.
pub const INFINITE_MARGIN: i32 = i32::MAX / 2;

/// Evaluate `tree` at `pos` against every orientation × polarity combination,
/// returning the minimum excess margin of the first accepting combination in
/// iteration order (orientation ascending, identity polarity before
/// inversion), or 0 if none accepts.
pub fn evaluate(
    tree: &Tree,
    offsets: &OffsetTable,
    image: &dyn PixelSource,
    x: i32,
    y: i32,
    threshold: i32,
) -> i32 {
    for orientation in 0..8 {
        for &invert in &[false, true] {
            let margin = evaluate_one(tree, offsets, image, x, y, threshold, orientation, invert);
            if margin != 0 {
                return margin;
            }
        }
    }
    0
}

/// Like [`evaluate`], but stops at the first `Corner` leaf without computing
/// a margin — the cheap existence check the hot detection loop wants.
pub fn evaluate_is_corner(
    tree: &Tree,
    offsets: &OffsetTable,
    image: &dyn PixelSource,
    x: i32,
    y: i32,
    threshold: i32,
) -> bool {
    for orientation in 0..8 {
        for &invert in &[false, true] {
            if walk_is_corner(tree, tree.root(), offsets, image, x, y, threshold, orientation, invert) {
                return true;
            }
        }
    }
    false
}

fn evaluate_one(
    tree: &Tree,
    offsets: &OffsetTable,
    image: &dyn PixelSource,
    x: i32,
    y: i32,
    threshold: i32,
    orientation: usize,
    invert: bool,
) -> i32 {
    let c = image.at(x, y);
    walk(tree, tree.root(), offsets, image, x, y, c, threshold, orientation, invert, INFINITE_MARGIN)
}

/// Recursively descend, carrying `running_min` — the smallest margin seen
/// along the path so far. At a `Corner` leaf the accumulated running minimum
/// is returned (never 0, since a degenerate single-leaf corner tree would
/// otherwise be indistinguishable from "no match"); at a `NonCorner` leaf 0
/// is returned.
#[allow(clippy::too_many_arguments)]
fn walk(
    tree: &Tree,
    node: usize,
    offsets: &OffsetTable,
    image: &dyn PixelSource,
    x: i32,
    y: i32,
    c: i32,
    threshold: i32,
    orientation: usize,
    invert: bool,
    running_min: i32,
) -> i32 {
    match *tree.node(node) {
        Node::Leaf { is_corner } => {
            if is_corner {
                running_min.max(1)
            } else {
                0
            }
        }
        Node::Branch { offset, lt, eq, gt } => {
            let o = offsets.get(orientation, offset);
            let p = image.at(x + o.dx, y + o.dy);
            let hi = c + threshold;
            let lo = c - threshold;
            if p > hi {
                let margin = p - hi;
                let next = if invert { lt } else { gt };
                walk(tree, next, offsets, image, x, y, c, threshold, orientation, invert, running_min.min(margin))
            } else if p < lo {
                let margin = lo - p;
                let next = if invert { gt } else { lt };
                walk(tree, next, offsets, image, x, y, c, threshold, orientation, invert, running_min.min(margin))
            } else {
                walk(tree, eq, offsets, image, x, y, c, threshold, orientation, invert, running_min)
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn walk_is_corner(
    tree: &Tree,
    node: usize,
    offsets: &OffsetTable,
    image: &dyn PixelSource,
    x: i32,
    y: i32,
    threshold: i32,
    orientation: usize,
    invert: bool,
) -> bool {
    match *tree.node(node) {
        Node::Leaf { is_corner } => is_corner,
        Node::Branch { offset, lt, eq, gt } => {
            let c = image.at(x, y);
            let o = offsets.get(orientation, offset);
            let p = image.at(x + o.dx, y + o.dy);
            let next = if p > c + threshold {
                if invert { lt } else { gt }
            } else if p < c - threshold {
                if invert { gt } else { lt }
            } else {
                eq
            };
            walk_is_corner(tree, next, offsets, image, x, y, threshold, orientation, invert)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offsets::OffsetTable;
    use crate::tree::Node;
    use std::collections::HashMap;

    struct GridImage {
        values: HashMap<(i32, i32), i32>,
        default: i32,
    }

    impl PixelSource for GridImage {
        fn at(&self, x: i32, y: i32) -> i32 {
            *self.values.get(&(x, y)).unwrap_or(&self.default)
        }
    }

    #[test]
    fn single_noncorner_leaf_never_matches() {
        let tree = Tree::leaf(false);
        let offsets = OffsetTable::new(2.0, 3.0);
        let image = GridImage { values: HashMap::new(), default: 100 };
        assert_eq!(evaluate(&tree, &offsets, &image, 10, 10, 9), 0);
        assert!(!evaluate_is_corner(&tree, &offsets, &image, 10, 10, 9));
    }

    #[test]
    fn branch_accepting_on_gt_returns_positive_margin() {
        let offsets = OffsetTable::new(2.0, 3.0);
        let probe = offsets.get(0, 0);
        // lt=noncorner, eq=noncorner, gt=corner.
        let tree = Tree::from_arena(
            vec![
                Node::Branch { offset: 0, lt: 1, eq: 2, gt: 3 },
                Node::Leaf { is_corner: false },
                Node::Leaf { is_corner: false },
                Node::Leaf { is_corner: true },
            ],
            0,
        );
        let mut values = HashMap::new();
        values.insert((10, 10), 100);
        values.insert((10 + probe.dx, 10 + probe.dy), 150);
        let image = GridImage { values, default: 100 };
        let margin = evaluate(&tree, &offsets, &image, 10, 10, 9);
        assert!(margin > 0);
    }

    #[test]
    fn evaluate_is_corner_agrees_with_evaluate_sign() {
        let offsets = OffsetTable::new(2.0, 3.0);
        let image = GridImage { values: HashMap::new(), default: 100 };
        let tree = Tree::leaf(true);
        assert!(evaluate_is_corner(&tree, &offsets, &image, 5, 5, 9));
        assert!(evaluate(&tree, &offsets, &image, 5, 5, 9) > 0);
    }
}
