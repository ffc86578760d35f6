//! linearizing a [`Tree`] into a flat [`Program`] for one fixed image
//! width.
//!
//! Ported from `original_source/faster_tree.h`'s `make_fast_detector` /
//! `make_fast_detector_o`. Each of the 8 orientations × 2 polarities is
//! linearized independently with two local sentinels (`-1` "non-corner
//! end", `-2` "corner end"), then all 16 are concatenated: a combo's local
//! `-1` is rewritten to the index immediately after the combo (the start of
//! the next one, or — for the last combo — the position the shared
//! non-corner terminal will occupy). `-2` sentinels across every combo are
//! rewritten in a second pass, once a single shared corner terminal's
//! position is known.

use itertools::iproduct;

use crate::offsets::OffsetTable;
use crate::tree::{Node, NodeId, Tree};

use super::{Block, Program};

const NUM_ORIENTATIONS: usize = 8;

#[derive(Debug, Clone, Copy)]
struct RawBlock {
    offset: i64,
    lt: i64,
    gt: i64,
    eq: i64,
}

/// Compile `tree` for an image of the given `width` (needed to turn `(dx,
/// dy)` offsets into flat row-major deltas).
pub fn compile(tree: &Tree, offsets: &OffsetTable, width: i32) -> Program {
    let mut flat: Vec<RawBlock> = Vec::new();

    for (orientation, invert) in iproduct!(0..NUM_ORIENTATIONS, [false, true]) {
        let local = compile_combo(tree, tree.root(), offsets, orientation, invert, width);
        let start = flat.len() as i64;
        let end = start + local.len() as i64;
        for mut blk in local {
            rewrite_noncorner(&mut blk.lt, start, end);
            rewrite_noncorner(&mut blk.gt, start, end);
            rewrite_noncorner(&mut blk.eq, start, end);
            flat.push(blk);
        }
    }

    // Shared terminal for "no orientation/polarity accepted".
    flat.push(RawBlock { offset: 0, lt: 0, gt: 0, eq: 0 });

    // Now that every "-1" has resolved to a real index, every remaining
    // "-2" can be rewritten to the (not yet pushed) shared corner terminal.
    let corner_idx = flat.len() as i64;
    for blk in flat.iter_mut() {
        if blk.lt == -2 {
            blk.lt = corner_idx;
        }
        if blk.gt == -2 {
            blk.gt = corner_idx;
        }
        debug_assert_ne!(blk.eq, -2, "eq edge can never reach a corner leaf");
    }
    flat.push(RawBlock { offset: 0, lt: 0, gt: 1, eq: 0 });

    Program {
        blocks: flat
            .into_iter()
            .map(|b| Block {
                offset: b.offset,
                lt: b.lt as usize,
                gt: b.gt as usize,
                eq: b.eq as usize,
            })
            .collect(),
    }
}

fn rewrite_noncorner(field: &mut i64, start: i64, end: i64) {
    if *field == -1 {
        *field = end;
    } else if *field >= 0 {
        *field += start;
    }
    // -2 (corner) is left for the second pass.
}

/// Linearize `tree` for one (orientation, polarity) combination, starting a
/// fresh local block array whose entry point is index 0.
fn compile_combo(
    tree: &Tree,
    id: NodeId,
    offsets: &OffsetTable,
    orientation: usize,
    invert: bool,
    width: i32,
) -> Vec<RawBlock> {
    match *tree.node(id) {
        Node::Leaf { .. } => {
            // A lone leaf can only be NonCorner at the root, so this always
            // encodes "fall through" rather than the leaf's own class.
            vec![RawBlock { offset: 0, lt: -1, gt: -1, eq: -1 }]
        }
        Node::Branch { offset: offset_index, lt, eq, gt } => {
            let mut out = vec![RawBlock { offset: 0, lt: -1, gt: -1, eq: -1 }];
            let o = offsets.get(orientation, offset_index);
            let delta = o.dx as i64 + o.dy as i64 * width as i64;

            let eq_target = append_child(tree, eq, offsets, orientation, invert, width, &mut out);

            let (llt, lgt) = if invert { (gt, lt) } else { (lt, gt) };
            let lt_target = append_child(tree, llt, offsets, orientation, invert, width, &mut out);
            let gt_target = append_child(tree, lgt, offsets, orientation, invert, width, &mut out);

            out[0] = RawBlock {
                offset: delta,
                lt: lt_target,
                gt: gt_target,
                eq: eq_target,
            };
            out
        }
    }
}

/// Append `child`'s linearization to `out` (unless it's a leaf, in which
/// case no nodes are appended), returning the local sentinel/index to store
/// in the parent's edge field.
fn append_child(
    tree: &Tree,
    child: NodeId,
    offsets: &OffsetTable,
    orientation: usize,
    invert: bool,
    width: i32,
    out: &mut Vec<RawBlock>,
) -> i64 {
    match *tree.node(child) {
        Node::Leaf { is_corner } => {
            if is_corner {
                -2
            } else {
                -1
            }
        }
        Node::Branch { .. } => {
            let sub = compile_combo(tree, child, offsets, orientation, invert, width);
            let start = out.len() as i64;
            out.extend(sub);
            start
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offsets::OffsetTable;
    use crate::tree::Node;

    #[test]
    fn single_leaf_tree_always_classifies_noncorner() {
        let tree = Tree::leaf(false);
        let offsets = OffsetTable::new(2.0, 3.0);
        let program = compile(&tree, &offsets, 64);
        // Walk from 0 following eq (p == c always at offset 0) to completion.
        let mut n = 0usize;
        let mut steps = 0;
        while !program.blocks[n].is_terminal() {
            n = program.blocks[n].eq;
            steps += 1;
            assert!(steps < program.len() + 1, "walk should terminate");
        }
        assert!(!program.blocks[n].terminal_is_corner());
    }

    fn branch_with_corner_gt() -> Tree {
        Tree::from_arena(
            vec![
                Node::Branch { offset: 0, lt: 1, eq: 2, gt: 3 },
                Node::Leaf { is_corner: false },
                Node::Leaf { is_corner: false },
                Node::Leaf { is_corner: true },
            ],
            0,
        )
    }

    #[test]
    fn program_has_two_terminals_plus_sixteen_combos() {
        let tree = branch_with_corner_gt();
        let offsets = OffsetTable::new(2.0, 3.0);
        let program = compile(&tree, &offsets, 64);
        // 16 combos of 2 nodes each (root branch + unexpanded leaves fold into sentinels)
        // plus 2 shared terminals.
        assert_eq!(program.len(), 16 * 1 + 2);
    }

    #[test]
    fn all_corner_edges_land_on_same_terminal() {
        let tree = branch_with_corner_gt();
        let offsets = OffsetTable::new(2.0, 3.0);
        let program = compile(&tree, &offsets, 64);
        let corner_terminal = program.len() - 1;
        assert!(program.blocks[corner_terminal].terminal_is_corner());
        for blk in &program.blocks[..program.len() - 2] {
            if !blk.is_terminal() {
                // Every gt edge in this all-corner-on-gt tree should reach
                // the single shared corner terminal (modulo inversion,
                // which moves it to lt instead).
                assert!(blk.gt == corner_terminal || blk.lt == corner_terminal);
            }
        }
    }
}
