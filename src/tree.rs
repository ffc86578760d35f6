//! the ternary decision tree itself.
//!
//! A tree is a forest of [`Node`]s held in one arena ([`Tree::nodes`]) and
//! addressed by [`NodeId`] (an arena index) rather than by pointer. Arena
//! indexing was chosen over `Box`-recursion because the annealing learner
//! and the copy-mutation operator need to mutate and rewire nodes by index
//! in place; a pointer tree would fight that.
//!
//! Three invariants hold for every tree this module hands back to a caller:
//!
//! - **no corner-under-tie**: no `Leaf { is_corner: true }` is the direct
//!   `eq` child of a `Branch`. A branch reached only by ties can never
//!   itself conclude "corner" — ties must keep probing.
//! - **complete branches**: a `Branch` owns all three children or the tree
//!   does not contain a partially-built branch; there is no way to observe
//!   a branch with a missing child through the public API.
//! - **single ownership**: the tree is acyclic and every node has exactly
//!   one parent (enforced by construction: children are only ever
//!   reachable by the index their parent stores, and
//!   [`Tree::clone_subtree`] deep-copies rather than aliasing indices
//!   across trees).

use std::fmt;

use log::warn;

use crate::error::ParseError;

pub type NodeId = usize;

/// One node of the tree: a leaf verdict or a three-way test against one
/// offset's pixel value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Leaf { is_corner: bool },
    Branch {
        offset: usize,
        lt: NodeId,
        eq: NodeId,
        gt: NodeId,
    },
}

impl Node {
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }
}

/// An arena-indexed ternary decision tree, rooted at [`Tree::root`].
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Tree {
    /// Build a single-leaf tree.
    pub fn leaf(is_corner: bool) -> Tree {
        Tree {
            nodes: vec![Node::Leaf { is_corner }],
            root: 0,
        }
    }

    /// Build a tree from an arena assembled directly, rooted at `root`. For
    /// callers composing nodes by hand (tests, mostly) rather than growing
    /// them incrementally through [`Tree::push`].
    pub fn from_arena(nodes: Vec<Node>, root: NodeId) -> Tree {
        Tree { nodes, root }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id]
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_leaf(&self, id: NodeId) -> bool {
        self.nodes[id].is_leaf()
    }

    /// Insert `node` into the arena, returning its fresh id. Used by the
    /// learner and by [`Tree::clone_subtree`] to grow new nodes in place.
    pub fn push(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Depth-first pre-order walk starting at `from`, visiting `(id,
    /// reached_via_eq)` pairs. `reached_via_eq` is true for the root of a
    /// subtree reached by following its parent's `eq` edge — the flag
    /// [`Tree::repair_eq_corner_leaves`] and the learner's forced-grow rule both need to
    /// decide whether a given leaf is allowed to be a corner leaf.
    pub fn preorder(&self, from: NodeId) -> Vec<(NodeId, bool)> {
        let mut out = Vec::new();
        self.preorder_into(from, false, &mut out);
        out
    }

    fn preorder_into(&self, id: NodeId, via_eq: bool, out: &mut Vec<(NodeId, bool)>) {
        out.push((id, via_eq));
        if let Node::Branch { lt, eq, gt, .. } = self.nodes[id] {
            self.preorder_into(lt, false, out);
            self.preorder_into(eq, true, out);
            self.preorder_into(gt, false, out);
        }
    }

    /// The `n`th node in pre-order from the root, 0-indexed. Mirrors
    /// `tree_element::nth_element`, used by the learner to pick a uniformly
    /// random node to mutate.
    pub fn nth_element(&self, n: usize) -> (NodeId, bool) {
        self.preorder(self.root)[n]
    }

    /// Number of offset comparisons a detector evaluation may need, i.e. the
    /// count of `Branch` nodes.
    pub fn num_branches(&self) -> usize {
        self.preorder(self.root)
            .iter()
            .filter(|(id, _)| !self.nodes[*id].is_leaf())
            .count()
    }

    /// Deep-copy the subtree rooted at `id` (which may belong to `self` or
    /// another tree's arena) into `self`'s arena, returning the new root.
    /// Used for the learner's copy mutation and for assembling one tree from
    /// pieces of another without aliasing arena indices.
    pub fn clone_subtree(&mut self, source: &Tree, id: NodeId) -> NodeId {
        match source.node(id).clone() {
            Node::Leaf { is_corner } => self.push(Node::Leaf { is_corner }),
            Node::Branch { offset, lt, eq, gt } => {
                let new_lt = self.clone_subtree(source, lt);
                let new_eq = self.clone_subtree(source, eq);
                let new_gt = self.clone_subtree(source, gt);
                self.push(Node::Branch {
                    offset,
                    lt: new_lt,
                    eq: new_eq,
                    gt: new_gt,
                })
            }
        }
    }

    /// Clone the whole tree into a fresh, compacted arena (drops any nodes
    /// that became unreachable after a mutation rewired a branch's children).
    pub fn compact(&self) -> Tree {
        let mut out = Tree {
            nodes: Vec::new(),
            root: 0,
        };
        let new_root = out.clone_subtree(self, self.root);
        out.root = new_root;
        out
    }

    /// Force the `eq` child of `branch` to be a non-corner leaf if it
    /// currently is a corner leaf. Returns whether a repair was
    /// made.
    fn repair_branch_eq(&mut self, branch: NodeId) -> bool {
        if let Node::Branch { eq, .. } = self.nodes[branch] {
            if let Node::Leaf { is_corner: true } = self.nodes[eq] {
                self.nodes[eq] = Node::Leaf { is_corner: false };
                return true;
            }
        }
        false
    }

    /// Walk the whole tree and repair every corner-under-tie violation in place, logging
    /// one warning per repair. Called after deserialization and after any
    /// mutation that might have introduced a corner leaf under an `eq` edge
    /// (the learner's copy mutation, in particular).
    pub fn repair_eq_corner_leaves(&mut self) -> usize {
        let branches: Vec<NodeId> = self
            .preorder(self.root)
            .into_iter()
            .map(|(id, _)| id)
            .filter(|id| !self.nodes[*id].is_leaf())
            .collect();
        let mut repairs = 0;
        for b in branches {
            if self.repair_branch_eq(b) {
                warn!("tree: repaired corner-under-tie violation at node {} (corner leaf under eq edge)", b);
                repairs += 1;
            }
        }
        repairs
    }

    /// Serialize as one line per node, indented two spaces per depth.
    /// Branch lines are `<offset_index> <this_ptr> <lt_ptr> <eq_ptr>
    /// <gt_ptr>` followed by the lt/eq/gt child blocks in order; leaf lines
    /// are `Is corner: <bool> <this_ptr> <lt_ptr> <eq_ptr> <gt_ptr>` with
    /// null child pointers printed as `0`. The `_ptr` columns are this
    /// implementation's stable arena indices rather than raw addresses (see
    /// the design note on pointer columns) and exist for debugging only —
    /// [`Tree::deserialize`] reconstructs structure from indentation and
    /// recursion, never from those columns.
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        self.serialize_node(self.root, 0, &mut out);
        out
    }

    fn serialize_node(&self, id: NodeId, depth: usize, out: &mut String) {
        let indent = "  ".repeat(depth);
        match *self.node(id) {
            Node::Leaf { is_corner } => {
                out.push_str(&format!("{}Is corner: {} {} 0 0 0\n", indent, is_corner, id));
            }
            Node::Branch { offset, lt, eq, gt } => {
                out.push_str(&format!("{}{} {} {} {} {}\n", indent, offset, id, lt, eq, gt));
                self.serialize_node(lt, depth + 1, out);
                self.serialize_node(eq, depth + 1, out);
                self.serialize_node(gt, depth + 1, out);
            }
        }
    }

    /// Parse the format written by [`Tree::serialize`]. Child structure is
    /// reconstructed purely from indentation depth and line order (lt, eq,
    /// gt); the `_ptr` columns are read but not otherwise interpreted. After
    /// parsing, any corner-under-tie violation is repaired in place with a logged warning,
    /// mirroring `load_a_tree`'s auto-repair-on-load behavior in the
    /// original tool.
    pub fn deserialize(text: &str) -> Result<Tree, ParseError> {
        let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
        if lines.is_empty() {
            return Err(ParseError::EmptyLine);
        }
        let mut nodes = Vec::new();
        let mut cursor = 0usize;
        let root = parse_node(&lines, &mut cursor, 0, &mut nodes)?;
        if cursor != lines.len() {
            return Err(ParseError::FieldCount {
                expected: lines.len(),
                found: cursor,
                line: lines[cursor].to_string(),
            });
        }
        let mut tree = Tree { nodes, root };
        tree.repair_eq_corner_leaves();
        Ok(tree)
    }

    /// The bounding box (in node count) required to contain the recursive
    /// search — here, simply the depth of the deepest leaf, used by callers
    /// sizing iteration buffers. Distinct from the offset bounding box in
    /// `offsets.rs`.
    pub fn depth(&self) -> usize {
        self.depth_from(self.root)
    }

    fn depth_from(&self, id: NodeId) -> usize {
        match self.nodes[id] {
            Node::Leaf { .. } => 1,
            Node::Branch { lt, eq, gt, .. } => {
                1 + self
                    .depth_from(lt)
                    .max(self.depth_from(eq))
                    .max(self.depth_from(gt))
            }
        }
    }
}

/// Parse one node (and, for a branch, its lt/eq/gt subtrees) starting at
/// `lines[*cursor]`, which must be indented exactly `depth` levels (two
/// spaces each). Advances `*cursor` past everything consumed and returns the
/// arena id of the freshly pushed node.
fn parse_node(
    lines: &[&str],
    cursor: &mut usize,
    depth: usize,
    nodes: &mut Vec<Node>,
) -> Result<NodeId, ParseError> {
    if *cursor >= lines.len() {
        return Err(ParseError::FieldCount {
            expected: depth + 1,
            found: *cursor,
            line: String::from("<end of input>"),
        });
    }
    let raw = lines[*cursor];
    let indent = raw.len() - raw.trim_start_matches(' ').len();
    let expected_indent = depth * 2;
    if indent != expected_indent {
        return Err(ParseError::FieldCount {
            expected: expected_indent,
            found: indent,
            line: raw.to_string(),
        });
    }
    let line = raw.trim();
    *cursor += 1;

    if let Some(rest) = line.strip_prefix("Is corner:") {
        let fields: Vec<&str> = rest.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(ParseError::FieldCount {
                expected: 5,
                found: fields.len(),
                line: raw.to_string(),
            });
        }
        let is_corner = parse_bool(fields[0])?;
        let id = nodes.len();
        nodes.push(Node::Leaf { is_corner });
        Ok(id)
    } else {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(ParseError::FieldCount {
                expected: 5,
                found: fields.len(),
                line: raw.to_string(),
            });
        }
        let offset = parse_usize(fields[0])?;
        let id = nodes.len();
        // Reserve this node's slot before recursing so ids are assigned in
        // pre-order even though lt/eq/gt aren't known until after recursion.
        nodes.push(Node::Leaf { is_corner: false });
        let lt = parse_node(lines, cursor, depth + 1, nodes)?;
        let eq = parse_node(lines, cursor, depth + 1, nodes)?;
        let gt = parse_node(lines, cursor, depth + 1, nodes)?;
        nodes[id] = Node::Branch { offset, lt, eq, gt };
        Ok(id)
    }
}

fn parse_bool(s: &str) -> Result<bool, ParseError> {
    match s {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ParseError::BadToken {
            text: s.to_string(),
            expected: "a boolean",
        }),
    }
}

fn parse_usize(s: &str) -> Result<usize, ParseError> {
    s.parse().map_err(|_| ParseError::BadToken {
        text: s.to_string(),
        expected: "an integer",
    })
}

impl fmt::Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.serialize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn branch(offset: usize, lt: NodeId, eq: NodeId, gt: NodeId) -> Node {
        Node::Branch { offset, lt, eq, gt }
    }

    #[test]
    fn single_leaf_roundtrips() {
        let tree = Tree::leaf(true);
        let text = tree.serialize();
        let parsed = Tree::deserialize(&text).unwrap();
        assert_eq!(parsed.num_nodes(), 1);
        assert!(matches!(parsed.node(parsed.root()), Node::Leaf { is_corner: true }));
    }

    #[test]
    fn small_branch_tree_roundtrips() {
        let mut t = Tree {
            nodes: vec![
                branch(0, 1, 2, 3),
                Node::Leaf { is_corner: false },
                Node::Leaf { is_corner: false },
                Node::Leaf { is_corner: true },
            ],
            root: 0,
        };
        assert_eq!(t.repair_eq_corner_leaves(), 0);
        let text = t.serialize();
        let parsed = Tree::deserialize(&text).unwrap();
        assert_eq!(parsed.num_nodes(), 4);
        assert_eq!(parsed.num_branches(), 1);
    }

    #[test]
    fn deserialize_repairs_i1_violation() {
        // eq child is a corner leaf: illegal under the no-corner-under-tie rule.
        let text = "5 0 1 2 3\n  Is corner: false 1 0 0 0\n  Is corner: true 2 0 0 0\n  Is corner: true 3 0 0 0\n";
        let tree = Tree::deserialize(text).unwrap();
        if let Node::Branch { eq, .. } = tree.node(tree.root()) {
            assert!(matches!(tree.node(*eq), Node::Leaf { is_corner: false }));
        } else {
            panic!("expected branch root");
        }
    }

    #[test]
    fn deserialize_rejects_bad_indent() {
        let text = "5 0 1 2 3\nIs corner: false 1 0 0 0\n  Is corner: true 2 0 0 0\n  Is corner: true 3 0 0 0\n";
        let err = Tree::deserialize(text).unwrap_err();
        assert!(matches!(err, ParseError::FieldCount { .. }));
    }

    #[test]
    fn deserialize_rejects_wrong_field_count() {
        let err = Tree::deserialize("Is corner: false 0\n").unwrap_err();
        assert!(matches!(err, ParseError::FieldCount { .. }));
    }

    #[test]
    fn clone_subtree_is_a_deep_copy() {
        let mut src = Tree {
            nodes: vec![branch(0, 1, 2, 3), Node::Leaf { is_corner: false }, Node::Leaf { is_corner: false }, Node::Leaf { is_corner: true }],
            root: 0,
        };
        src.repair_eq_corner_leaves();
        let mut dst = Tree::leaf(false);
        let copied_root = dst.clone_subtree(&src, src.root());
        // Mutate source after copying; destination must be unaffected.
        src.nodes[1] = Node::Leaf { is_corner: true };
        assert_eq!(dst.num_nodes(), 5); // original leaf + 4 cloned nodes
        if let Node::Branch { lt, .. } = dst.node(copied_root) {
            assert!(matches!(dst.node(*lt), Node::Leaf { is_corner: false }));
        } else {
            panic!("expected branch");
        }
    }

    #[test]
    fn preorder_flags_eq_reached_nodes() {
        let mut t = Tree {
            nodes: vec![branch(0, 1, 2, 3), Node::Leaf { is_corner: false }, Node::Leaf { is_corner: false }, Node::Leaf { is_corner: false }],
            root: 0,
        };
        t.repair_eq_corner_leaves();
        let order = t.preorder(t.root());
        // order: root(false), lt-leaf(false), eq-leaf(true), gt-leaf(false)
        assert_eq!(order[2], (2, true));
        assert_eq!(order[1], (1, false));
        assert_eq!(order[3], (3, false));
    }

    #[test]
    fn depth_counts_deepest_path() {
        let t = Tree {
            nodes: vec![branch(0, 1, 2, 3), Node::Leaf { is_corner: false }, Node::Leaf { is_corner: false }, Node::Leaf { is_corner: false }],
            root: 0,
        };
        assert_eq!(t.depth(), 2);
    }
}
