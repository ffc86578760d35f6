//! the pretty printer for ID3 trees.
//!
//! Ported from `original_source/learn_fast_tree.cc`'s `stringify` and
//! `print_tree`: subtrees are compared by structural string equality (not
//! identity) to decide which of the four grammar shapes to emit, and the
//! same string is reused as the go/no-go check for collapsing redundant
//! branches.

use std::fmt::Write as _;

use super::id3::Id3Tree;

/// A structural fingerprint of a subtree: `"(1)"`/`"(0)"` for leaves,
/// `"(" + brighter + darker + similar + ")"` for branches. Two subtrees
/// with equal `stringify` output always classify identically.
pub fn stringify(tree: &Id3Tree) -> String {
    match tree {
        Id3Tree::Leaf { is_corner, .. } => {
            if *is_corner {
                "(1)".to_string()
            } else {
                "(0)".to_string()
            }
        }
        Id3Tree::Branch { brighter, darker, similar, .. } => {
            format!("({}{}{})", stringify(brighter), stringify(darker), stringify(similar))
        }
    }
}

/// Render `tree` using the collapsing grammar: branches whose children are
/// structurally identical fold into a single label. Indentation is one
/// space per depth.
pub fn print_tree(tree: &Id3Tree) -> String {
    let mut out = String::new();
    print_node(tree, "", &mut out);
    out
}

fn print_node(node: &Id3Tree, indent: &str, out: &mut String) {
    match node {
        Id3Tree::Leaf { is_corner, .. } => {
            if *is_corner {
                let _ = writeln!(out, "{indent}corner");
            } else {
                let _ = writeln!(out, "{indent}background");
            }
        }
        Id3Tree::Branch { feature, brighter, darker, similar, .. } => {
            let b = stringify(brighter);
            let d = stringify(darker);
            let s = stringify(similar);
            let inner = format!("{indent} ");
            let f = *feature;

            if b == d && d == s {
                // All three children agree: the test is irrelevant.
                print_node(similar, indent, out);
            } else if d == s {
                let _ = writeln!(
                    out,
                    "{indent}if_brighter {f} {} {}",
                    brighter.count(),
                    darker.count() + similar.count()
                );
                print_node(brighter, &inner, out);
                let _ = writeln!(out, "{indent}else");
                print_node(similar, &inner, out);
                let _ = writeln!(out, "{indent}end");
            } else if b == s {
                let _ = writeln!(
                    out,
                    "{indent}if_darker {f} {} {}",
                    darker.count(),
                    brighter.count() + similar.count()
                );
                print_node(darker, &inner, out);
                let _ = writeln!(out, "{indent}else");
                print_node(similar, &inner, out);
                let _ = writeln!(out, "{indent}end");
            } else if b == d {
                let _ = writeln!(
                    out,
                    "{indent}if_either {f} {} {}",
                    brighter.count() + darker.count(),
                    similar.count()
                );
                print_node(brighter, &inner, out);
                let _ = writeln!(out, "{indent}else");
                print_node(similar, &inner, out);
                let _ = writeln!(out, "{indent}end");
            } else {
                let _ = writeln!(
                    out,
                    "{indent}if_brighter {f} {} {} {}",
                    brighter.count(),
                    darker.count(),
                    similar.count()
                );
                print_node(brighter, &inner, out);
                let _ = writeln!(out, "{indent}elsf_darker {f}");
                print_node(darker, &inner, out);
                let _ = writeln!(out, "{indent}else");
                print_node(similar, &inner, out);
                let _ = writeln!(out, "{indent}end");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(is_corner: bool, count: u64) -> Id3Tree {
        Id3Tree::Leaf { is_corner, count }
    }

    #[test]
    fn all_identical_children_collapse_to_passthrough() {
        let tree = Id3Tree::Branch {
            feature: 0,
            count: 30,
            brighter: Box::new(leaf(false, 10)),
            darker: Box::new(leaf(false, 10)),
            similar: Box::new(leaf(false, 10)),
        };
        let printed = print_tree(&tree);
        assert_eq!(printed, "background\n");
    }

    #[test]
    fn darker_and_similar_equal_collapses_to_if_brighter() {
        let tree = Id3Tree::Branch {
            feature: 0,
            count: 20,
            brighter: Box::new(leaf(true, 10)),
            darker: Box::new(leaf(false, 10)),
            similar: Box::new(leaf(false, 10)),
        };
        let printed = print_tree(&tree);
        assert_eq!(printed, "if_brighter 0 10 10\n corner\nelse\n background\nend\n");
    }

    #[test]
    fn brighter_and_similar_equal_collapses_to_if_darker() {
        let tree = Id3Tree::Branch {
            feature: 2,
            count: 20,
            brighter: Box::new(leaf(false, 5)),
            darker: Box::new(leaf(true, 15)),
            similar: Box::new(leaf(false, 5)),
        };
        let printed = print_tree(&tree);
        assert_eq!(printed, "if_darker 2 15 10\n corner\nelse\n background\nend\n");
    }

    #[test]
    fn brighter_and_darker_equal_collapses_to_if_either() {
        let tree = Id3Tree::Branch {
            feature: 1,
            count: 20,
            brighter: Box::new(leaf(false, 7)),
            darker: Box::new(leaf(false, 7)),
            similar: Box::new(leaf(true, 6)),
        };
        let printed = print_tree(&tree);
        assert_eq!(printed, "if_either 1 14 6\n background\nelse\n corner\nend\n");
    }

    #[test]
    fn all_distinct_children_emit_the_full_three_way_form() {
        let tree = Id3Tree::Branch {
            feature: 3,
            count: 30,
            brighter: Box::new(leaf(true, 10)),
            darker: Box::new(leaf(false, 10)),
            similar: Box::new(Id3Tree::Branch {
                feature: 0,
                count: 10,
                brighter: Box::new(leaf(true, 5)),
                darker: Box::new(leaf(false, 5)),
                similar: Box::new(leaf(false, 0)),
            }),
        };
        let printed = print_tree(&tree);
        assert!(printed.starts_with("if_brighter 3 10 10 10\n"));
        assert!(printed.contains("elsf_darker 3\n"));
        assert!(printed.contains("if_brighter 0 5 5\n"));
    }
}
