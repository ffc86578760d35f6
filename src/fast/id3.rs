//! the ID3 ternary decision tree builder.
//!
//! Ported from `original_source/learn_fast_tree.cc`'s `entropy`,
//! `find_best_split`, and `build_tree`.

use crate::error::Id3Error;
use crate::trit::Trit;

/// A training example: a fixed-length ternary descriptor with an
/// occurrence count and class label. Mirrors `datapoint<S>`.
#[derive(Debug, Clone)]
pub struct Datapoint {
    pub descriptor: Vec<Trit>,
    pub count: u64,
    pub is_corner: bool,
}

impl Datapoint {
    pub fn new(descriptor: Vec<Trit>, count: u64, is_corner: bool) -> Datapoint {
        Datapoint { descriptor, count, is_corner }
    }
}

/// A learned ID3 tree. Leaves carry the datapoint count that reached them;
/// branches additionally carry the feature index tested.
#[derive(Debug, Clone)]
pub enum Id3Tree {
    Leaf { is_corner: bool, count: u64 },
    Branch {
        feature: usize,
        count: u64,
        brighter: Box<Id3Tree>,
        darker: Box<Id3Tree>,
        similar: Box<Id3Tree>,
    },
}

impl Id3Tree {
    pub fn count(&self) -> u64 {
        match self {
            Id3Tree::Leaf { count, .. } => *count,
            Id3Tree::Branch { count, .. } => *count,
        }
    }
}

/// Shannon entropy of a binary-labelled set of `n` elements, `c1` of which
/// are in the positive class, rescaled from nats to bits. `0` when the set
/// is empty or pure, matching `entropy()`.
pub fn entropy(n: u64, c1: u64) -> f64 {
    debug_assert!(c1 <= n);
    if n == 0 || c1 == 0 || c1 == n {
        return 0.0;
    }
    let p1 = c1 as f64 / n as f64;
    let p2 = 1.0 - p1;
    -(n as f64) * (p1 * p1.ln() + p2 * p2.ln()) / 2f64.ln()
}

/// Find the feature index whose ternary split gives the greatest weighted
/// entropy reduction, breaking ties toward the lowest index (only a
/// strictly greater gain replaces the incumbent). Fails if no feature gives
/// positive gain, matching `find_best_split`.
pub fn find_best_split(datapoints: &[Datapoint], weights: &[f64]) -> Result<usize, Id3Error> {
    let nfeats = weights.len();
    if let Some(first) = datapoints.first() {
        if first.descriptor.len() != nfeats {
            return Err(Id3Error::WeightCountMismatch { weights: nfeats, features: first.descriptor.len() });
        }
    }

    let mut num_total = 0u64;
    let mut num_corners = 0u64;
    for d in datapoints {
        num_total += d.count;
        if d.is_corner {
            num_corners += d.count;
        }
    }
    let total_entropy = entropy(num_total, num_corners);

    let mut biggest_delta = 0.0;
    let mut feature_num: Option<usize> = None;

    for i in 0..nfeats {
        let (mut num_bri, mut num_dar, mut num_sim) = (0u64, 0u64, 0u64);
        let (mut cor_bri, mut cor_dar, mut cor_sim) = (0u64, 0u64, 0u64);

        for d in datapoints {
            match d.descriptor[i] {
                Trit::Brighter => {
                    num_bri += d.count;
                    if d.is_corner {
                        cor_bri += d.count;
                    }
                }
                Trit::Darker => {
                    num_dar += d.count;
                    if d.is_corner {
                        cor_dar += d.count;
                    }
                }
                Trit::Similar => {
                    num_sim += d.count;
                    if d.is_corner {
                        cor_sim += d.count;
                    }
                }
            }
        }

        let mut delta_e = total_entropy - (entropy(num_bri, cor_bri) + entropy(num_dar, cor_dar) + entropy(num_sim, cor_sim));
        delta_e *= weights[i];

        if delta_e > biggest_delta {
            biggest_delta = delta_e;
            feature_num = Some(i);
        }
    }

    feature_num.ok_or(Id3Error::Unsplittable { num_datapoints: num_total })
}

/// Build an ID3 tree by recursively splitting on [`find_best_split`] until
/// every partition is pure. Mirrors `build_tree`.
pub fn build_tree(datapoints: Vec<Datapoint>, weights: &[f64]) -> Result<Id3Tree, Id3Error> {
    let f = find_best_split(&datapoints, weights)?;

    let mut brighter = Vec::new();
    let mut darker = Vec::new();
    let mut similar = Vec::new();
    let (mut num_bri, mut cor_bri) = (0u64, 0u64);
    let (mut num_dar, mut cor_dar) = (0u64, 0u64);
    let (mut num_sim, mut cor_sim) = (0u64, 0u64);

    for d in datapoints {
        match d.descriptor[f] {
            Trit::Brighter => {
                num_bri += d.count;
                if d.is_corner {
                    cor_bri += d.count;
                }
                brighter.push(d);
            }
            Trit::Darker => {
                num_dar += d.count;
                if d.is_corner {
                    cor_dar += d.count;
                }
                darker.push(d);
            }
            Trit::Similar => {
                num_sim += d.count;
                if d.is_corner {
                    cor_sim += d.count;
                }
                similar.push(d);
            }
        }
    }

    let num_tests = num_bri + num_dar + num_sim;

    let b_tree = if cor_bri == 0 {
        Id3Tree::Leaf { is_corner: false, count: num_bri }
    } else if cor_bri == num_bri {
        Id3Tree::Leaf { is_corner: true, count: num_bri }
    } else {
        build_tree(brighter, weights)?
    };

    let d_tree = if cor_dar == 0 {
        Id3Tree::Leaf { is_corner: false, count: num_dar }
    } else if cor_dar == num_dar {
        Id3Tree::Leaf { is_corner: true, count: num_dar }
    } else {
        build_tree(darker, weights)?
    };

    let s_tree = if cor_sim == 0 {
        Id3Tree::Leaf { is_corner: false, count: num_sim }
    } else if cor_sim == num_sim {
        Id3Tree::Leaf { is_corner: true, count: num_sim }
    } else {
        build_tree(similar, weights)?
    };

    Ok(Id3Tree::Branch {
        feature: f,
        count: num_tests,
        brighter: Box::new(b_tree),
        darker: Box::new(d_tree),
        similar: Box::new(s_tree),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dp(s: &str, count: u64, is_corner: bool) -> Datapoint {
        Datapoint::new(crate::trit::parse_descriptor(s).unwrap(), count, is_corner)
    }

    #[test]
    fn entropy_of_pure_set_is_zero() {
        assert_eq!(entropy(10, 0), 0.0);
        assert_eq!(entropy(10, 10), 0.0);
        assert_eq!(entropy(0, 0), 0.0);
    }

    #[test]
    fn entropy_of_even_split_is_one_bit() {
        let h = entropy(10, 5);
        assert!((h - 10.0).abs() < 1e-9);
    }

    #[test]
    fn find_best_split_picks_the_deterministic_feature() {
        let datapoints = vec![
            dp("bb", 10, true),
            dp("bd", 10, true),
            dp("db", 10, false),
            dp("dd", 10, false),
        ];
        // Feature 0 alone perfectly predicts the class; feature 1 doesn't.
        let f = find_best_split(&datapoints, &[1.0, 1.0]).unwrap();
        assert_eq!(f, 0);
    }

    #[test]
    fn find_best_split_is_invariant_to_datapoint_order() {
        use itertools::Itertools;

        let datapoints = vec![
            dp("bb", 10, true),
            dp("bd", 10, true),
            dp("db", 10, false),
            dp("dd", 10, false),
        ];
        let baseline = find_best_split(&datapoints, &[1.0, 1.0]).unwrap();
        for pair in (0..datapoints.len()).combinations(2) {
            let (i, j) = (pair[0], pair[1]);
            let mut swapped = datapoints.clone();
            swapped.swap(i, j);
            assert_eq!(find_best_split(&swapped, &[1.0, 1.0]).unwrap(), baseline);
        }
    }

    #[test]
    fn find_best_split_fails_when_unsplittable() {
        let datapoints = vec![dp("b", 10, true), dp("b", 10, false)];
        assert!(matches!(
            find_best_split(&datapoints, &[1.0]),
            Err(Id3Error::Unsplittable { .. })
        ));
    }

    #[test]
    fn build_tree_classifies_training_data_exactly() {
        let datapoints = vec![
            dp("bb", 10, true),
            dp("bd", 10, true),
            dp("db", 10, false),
            dp("dd", 10, false),
        ];
        let tree = build_tree(datapoints, &[1.0, 1.0]).unwrap();
        match tree {
            Id3Tree::Branch { feature, count, .. } => {
                assert_eq!(feature, 0);
                assert_eq!(count, 40);
            }
            _ => panic!("expected a branch"),
        }
    }
}
