//! CART regression tree shared by the forest and boosting models.
//!
//! Nodes are stored in a flat vector rooted at index 0; children always sit
//! at higher indices than their parent. A sample goes left when `value <= threshold`, so NaN
//! feature values always go right.

use ndarray::{ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Growth limits for a single tree.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    /// `None` grows until leaves are pure or too small to split.
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features considered per split; `None` considers all of them.
    pub max_features: Option<usize>,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self { max_depth: None, min_samples_split: 2, min_samples_leaf: 1, max_features: None }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
    Leaf { value: f64 },
    Split { feature: usize, threshold: f64, left: usize, right: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

struct Candidate {
    feature: usize,
    threshold: f64,
    score: f64,
}

struct WorkItem {
    node: usize,
    depth: usize,
    /// One list of sample ids per feature, each sorted by that feature's value.
    sorted: Vec<Vec<usize>>,
}

impl RegressionTree {
    /// Grow a tree on the rows of `x` listed in `samples` (duplicates allowed,
    /// as produced by bootstrap sampling).
    pub fn fit(
        x: ArrayView2<f64>,
        y: &[f64],
        samples: &[usize],
        params: &TreeParams,
        rng: &mut StdRng,
    ) -> Self {
        let n_features = x.ncols();
        if n_features == 0 || samples.is_empty() {
            let value = if samples.is_empty() {
                0.0
            } else {
                samples.iter().map(|&i| y[i]).sum::<f64>() / samples.len() as f64
            };
            return Self { nodes: vec![Node::Leaf { value }] };
        }

        let sorted: Vec<Vec<usize>> = (0..n_features)
            .map(|f| {
                let mut ids = samples.to_vec();
                ids.sort_by(|&a, &b| x[[a, f]].total_cmp(&x[[b, f]]));
                ids
            })
            .collect();

        let mut nodes = vec![Node::Leaf { value: 0.0 }];
        let mut stack = vec![WorkItem { node: 0, depth: 0, sorted }];

        while let Some(item) = stack.pop() {
            let ids = &item.sorted[0];
            let n = ids.len();
            let (sum, sum_sq) = ids
                .iter()
                .fold((0.0f64, 0.0f64), |(s, ss), &i| (s + y[i], ss + y[i] * y[i]));
            let value = if n > 0 { sum / n as f64 } else { 0.0 };

            let depth_reached = params.max_depth.is_some_and(|d| item.depth >= d);
            let too_small = n < params.min_samples_split.max(2) || n < 2 * params.min_samples_leaf.max(1);
            let pure = n == 0 || sum_sq / n as f64 - value * value <= f64::EPSILON * value.abs().max(1.0);

            let split = if depth_reached || too_small || pure {
                None
            } else {
                let features = candidate_features(n_features, params.max_features, rng);
                best_split(x, y, &item.sorted, &features, sum, params.min_samples_leaf.max(1))
            };

            let Some(split) = split else {
                nodes[item.node] = Node::Leaf { value };
                continue;
            };

            let (left_sorted, right_sorted): (Vec<_>, Vec<_>) = item
                .sorted
                .into_iter()
                .map(|ids| {
                    ids.into_iter()
                        .partition::<Vec<usize>, _>(|&i| x[[i, split.feature]] <= split.threshold)
                })
                .unzip();

            let left = nodes.len();
            let right = left + 1;
            nodes.push(Node::Leaf { value });
            nodes.push(Node::Leaf { value });
            nodes[item.node] =
                Node::Split { feature: split.feature, threshold: split.threshold, left, right };

            stack.push(WorkItem { node: right, depth: item.depth + 1, sorted: right_sorted });
            stack.push(WorkItem { node: left, depth: item.depth + 1, sorted: left_sorted });
        }

        Self { nodes }
    }

    pub fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes[idx] {
                Node::Leaf { value } => return value,
                Node::Split { feature, threshold, left, right } => {
                    idx = if row[feature] <= threshold { left } else { right };
                }
            }
        }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| matches!(n, Node::Leaf { .. })).count()
    }

    /// Structural checks for a tree read back from storage.
    pub fn validate(&self, n_features: usize) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(Error::CorruptArtifact("tree has no nodes".into()));
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            if let Node::Split { feature, left, right, .. } = *node {
                if feature >= n_features {
                    return Err(Error::CorruptArtifact(format!(
                        "node {idx} splits on feature {feature}, model has {n_features}"
                    )));
                }
                for child in [left, right] {
                    if child <= idx || child >= self.nodes.len() {
                        return Err(Error::CorruptArtifact(format!(
                            "node {idx} has out-of-bounds child {child}"
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

fn candidate_features(n_features: usize, max_features: Option<usize>, rng: &mut StdRng) -> Vec<usize> {
    match max_features {
        Some(k) if k > 0 && k < n_features => rand::seq::index::sample(rng, n_features, k).into_vec(),
        _ => (0..n_features).collect(),
    }
}

/// Exhaustive threshold search maximising `S_l²/n_l + S_r²/n_r`, which is
/// equivalent to minimising the children's summed squared error.
fn best_split(
    x: ArrayView2<f64>,
    y: &[f64],
    sorted: &[Vec<usize>],
    features: &[usize],
    total: f64,
    min_leaf: usize,
) -> Option<Candidate> {
    let n = sorted[0].len();
    let parent_score = total * total / n as f64;
    let mut best: Option<Candidate> = None;

    for &f in features {
        let ids = &sorted[f];
        let mut left_sum = 0.0;
        for pos in 0..n - 1 {
            left_sum += y[ids[pos]];
            let n_left = pos + 1;
            let n_right = n - n_left;
            if n_left < min_leaf || n_right < min_leaf {
                continue;
            }
            let here = x[[ids[pos], f]];
            let next = x[[ids[pos + 1], f]];
            // Equal values cannot be separated; NaN compares false too.
            if !(here < next) {
                continue;
            }
            let right_sum = total - left_sum;
            let score = left_sum * left_sum / n_left as f64 + right_sum * right_sum / n_right as f64;
            if score <= parent_score + 1e-12 * parent_score.abs() {
                continue;
            }
            if best.as_ref().map_or(true, |b| score > b.score) {
                let mut threshold = here + (next - here) / 2.0;
                if threshold >= next || !threshold.is_finite() {
                    threshold = here;
                }
                best = Some(Candidate { feature: f, threshold, score });
            }
        }
    }
    best
}
