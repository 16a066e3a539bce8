//! Bagged regression trees.
//!
//! Each tree is grown on a bootstrap sample with the variance-reduction (MSE)
//! criterion over every feature. Tree seeds are drawn from one master seed
//! before any tree is grown, so fitting in parallel stays reproducible.

use ndarray::{ArrayView1, ArrayView2};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The trained-model capability: features in, score out.
pub trait Regressor {
    fn predict(&self, features: &[f64]) -> Result<f64>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 32,
            min_samples_split: 2,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    sse: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    fn fit(x: &ArrayView2<f64>, y: &ArrayView1<f64>, mut samples: Vec<usize>, params: &ForestParams) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.grow(x, y, &mut samples, 0, params);
        tree
    }

    fn grow(
        &mut self,
        x: &ArrayView2<f64>,
        y: &ArrayView1<f64>,
        samples: &mut [usize],
        depth: usize,
        params: &ForestParams,
    ) -> usize {
        let index = self.nodes.len();
        let n = samples.len() as f64;
        let sum: f64 = samples.iter().map(|&i| y[i]).sum();
        let mean = sum / n;
        self.nodes.push(Node::Leaf { value: mean });

        if samples.len() < params.min_samples_split || depth >= params.max_depth {
            return index;
        }
        let sse: f64 = samples.iter().map(|&i| (y[i] - mean).powi(2)).sum();
        if sse <= f64::EPSILON {
            return index;
        }
        let Some(split) = best_split(x, y, samples) else {
            return index;
        };
        if split.sse >= sse {
            return index;
        }

        // Partition in place: left side holds x <= threshold.
        let mut boundary = 0;
        for k in 0..samples.len() {
            if x[[samples[k], split.feature]] <= split.threshold {
                samples.swap(boundary, k);
                boundary += 1;
            }
        }
        let (left_samples, right_samples) = samples.split_at_mut(boundary);
        let left = self.grow(x, y, left_samples, depth + 1, params);
        let right = self.grow(x, y, right_samples, depth + 1, params);
        self.nodes[index] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        index
    }

    pub fn predict(&self, features: &[f64]) -> f64 {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if features[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }
}

fn best_split(x: &ArrayView2<f64>, y: &ArrayView1<f64>, samples: &[usize]) -> Option<SplitCandidate> {
    let n = samples.len();
    let total_sum: f64 = samples.iter().map(|&i| y[i]).sum();
    let total_sq: f64 = samples.iter().map(|&i| y[i] * y[i]).sum();
    let mut best: Option<SplitCandidate> = None;
    let mut order = samples.to_vec();

    for feature in 0..x.ncols() {
        order.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));

        let mut left_sum = 0.0;
        let mut left_sq = 0.0;
        for k in 1..n {
            let yi = y[order[k - 1]];
            left_sum += yi;
            left_sq += yi * yi;

            let lo = x[[order[k - 1], feature]];
            let hi = x[[order[k], feature]];
            if lo == hi {
                continue;
            }

            let left_n = k as f64;
            let right_n = (n - k) as f64;
            let right_sum = total_sum - left_sum;
            let right_sq = total_sq - left_sq;
            let sse = (left_sq - left_sum * left_sum / left_n) + (right_sq - right_sum * right_sum / right_n);

            if best.as_ref().map_or(true, |b| sse < b.sse) {
                best = Some(SplitCandidate {
                    feature,
                    threshold: lo + (hi - lo) / 2.0,
                    sse,
                });
            }
        }
    }
    best
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<RegressionTree>,
    n_features: usize,
}

impl RandomForest {
    pub fn fit(x: ArrayView2<f64>, y: ArrayView1<f64>, params: &ForestParams) -> Result<Self> {
        let n = x.nrows();
        if n == 0 {
            return Err(Error::InsufficientData("Cannot fit a forest on zero rows".to_string()));
        }
        if y.len() != n {
            return Err(Error::Computation(format!("{} feature rows but {} targets", n, y.len())));
        }
        if params.n_trees == 0 {
            return Err(Error::Computation("Ensemble size must be at least 1".to_string()));
        }
        if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
            return Err(Error::Computation("Non-finite value in training data".to_string()));
        }

        let mut master = StdRng::seed_from_u64(params.seed);
        let seeds: Vec<u64> = (0..params.n_trees).map(|_| master.gen()).collect();

        let trees = seeds
            .par_iter()
            .map(|&seed| {
                let mut rng = StdRng::seed_from_u64(seed);
                let bootstrap: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                RegressionTree::fit(&x, &y, bootstrap, params)
            })
            .collect();

        Ok(Self {
            trees,
            n_features: x.ncols(),
        })
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }
}

impl Regressor for RandomForest {
    fn predict(&self, features: &[f64]) -> Result<f64> {
        if features.len() != self.n_features {
            return Err(Error::Computation(format!(
                "Expected {} features, got {}",
                self.n_features,
                features.len()
            )));
        }
        if features.iter().any(|v| !v.is_finite()) {
            return Err(Error::Computation("Non-finite feature value".to_string()));
        }
        let total: f64 = self.trees.iter().map(|tree| tree.predict(features)).sum();
        Ok(total / self.trees.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array2};

    fn linear_data(n: usize) -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((n, 2), |(i, j)| if j == 0 { i as f64 } else { (i % 7) as f64 });
        let y = Array1::from_shape_fn(n, |i| 3.0 * i as f64 + 10.0);
        (x, y)
    }

    #[test]
    fn test_single_tree_fits_step_function() {
        let x = Array2::from_shape_vec((6, 1), vec![1.0, 2.0, 3.0, 10.0, 11.0, 12.0]).unwrap();
        let y = Array1::from(vec![5.0, 5.0, 5.0, 20.0, 20.0, 20.0]);
        let tree = RegressionTree::fit(&x.view(), &y.view(), (0..6).collect(), &ForestParams::default());

        assert_eq!(tree.predict(&[2.0]), 5.0);
        assert_eq!(tree.predict(&[11.5]), 20.0);
        assert_eq!(tree.predict(&[6.4]), 5.0);
    }

    #[test]
    fn test_forest_tracks_trend() {
        let (x, y) = linear_data(60);
        let params = ForestParams {
            n_trees: 25,
            ..ForestParams::default()
        };
        let forest = RandomForest::fit(x.view(), y.view(), &params).unwrap();

        assert_eq!(forest.n_trees(), 25);
        let low = forest.predict(&[5.0, 5.0]).unwrap();
        let high = forest.predict(&[55.0, 6.0]).unwrap();
        assert!(high > low + 100.0, "low {} high {}", low, high);
        assert!((low - 25.0).abs() < 15.0);
    }

    #[test]
    fn test_same_seed_same_forest() {
        let (x, y) = linear_data(40);
        let params = ForestParams {
            n_trees: 10,
            seed: 7,
            ..ForestParams::default()
        };
        let a = RandomForest::fit(x.view(), y.view(), &params).unwrap();
        let b = RandomForest::fit(x.view(), y.view(), &params).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_rejects_bad_input() {
        let (x, y) = linear_data(10);
        let params = ForestParams::default();
        assert!(RandomForest::fit(x.view(), y.slice(ndarray::s![..5]), &params).is_err());
        assert!(RandomForest::fit(x.slice(ndarray::s![..0, ..]), y.slice(ndarray::s![..0]), &params).is_err());

        let forest = RandomForest::fit(x.view(), y.view(), &ForestParams { n_trees: 3, ..params }).unwrap();
        assert!(forest.predict(&[1.0]).is_err());
        assert!(forest.predict(&[f64::NAN, 1.0]).is_err());
    }
}
