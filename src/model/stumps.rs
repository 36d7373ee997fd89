//! Gradient-boosted decision stumps for binary classification.
//!
//! Each round fits one single-split tree to the logistic-loss residuals using a
//! binned split search, so training cost is linear in rows per feature.

use serde::{Deserialize, Serialize};

use super::{Classifier, ModelError, check_training_set, sigmoid};

/// Training hyperparameters for stump boosting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StumpParams {
    /// Number of boosting rounds.
    pub rounds: usize,
    /// Shrinkage applied to each stump.
    pub learning_rate: f64,
    /// Number of bins used for split search.
    pub bins: usize,
}

impl Default for StumpParams {
    fn default() -> Self {
        Self {
            rounds: 100,
            learning_rate: 0.1,
            bins: 32,
        }
    }
}

/// Single-split tree used as a weak learner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stump {
    pub feature_index: usize,
    pub threshold: f64,
    /// Output for `feature <= threshold`.
    pub left_value: f64,
    /// Output for `feature > threshold` (and for NaN).
    pub right_value: f64,
}

impl Stump {
    pub fn predict(&self, row: &[f64]) -> f64 {
        let value = row.get(self.feature_index).copied().unwrap_or(0.0);
        if value <= self.threshold {
            self.left_value
        } else {
            self.right_value
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoostedStumps {
    pub params: StumpParams,
    pub n_features: usize,
    /// Log-odds of the class-1 prior.
    pub init_raw: f64,
    pub stumps: Vec<Stump>,
}

impl BoostedStumps {
    pub fn new(params: StumpParams) -> Self {
        Self {
            params,
            n_features: 0,
            init_raw: 0.0,
            stumps: Vec::new(),
        }
    }

    /// Raw log-odds for a row.
    pub fn predict_raw(&self, row: &[f64]) -> f64 {
        self.stumps.iter().fold(self.init_raw, |raw, stump| {
            raw + self.params.learning_rate * stump.predict(row)
        })
    }
}

impl Classifier for BoostedStumps {
    fn fit(&mut self, rows: &[Vec<f64>], labels: &[u8]) -> Result<(), ModelError> {
        let n_features = check_training_set(rows, labels)?;
        let bins = self.params.bins.clamp(2, 256);
        let (mins, maxs) = feature_min_max(rows, n_features);
        let binned = bin_features(rows, &mins, &maxs, bins);

        let positives = labels.iter().filter(|&&label| label == 1).count();
        let prior = (positives as f64 / labels.len() as f64).clamp(1e-6, 1.0 - 1e-6);
        let init_raw = (prior / (1.0 - prior)).ln();
        let mut raw = vec![init_raw; rows.len()];

        let mut stumps = Vec::with_capacity(self.params.rounds);
        for _round in 0..self.params.rounds {
            let residuals: Vec<f64> = labels
                .iter()
                .zip(raw.iter())
                .map(|(&label, &r)| f64::from(label) - sigmoid(r))
                .collect();
            let stump = fit_best_stump(&binned, rows, &mins, &maxs, bins, &residuals);
            for (value, row) in raw.iter_mut().zip(rows) {
                *value += self.params.learning_rate * stump.predict(row);
            }
            stumps.push(stump);
        }

        self.n_features = n_features;
        self.init_raw = init_raw;
        self.stumps = stumps;
        tracing::debug!(
            "Boosted {} stumps over {} rows x {} features",
            self.stumps.len(),
            rows.len(),
            n_features
        );
        Ok(())
    }

    fn predict_probability(&self, row: &[f64]) -> f64 {
        sigmoid(self.predict_raw(row))
    }

    fn feature_count(&self) -> Option<usize> {
        (self.n_features > 0).then_some(self.n_features)
    }
}

fn feature_min_max(rows: &[Vec<f64>], n_features: usize) -> (Vec<f64>, Vec<f64>) {
    let mut mins = vec![f64::INFINITY; n_features];
    let mut maxs = vec![f64::NEG_INFINITY; n_features];
    for row in rows {
        for (j, &v) in row.iter().take(n_features).enumerate() {
            if v.is_finite() {
                mins[j] = mins[j].min(v);
                maxs[j] = maxs[j].max(v);
            }
        }
    }
    for j in 0..n_features {
        if !mins[j].is_finite() || !maxs[j].is_finite() {
            mins[j] = 0.0;
            maxs[j] = 0.0;
        }
        if mins[j] == maxs[j] {
            maxs[j] = mins[j] + 1.0;
        }
    }
    (mins, maxs)
}

fn bin_features(rows: &[Vec<f64>], mins: &[f64], maxs: &[f64], bins: usize) -> Vec<Vec<u8>> {
    let top = (bins - 1) as f64;
    rows.iter()
        .map(|row| {
            mins.iter()
                .zip(maxs)
                .enumerate()
                .map(|(j, (&min, &max))| {
                    let v = row.get(j).copied().unwrap_or(0.0);
                    let t = ((v - min) / (max - min)).clamp(0.0, 1.0);
                    if t.is_nan() { 0 } else { (t * top).round() as u8 }
                })
                .collect()
        })
        .collect()
}

#[derive(Debug, Clone)]
struct BestSplit {
    score: f64,
    feature_index: usize,
    split_bin: usize,
}

impl Default for BestSplit {
    fn default() -> Self {
        Self {
            score: f64::INFINITY,
            feature_index: 0,
            split_bin: 0,
        }
    }
}

fn fit_best_stump(
    binned: &[Vec<u8>],
    rows: &[Vec<f64>],
    mins: &[f64],
    maxs: &[f64],
    bins: usize,
    residuals: &[f64],
) -> Stump {
    let mut best = BestSplit::default();
    for feature_index in 0..mins.len() {
        let split = best_split_for_feature(binned, residuals, feature_index, bins);
        if split.score < best.score {
            best = split;
        }
    }
    let feature_index = best.feature_index;
    let t = (best.split_bin as f64 + 0.5) / (bins - 1) as f64;
    let threshold = mins[feature_index] + t * (maxs[feature_index] - mins[feature_index]);
    let (left_value, right_value) = leaf_means(rows, residuals, feature_index, threshold);
    Stump {
        feature_index,
        threshold,
        left_value,
        right_value,
    }
}

fn best_split_for_feature(
    binned: &[Vec<u8>],
    residuals: &[f64],
    feature_index: usize,
    bins: usize,
) -> BestSplit {
    let mut counts = vec![0u32; bins];
    let mut sums = vec![0f64; bins];
    let mut sums_sq = vec![0f64; bins];
    for (row, &r) in binned.iter().zip(residuals) {
        let b = row[feature_index] as usize;
        counts[b] += 1;
        sums[b] += r;
        sums_sq[b] += r * r;
    }
    let total_count: u32 = counts.iter().sum();
    let total_sum: f64 = sums.iter().sum();
    let total_sum_sq: f64 = sums_sq.iter().sum();

    let mut best = BestSplit {
        feature_index,
        ..BestSplit::default()
    };
    let (mut left_count, mut left_sum, mut left_sum_sq) = (0u32, 0f64, 0f64);
    for split_bin in 0..(bins - 1) {
        left_count += counts[split_bin];
        left_sum += sums[split_bin];
        left_sum_sq += sums_sq[split_bin];
        let right_count = total_count - left_count;
        if left_count == 0 || right_count == 0 {
            continue;
        }
        let right_sum = total_sum - left_sum;
        let right_sum_sq = total_sum_sq - left_sum_sq;
        let left_sse = left_sum_sq - left_sum * left_sum / f64::from(left_count);
        let right_sse = right_sum_sq - right_sum * right_sum / f64::from(right_count);
        let score = left_sse + right_sse;
        if score < best.score {
            best.score = score;
            best.split_bin = split_bin;
        }
    }
    best
}

fn leaf_means(
    rows: &[Vec<f64>],
    residuals: &[f64],
    feature_index: usize,
    threshold: f64,
) -> (f64, f64) {
    let (mut left_sum, mut left_count) = (0.0, 0u32);
    let (mut right_sum, mut right_count) = (0.0, 0u32);
    for (row, &r) in rows.iter().zip(residuals) {
        if row[feature_index] <= threshold {
            left_sum += r;
            left_count += 1;
        } else {
            right_sum += r;
            right_count += 1;
        }
    }
    let mean = |sum: f64, count: u32| if count == 0 { 0.0 } else { sum / f64::from(count) };
    (mean(left_sum, left_count), mean(right_sum, right_count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_support::blobs;

    #[test]
    fn stump_predict_branches() {
        let stump = Stump {
            feature_index: 0,
            threshold: 0.5,
            left_value: -1.0,
            right_value: 2.0,
        };
        assert_eq!(stump.predict(&[0.0]), -1.0);
        assert_eq!(stump.predict(&[0.5]), -1.0);
        assert_eq!(stump.predict(&[0.6]), 2.0);
        assert_eq!(stump.predict(&[f64::NAN]), 2.0);
    }

    #[test]
    fn separates_blobs() {
        let (rows, labels) = blobs(50, 11);
        let mut model = BoostedStumps::new(StumpParams::default());
        model.fit(&rows, &labels).unwrap();
        let correct = rows
            .iter()
            .zip(&labels)
            .filter(|(row, label)| model.predict(row) == **label)
            .count();
        assert!(correct >= 95, "only {correct} of 100 correct");
        assert!(model.predict_probability(&[3.0, 30.0]) > 0.5);
        assert!(model.predict_probability(&[-3.0, -30.0]) < 0.5);
    }

    #[test]
    fn single_class_training_predicts_that_class() {
        let rows = vec![vec![1.0], vec![2.0], vec![3.0]];
        let mut model = BoostedStumps::new(StumpParams {
            rounds: 10,
            ..StumpParams::default()
        });
        model.fit(&rows, &[1, 1, 1]).unwrap();
        assert_eq!(model.predict(&[2.0]), 1);
    }

    #[test]
    fn zero_rounds_predicts_prior() {
        let rows = vec![vec![0.0], vec![1.0], vec![2.0], vec![3.0]];
        let mut model = BoostedStumps::new(StumpParams {
            rounds: 0,
            ..StumpParams::default()
        });
        model.fit(&rows, &[0, 0, 0, 1]).unwrap();
        assert!((model.predict_probability(&[0.0]) - 0.25).abs() < 1e-9);
    }
}
