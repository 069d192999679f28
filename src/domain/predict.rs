//! Price prediction ensemble: linear regression + nearest-neighbor vote.
//!
//! Both models are trained from scratch on every call — training state
//! never outlives a prediction. Training is deterministic: zero-initialized
//! weights, fixed learning rate and iteration count, no randomness.

use serde::{Deserialize, Serialize};

use crate::domain::candle::CandleSeries;
use crate::domain::error::TradekitError;
use crate::domain::features::{
    FEATURE_COUNT, FEATURE_NAMES, FeatureRow, Normalizer, extract_features,
};
use crate::domain::signal::Signal;

/// Below this many labeled rows the module refuses to train and returns a
/// conservative sideways result instead of failing.
pub const MIN_TRAINING_ROWS: usize = 50;

pub const LEARNING_RATE: f64 = 0.01;
pub const GD_ITERATIONS: usize = 800;
pub const KNN_K: usize = 5;

/// Blend weights: regression return vs discretized KNN direction.
const REGRESSION_WEIGHT: f64 = 0.6;
const KNN_WEIGHT: f64 = 0.4;

/// Predicted returns smaller than this count as sideways.
const DIRECTION_EPSILON: f64 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Sideways,
}

impl Direction {
    pub fn to_signal(self) -> Signal {
        match self {
            Direction::Up => Signal::Buy,
            Direction::Down => Signal::Sell,
            Direction::Sideways => Signal::Hold,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Horizon {
    H1,
    H4,
    D1,
}

impl Horizon {
    /// Horizon length in bars of the input series.
    pub fn bars(&self) -> usize {
        match self {
            Horizon::H1 => 1,
            Horizon::H4 => 4,
            Horizon::D1 => 24,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub name: String,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub direction: Direction,
    pub predicted_price: f64,
    pub confidence: f64,
    pub price_change_percent: f64,
    pub horizon: Horizon,
    pub feature_importance: Vec<FeatureImportance>,
    /// Set when there were too few training rows for the ensemble.
    pub insufficient_data: bool,
}

/// Linear regression fitted by batch gradient descent on MSE.
#[derive(Debug, Clone)]
pub struct LinearRegressor {
    weights: [f64; FEATURE_COUNT],
    bias: f64,
    fitted: bool,
}

impl Default for LinearRegressor {
    fn default() -> Self {
        Self::new()
    }
}

impl LinearRegressor {
    pub fn new() -> Self {
        Self {
            weights: [0.0; FEATURE_COUNT],
            bias: 0.0,
            fitted: false,
        }
    }

    pub fn fit(
        &mut self,
        rows: &[[f64; FEATURE_COUNT]],
        labels: &[f64],
    ) -> Result<(), TradekitError> {
        if rows.len() != labels.len() || rows.is_empty() {
            return Err(TradekitError::Data {
                reason: format!(
                    "regression needs matching non-empty rows and labels, got {} and {}",
                    rows.len(),
                    labels.len()
                ),
            });
        }

        let n = rows.len() as f64;
        for _ in 0..GD_ITERATIONS {
            let mut grad_w = [0.0; FEATURE_COUNT];
            let mut grad_b = 0.0;

            for (row, &label) in rows.iter().zip(labels) {
                let error = self.raw_predict(row) - label;
                for f in 0..FEATURE_COUNT {
                    grad_w[f] += error * row[f];
                }
                grad_b += error;
            }

            for f in 0..FEATURE_COUNT {
                self.weights[f] -= LEARNING_RATE * 2.0 * grad_w[f] / n;
            }
            self.bias -= LEARNING_RATE * 2.0 * grad_b / n;
        }

        self.fitted = true;
        Ok(())
    }

    fn raw_predict(&self, features: &[f64; FEATURE_COUNT]) -> f64 {
        self.bias
            + self
                .weights
                .iter()
                .zip(features)
                .map(|(w, x)| w * x)
                .sum::<f64>()
    }

    pub fn predict(&self, features: &[f64; FEATURE_COUNT]) -> f64 {
        self.raw_predict(features)
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted
    }

    /// Features ranked by |weight|, descending.
    pub fn feature_importance(&self) -> Vec<FeatureImportance> {
        let mut ranked: Vec<FeatureImportance> = FEATURE_NAMES
            .iter()
            .zip(self.weights.iter())
            .map(|(name, w)| FeatureImportance {
                name: (*name).to_string(),
                weight: w.abs(),
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.weight
                .partial_cmp(&a.weight)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked
    }
}

/// k-nearest-neighbor direction classifier over Euclidean distance.
#[derive(Debug, Clone)]
pub struct KnnClassifier {
    k: usize,
    points: Vec<([f64; FEATURE_COUNT], f64)>,
}

impl KnnClassifier {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            points: Vec::new(),
        }
    }

    pub fn fit(&mut self, rows: &[[f64; FEATURE_COUNT]], labels: &[f64]) {
        self.points = rows.iter().copied().zip(labels.iter().copied()).collect();
    }

    /// Majority direction sign among the k nearest training rows:
    /// +1 up, -1 down, 0 tied or unfitted.
    pub fn predict_direction(&self, features: &[f64; FEATURE_COUNT]) -> i32 {
        if self.points.is_empty() {
            return 0;
        }

        let mut distances: Vec<(f64, f64)> = self
            .points
            .iter()
            .map(|(row, label)| (euclidean(row, features), *label))
            .collect();
        distances.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        let mut score = 0i32;
        for (_, label) in distances.iter().take(self.k) {
            if *label > 0.0 {
                score += 1;
            } else if *label < 0.0 {
                score -= 1;
            }
        }
        score.signum()
    }
}

fn euclidean(a: &[f64; FEATURE_COUNT], b: &[f64; FEATURE_COUNT]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// Train the ensemble on the series and predict the forward return of the
/// most recent bar.
pub fn predict_price(series: &CandleSeries, horizon: Horizon) -> PredictionResult {
    let candles = series.candles();
    let last_close = candles.last().map(|c| c.close).unwrap_or(0.0);

    let rows = extract_features(candles, horizon.bars());
    let labeled: Vec<&FeatureRow> = rows.iter().filter(|r| r.label.is_some()).collect();

    let Some(target_row) = rows.last() else {
        return insufficient(last_close, horizon);
    };
    if labeled.len() < MIN_TRAINING_ROWS {
        return insufficient(last_close, horizon);
    }

    // normalization statistics come from the training split only
    let training: Vec<FeatureRow> = labeled.iter().map(|r| (*r).clone()).collect();
    let normalizer = Normalizer::fit(&training);

    let train_x: Vec<[f64; FEATURE_COUNT]> = training
        .iter()
        .map(|r| normalizer.apply(&r.features))
        .collect();
    let train_y: Vec<f64> = training.iter().map(|r| r.label.unwrap_or(0.0)).collect();

    let mut regressor = LinearRegressor::new();
    if regressor.fit(&train_x, &train_y).is_err() {
        return insufficient(last_close, horizon);
    }
    let mut knn = KnnClassifier::new(KNN_K);
    knn.fit(&train_x, &train_y);

    let target = normalizer.apply(&target_row.features);
    let regression_return = regressor.predict(&target);
    let knn_direction = knn.predict_direction(&target);

    let mean_abs_label = train_y.iter().map(|y| y.abs()).sum::<f64>() / train_y.len() as f64;
    let knn_return = knn_direction as f64 * mean_abs_label;
    let blended = REGRESSION_WEIGHT * regression_return + KNN_WEIGHT * knn_return;

    let direction = if blended > DIRECTION_EPSILON {
        Direction::Up
    } else if blended < -DIRECTION_EPSILON {
        Direction::Down
    } else {
        Direction::Sideways
    };

    let mut confidence: f64 = 50.0;
    let models_agree = (regression_return > 0.0 && knn_direction > 0)
        || (regression_return < 0.0 && knn_direction < 0);
    if models_agree {
        confidence += 20.0;
    }
    // magnitude bonus: a 2% predicted move earns the full 20 points
    confidence += (blended.abs() / 0.02 * 20.0).min(20.0);
    let confidence = confidence.min(95.0);

    PredictionResult {
        direction,
        predicted_price: last_close * (1.0 + blended),
        confidence,
        price_change_percent: blended * 100.0,
        horizon,
        feature_importance: regressor.feature_importance(),
        insufficient_data: false,
    }
}

fn insufficient(last_close: f64, horizon: Horizon) -> PredictionResult {
    PredictionResult {
        direction: Direction::Sideways,
        predicted_price: last_close,
        confidence: 30.0,
        price_change_percent: 0.0,
        horizon,
        feature_importance: Vec::new(),
        insufficient_data: true,
    }
}
