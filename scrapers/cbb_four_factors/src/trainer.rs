use ndarray::{Array1, Array2};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};
use tracing::info;

use crate::{
    config::TrainingConfig,
    dataset::FEATURE_NAMES,
    error::{Error, Result},
    forest::{ForestParams, RandomForest, Regressor},
    types::TrainingRecord,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    /// Share of records held out for evaluation.
    pub test_fraction: f64,
    pub seed: u64,
    pub ensemble_size: usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self::from(&TrainingConfig::default())
    }
}

impl From<&TrainingConfig> for TrainConfig {
    fn from(config: &TrainingConfig) -> Self {
        Self {
            test_fraction: config.test_fraction,
            seed: config.seed,
            ensemble_size: config.ensemble_size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestPrediction {
    pub game_id: usize,
    pub away_team_name: String,
    pub home_team_name: String,
    pub actual_away: f64,
    pub predicted_away: f64,
    pub actual_home: f64,
    pub predicted_home: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModelPair {
    pub home_model: RandomForest,
    pub away_model: RandomForest,
    pub home_rmse: f64,
    pub away_rmse: f64,
    pub feature_names: Vec<String>,
    pub test_predictions: Vec<TestPrediction>,
}

impl TrainedModelPair {
    /// Returns `(away, home)` predicted points.
    pub fn predict(&self, features: &[f64]) -> Result<(f64, f64)> {
        Ok((self.away_model.predict(features)?, self.home_model.predict(features)?))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string(self)?)?;
        info!("Saved models to {:?}", path);
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        let models: Self = serde_json::from_str(&json)?;
        let width = FEATURE_NAMES.len();
        if models.feature_names != FEATURE_NAMES
            || models.home_model.n_features() != width
            || models.away_model.n_features() != width
        {
            return Err(Error::Parse(format!(
                "Model at {:?} was trained on a different feature set",
                path
            )));
        }
        Ok(models)
    }
}

/// Shuffled `(train, test)` index sets; both are non-empty.
pub fn split_indices(n: usize, test_fraction: f64, seed: u64) -> Result<(Vec<usize>, Vec<usize>)> {
    if n < 2 {
        return Err(Error::InsufficientData(format!(
            "Need at least 2 records to split into train and test, got {}",
            n
        )));
    }
    if !(0.0..1.0).contains(&test_fraction) {
        return Err(Error::Computation(format!("Invalid test fraction {}", test_fraction)));
    }

    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut StdRng::seed_from_u64(seed));

    let train_len = ((n as f64) * (1.0 - test_fraction)).round() as usize;
    let train_len = train_len.clamp(1, n - 1);
    let test = indices.split_off(train_len);
    Ok((indices, test))
}

pub fn rmse(actual: &[f64], predicted: &[f64]) -> f64 {
    let n = actual.len().min(predicted.len());
    if n == 0 {
        return f64::NAN;
    }
    let sum: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum();
    (sum / n as f64).sqrt()
}

fn target(record: &TrainingRecord, home: bool) -> Result<f64> {
    let (row, side) = if home { (&record.home, "home") } else { (&record.away, "away") };
    row.final_score.ok_or_else(|| {
        Error::Computation(format!("Game {} has no {} final score", record.game_id, side))
    })
}

fn feature_matrix(records: &[TrainingRecord], indices: &[usize]) -> Result<Array2<f64>> {
    let flat: Vec<f64> = indices.iter().flat_map(|&i| records[i].features()).collect();
    Array2::from_shape_vec((indices.len(), FEATURE_NAMES.len()), flat)
        .map_err(|e| Error::Computation(format!("Feature table shape: {}", e)))
}

fn targets(records: &[TrainingRecord], indices: &[usize], home: bool) -> Result<Array1<f64>> {
    indices
        .iter()
        .map(|&i| target(&records[i], home))
        .collect::<Result<Vec<f64>>>()
        .map(Array1::from)
}

/// Fits independent home-score and away-score forests on the same features
/// and scores both on the held-out partition.
pub fn train_models(records: &[TrainingRecord], config: &TrainConfig) -> Result<TrainedModelPair> {
    let (train, test) = split_indices(records.len(), config.test_fraction, config.seed)?;
    info!(
        "Training on {} games, testing on {} ({} trees, seed {})",
        train.len(),
        test.len(),
        config.ensemble_size,
        config.seed
    );

    let params = ForestParams {
        n_trees: config.ensemble_size,
        seed: config.seed,
        ..ForestParams::default()
    };
    let x_train = feature_matrix(records, &train)?;
    let home_model = RandomForest::fit(x_train.view(), targets(records, &train, true)?.view(), &params)?;
    let away_model = RandomForest::fit(x_train.view(), targets(records, &train, false)?.view(), &params)?;

    let mut test_predictions = Vec::with_capacity(test.len());
    for &i in &test {
        let record = &records[i];
        let features = record.features();
        test_predictions.push(TestPrediction {
            game_id: record.game_id,
            away_team_name: record.away_team_name.clone(),
            home_team_name: record.home_team_name.clone(),
            actual_away: target(record, false)?,
            predicted_away: away_model.predict(&features)?,
            actual_home: target(record, true)?,
            predicted_home: home_model.predict(&features)?,
        });
    }

    let (actual_home, predicted_home): (Vec<f64>, Vec<f64>) =
        test_predictions.iter().map(|p| (p.actual_home, p.predicted_home)).unzip();
    let (actual_away, predicted_away): (Vec<f64>, Vec<f64>) =
        test_predictions.iter().map(|p| (p.actual_away, p.predicted_away)).unzip();
    let home_rmse = rmse(&actual_home, &predicted_home);
    let away_rmse = rmse(&actual_away, &predicted_away);

    info!("Home model RMSE: {:.3}", home_rmse);
    info!("Away model RMSE: {:.3}", away_rmse);

    Ok(TrainedModelPair {
        home_model,
        away_model,
        home_rmse,
        away_rmse,
        feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
        test_predictions,
    })
}
