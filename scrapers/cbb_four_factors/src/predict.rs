use tracing::info;

use crate::{
    dataset::feature_vector,
    error::{Error, Result},
    forest::{RandomForest, Regressor},
    trainer::TrainedModelPair,
    types::{FourFactorRow, PredictionResult},
};

/// Scores a matchup from two season rows, using the same features the
/// models were trained on.
pub struct MatchupPredictor<'m, R: Regressor> {
    away_model: &'m R,
    home_model: &'m R,
}

impl<'m, R: Regressor> MatchupPredictor<'m, R> {
    pub fn new(away_model: &'m R, home_model: &'m R) -> Self {
        Self { away_model, home_model }
    }

    pub fn predict(&self, away: &FourFactorRow, home: &FourFactorRow) -> Result<PredictionResult> {
        let features = feature_vector(away, home);
        let predicted_away_points = self.away_model.predict(&features)?;
        let predicted_home_points = self.home_model.predict(&features)?;

        if !predicted_away_points.is_finite() || !predicted_home_points.is_finite() {
            return Err(Error::Computation(format!(
                "Non-finite prediction for {} at {}",
                away.team_id, home.team_id
            )));
        }

        info!(
            "{} {:.1} @ {} {:.1}",
            away.team_id, predicted_away_points, home.team_id, predicted_home_points
        );
        Ok(PredictionResult {
            away_team: away.team_id.clone(),
            home_team: home.team_id.clone(),
            predicted_away_points,
            predicted_home_points,
        })
    }
}

impl<'m> From<&'m TrainedModelPair> for MatchupPredictor<'m, RandomForest> {
    fn from(models: &'m TrainedModelPair) -> Self {
        Self::new(&models.away_model, &models.home_model)
    }
}
