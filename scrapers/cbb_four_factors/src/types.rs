use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One game listed on a schedule page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSummary {
    pub date: NaiveDate,
    pub away_team_name: String,
    pub home_team_name: String,
    /// School slug from the team link, e.g. `duke`.
    pub away_team_id: Option<String>,
    pub home_team_id: Option<String>,
    pub away_score: Option<i32>,
    pub home_score: Option<i32>,
    pub boxscore_reference: Option<String>,
}

/// Four-factor metrics for one team, either for a single game or a season.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FourFactorRow {
    pub team_id: String,
    pub possessions: f64,
    pub effective_fg_pct: f64,
    /// Percentage units (0-100).
    pub turnover_pct: f64,
    /// Fraction of available offensive rebounds (0-1), on both the box-score
    /// and the season path.
    pub offensive_rebound_pct: f64,
    pub free_throw_rate: f64,
    pub offensive_rating: f64,
    /// Only box-score rows carry a final score.
    pub final_score: Option<f64>,
}

/// Away and home rows of one game, assigned by label where possible.
#[derive(Debug, Clone, PartialEq)]
pub struct GamePair {
    pub away: FourFactorRow,
    pub home: FourFactorRow,
    /// False when the assignment fell back to document order.
    pub verified: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComparativeFeatures {
    pub delta_offensive_rating: f64,
    pub combined_offensive_rating: f64,
    pub delta_efg: f64,
    pub combined_efg: f64,
}

impl ComparativeFeatures {
    /// Deltas are always home minus away.
    pub fn derive(away: &FourFactorRow, home: &FourFactorRow) -> Self {
        Self {
            delta_offensive_rating: home.offensive_rating - away.offensive_rating,
            combined_offensive_rating: home.offensive_rating + away.offensive_rating,
            delta_efg: home.effective_fg_pct - away.effective_fg_pct,
            combined_efg: home.effective_fg_pct + away.effective_fg_pct,
        }
    }
}

/// One wide row of the training table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRecord {
    pub game_id: usize,
    pub date: Option<NaiveDate>,
    pub away_team_name: String,
    pub home_team_name: String,
    pub away: FourFactorRow,
    pub home: FourFactorRow,
    pub comparative: ComparativeFeatures,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub away_team: String,
    pub home_team: String,
    pub predicted_away_points: f64,
    pub predicted_home_points: f64,
}
