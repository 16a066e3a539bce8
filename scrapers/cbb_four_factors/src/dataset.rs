//! Joins per-game away/home rows into wide training records.
//!
//! The feature vector built here is the only one in the crate: training and
//! matchup prediction both go through [`feature_vector`].

use tracing::{info, warn};

use crate::types::{ComparativeFeatures, FourFactorRow, GamePair, GameSummary, TrainingRecord};

pub const FEATURE_NAMES: [&str; 16] = [
    "away_possessions",
    "away_effective_fg_pct",
    "away_turnover_pct",
    "away_offensive_rebound_pct",
    "away_free_throw_rate",
    "away_offensive_rating",
    "home_possessions",
    "home_effective_fg_pct",
    "home_turnover_pct",
    "home_offensive_rebound_pct",
    "home_free_throw_rate",
    "home_offensive_rating",
    "delta_offensive_rating",
    "combined_offensive_rating",
    "delta_efg",
    "combined_efg",
];

fn team_features(row: &FourFactorRow) -> [f64; 6] {
    [
        row.possessions,
        row.effective_fg_pct,
        row.turnover_pct,
        row.offensive_rebound_pct,
        row.free_throw_rate,
        row.offensive_rating,
    ]
}

/// Model input for one matchup. Final scores are never part of it.
pub fn feature_vector(away: &FourFactorRow, home: &FourFactorRow) -> Vec<f64> {
    let comparative = ComparativeFeatures::derive(away, home);
    let mut features = Vec::with_capacity(FEATURE_NAMES.len());
    features.extend_from_slice(&team_features(away));
    features.extend_from_slice(&team_features(home));
    features.extend_from_slice(&[
        comparative.delta_offensive_rating,
        comparative.combined_offensive_rating,
        comparative.delta_efg,
        comparative.combined_efg,
    ]);
    features
}

impl TrainingRecord {
    pub fn features(&self) -> Vec<f64> {
        feature_vector(&self.away, &self.home)
    }
}

/// Box-score rows extracted for one scheduled game.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedGame {
    pub summary: GameSummary,
    pub rows: Vec<FourFactorRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Pairing {
    Paired(GamePair),
    /// Fewer or more than two rows.
    Incomplete,
    /// The schedule names teams that the box score does not contain.
    Mislabeled,
}

/// Assigns away/home by matching row team ids against the schedule's team
/// ids. Without ids to compare, document order decides (first = away).
pub fn pair_game(summary: &GameSummary, rows: &[FourFactorRow]) -> Pairing {
    let [first, second] = rows else {
        return Pairing::Incomplete;
    };

    let matches = |id: &Option<String>, row: &FourFactorRow| id.as_deref() == Some(row.team_id.as_str());
    let in_order = |away: &FourFactorRow, home: &FourFactorRow| GamePair {
        away: away.clone(),
        home: home.clone(),
        verified: true,
    };

    match (&summary.away_team_id, &summary.home_team_id) {
        (None, None) => {
            warn!(
                "No team ids for {} at {}, pairing by document order",
                summary.away_team_name, summary.home_team_name
            );
            Pairing::Paired(GamePair {
                away: first.clone(),
                home: second.clone(),
                verified: false,
            })
        }
        (away, home) => {
            let straight = (away.is_none() || matches(away, first)) && (home.is_none() || matches(home, second));
            let swapped = (away.is_none() || matches(away, second)) && (home.is_none() || matches(home, first));
            if straight {
                Pairing::Paired(in_order(first, second))
            } else if swapped {
                Pairing::Paired(in_order(second, first))
            } else {
                warn!(
                    "Box score teams {}/{} do not match schedule {:?}/{:?}",
                    first.team_id, second.team_id, away, home
                );
                Pairing::Mislabeled
            }
        }
    }
}

/// Assembled training table plus what was left out of it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Assembly {
    pub records: Vec<TrainingRecord>,
    pub dropped_incomplete: usize,
    pub dropped_mislabeled: usize,
    /// Records paired by document order only.
    pub unverified: usize,
}

impl Assembly {
    pub fn dropped(&self) -> usize {
        self.dropped_incomplete + self.dropped_mislabeled
    }

    fn push(&mut self, date: Option<chrono::NaiveDate>, away_name: String, home_name: String, pair: GamePair) {
        if !pair.verified {
            self.unverified += 1;
        }
        let comparative = ComparativeFeatures::derive(&pair.away, &pair.home);
        self.records.push(TrainingRecord {
            game_id: self.records.len() + 1,
            date,
            away_team_name: away_name,
            home_team_name: home_name,
            away: pair.away,
            home: pair.home,
            comparative,
        });
    }
}

/// One record per completed game, game ids 1..=N in input order.
pub fn assemble(games: &[ExtractedGame]) -> Assembly {
    let mut assembly = Assembly::default();

    for game in games {
        match pair_game(&game.summary, &game.rows) {
            Pairing::Paired(pair) => assembly.push(
                Some(game.summary.date),
                game.summary.away_team_name.clone(),
                game.summary.home_team_name.clone(),
                pair,
            ),
            Pairing::Incomplete => assembly.dropped_incomplete += 1,
            Pairing::Mislabeled => assembly.dropped_mislabeled += 1,
        }
    }

    info!(
        "Assembled {} records ({} incomplete, {} mislabeled, {} unverified)",
        assembly.records.len(),
        assembly.dropped_incomplete,
        assembly.dropped_mislabeled,
        assembly.unverified
    );
    assembly
}

/// Positional form for a flat extraction stream: each two consecutive rows
/// are one game, first away. A trailing odd row is counted as incomplete.
pub fn pair_rows(rows: &[FourFactorRow]) -> Assembly {
    let mut assembly = Assembly::default();

    for chunk in rows.chunks(2) {
        match chunk {
            [away, home] => assembly.push(
                None,
                away.team_id.clone(),
                home.team_id.clone(),
                GamePair {
                    away: away.clone(),
                    home: home.clone(),
                    verified: false,
                },
            ),
            _ => assembly.dropped_incomplete += 1,
        }
    }
    assembly
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn row(team: &str, ortg: f64, efg: f64, score: f64) -> FourFactorRow {
        FourFactorRow {
            team_id: team.to_string(),
            possessions: 68.0,
            effective_fg_pct: efg,
            turnover_pct: 15.0,
            offensive_rebound_pct: 0.3,
            free_throw_rate: 0.3,
            offensive_rating: ortg,
            final_score: Some(score),
        }
    }

    fn summary(away: Option<&str>, home: Option<&str>) -> GameSummary {
        GameSummary {
            date: NaiveDate::from_ymd_opt(2024, 1, 9).unwrap(),
            away_team_name: "Away".to_string(),
            home_team_name: "Home".to_string(),
            away_team_id: away.map(str::to_string),
            home_team_id: home.map(str::to_string),
            away_score: None,
            home_score: None,
            boxscore_reference: None,
        }
    }

    #[test]
    fn test_pair_game_by_label() {
        let rows = vec![row("duke", 110.0, 0.5, 80.0), row("clemson", 100.0, 0.45, 70.0)];
        let Pairing::Paired(pair) = pair_game(&summary(Some("clemson"), Some("duke")), &rows) else {
            panic!("expected a pair");
        };
        assert_eq!(pair.away.team_id, "clemson");
        assert_eq!(pair.home.team_id, "duke");
        assert!(pair.verified);
    }

    #[test]
    fn test_pair_game_with_one_known_id() {
        let rows = vec![row("clemson", 100.0, 0.45, 70.0), row("duke", 110.0, 0.5, 80.0)];
        let Pairing::Paired(pair) = pair_game(&summary(None, Some("clemson")), &rows) else {
            panic!("expected a pair");
        };
        assert_eq!(pair.home.team_id, "clemson");
        assert_eq!(pair.away.team_id, "duke");
    }

    #[test]
    fn test_pair_game_falls_back_to_document_order() {
        let rows = vec![row("a", 100.0, 0.45, 70.0), row("b", 110.0, 0.5, 80.0)];
        let Pairing::Paired(pair) = pair_game(&summary(None, None), &rows) else {
            panic!("expected a pair");
        };
        assert_eq!(pair.away.team_id, "a");
        assert!(!pair.verified);
    }

    #[test]
    fn test_pair_game_rejects_mismatch_and_incomplete() {
        let rows = vec![row("a", 100.0, 0.45, 70.0), row("b", 110.0, 0.5, 80.0)];
        assert_eq!(pair_game(&summary(Some("x"), Some("y")), &rows), Pairing::Mislabeled);
        assert_eq!(pair_game(&summary(None, None), &rows[..1]), Pairing::Incomplete);
        assert_eq!(pair_game(&summary(None, None), &[]), Pairing::Incomplete);
    }

    #[test]
    fn test_assemble_counts_dropped_games() {
        let games = vec![
            ExtractedGame {
                summary: summary(Some("a"), Some("b")),
                rows: vec![row("a", 100.0, 0.45, 70.0), row("b", 110.0, 0.5, 80.0)],
            },
            ExtractedGame {
                summary: summary(Some("c"), Some("d")),
                rows: vec![],
            },
            ExtractedGame {
                summary: summary(Some("e"), Some("f")),
                rows: vec![row("x", 100.0, 0.45, 70.0), row("y", 110.0, 0.5, 80.0)],
            },
            ExtractedGame {
                summary: summary(None, None),
                rows: vec![row("g", 95.0, 0.40, 60.0), row("h", 105.0, 0.52, 66.0)],
            },
        ];
        let assembly = assemble(&games);

        assert_eq!(assembly.records.len(), 2);
        assert_eq!(assembly.dropped_incomplete, 1);
        assert_eq!(assembly.dropped_mislabeled, 1);
        assert_eq!(assembly.dropped(), 2);
        assert_eq!(assembly.unverified, 1);
        let ids: Vec<usize> = assembly.records.iter().map(|r| r.game_id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_pair_rows_assigns_sequential_ids() {
        let rows: Vec<FourFactorRow> = (0..10)
            .map(|i| row(&format!("t{}", i), 90.0 + i as f64, 0.4 + i as f64 / 100.0, 60.0 + i as f64))
            .collect();
        let assembly = pair_rows(&rows);

        assert_eq!(assembly.records.len(), 5);
        for (i, record) in assembly.records.iter().enumerate() {
            assert_eq!(record.game_id, i + 1);
            assert_eq!(record.away.team_id, format!("t{}", 2 * i));
            assert_eq!(record.home.team_id, format!("t{}", 2 * i + 1));
        }

        let odd = pair_rows(&rows[..3]);
        assert_eq!(odd.records.len(), 1);
        assert_eq!(odd.dropped_incomplete, 1);
    }

    #[test]
    fn test_comparative_identities_hold() {
        let rows: Vec<FourFactorRow> = (0..8)
            .map(|i| row("t", 85.0 + 7.3 * i as f64, 0.38 + 0.021 * i as f64, 60.0))
            .collect();
        for record in pair_rows(&rows).records {
            let c = record.comparative;
            assert!((c.delta_offensive_rating - (c.combined_offensive_rating - 2.0 * record.away.offensive_rating)).abs() < 1e-9);
            assert!((c.delta_efg - (c.combined_efg - 2.0 * record.away.effective_fg_pct)).abs() < 1e-12);
        }
    }

    #[test]
    fn test_feature_vector_excludes_scores() {
        let away = row("a", 100.0, 0.45, 70.0);
        let home = row("b", 110.0, 0.5, 80.0);
        let features = feature_vector(&away, &home);

        assert_eq!(features.len(), FEATURE_NAMES.len());
        assert!(!features.contains(&70.0));
        assert!(!features.contains(&80.0));
        assert_eq!(features[12], 10.0);
        assert_eq!(features[13], 210.0);
        let mut with_other_scores = home.clone();
        with_other_scores.final_score = Some(3.0);
        assert_eq!(feature_vector(&away, &with_other_scores), features);
    }
}
