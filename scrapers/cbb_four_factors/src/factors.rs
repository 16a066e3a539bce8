//! Four-factor formulas shared by the box-score and season extractors.

use crate::error::{Error, Result};

/// Share of free-throw attempts that end a possession (Oliver).
pub const FTA_POSSESSION_WEIGHT: f64 = 0.475;

fn nonzero(value: f64, what: &str) -> Result<f64> {
    if value == 0.0 {
        return Err(Error::Computation(format!("{} is zero", what)));
    }
    Ok(value)
}

/// FGA - ORB + TOV + 0.475 * FTA. Must come out positive.
pub fn possessions(fga: f64, orb: f64, tov: f64, fta: f64) -> Result<f64> {
    let possessions = fga - orb + tov + FTA_POSSESSION_WEIGHT * fta;
    if possessions <= 0.0 {
        return Err(Error::Computation(format!(
            "Non-positive possessions {} (FGA {}, ORB {}, TOV {}, FTA {})",
            possessions, fga, orb, tov, fta
        )));
    }
    Ok(possessions)
}

pub fn free_throw_rate(ft: f64, fga: f64) -> Result<f64> {
    Ok(ft / nonzero(fga, "FGA")?)
}

/// Percentage units.
pub fn turnover_pct(fga: f64, fta: f64, tov: f64) -> Result<f64> {
    let denominator = nonzero(fga + FTA_POSSESSION_WEIGHT * fta + tov, "Turnover denominator")?;
    Ok(100.0 * tov / denominator)
}

/// Fraction of available offensive rebounds collected, in [0, 1].
pub fn offensive_rebound_pct(orb: f64, opponent_drb: f64) -> Result<f64> {
    Ok(orb / nonzero(orb + opponent_drb, "Rebound chances")?)
}

/// Points per 100 possessions.
pub fn offensive_rating(points: f64, possessions: f64) -> Result<f64> {
    Ok(100.0 * points / nonzero(possessions, "Possessions")?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_possessions() {
        let value = possessions(57.0, 10.0, 11.0, 12.0).unwrap();
        assert!((value - 63.7).abs() < 1e-9);
    }

    #[test]
    fn test_possessions_must_be_positive() {
        assert!(matches!(possessions(0.0, 0.0, 0.0, 0.0), Err(Error::Computation(_))));
        assert!(matches!(possessions(5.0, 10.0, 0.0, 0.0), Err(Error::Computation(_))));
    }

    #[test]
    fn test_free_throw_rate() {
        assert!((free_throw_rate(9.0, 57.0).unwrap() - 9.0 / 57.0).abs() < 1e-12);
        assert!(matches!(free_throw_rate(9.0, 0.0), Err(Error::Computation(_))));
    }

    #[test]
    fn test_turnover_pct() {
        let value = turnover_pct(57.0, 12.0, 11.0).unwrap();
        assert!((value - 100.0 * 11.0 / 73.7).abs() < 1e-9);
    }

    #[test]
    fn test_offensive_rebound_pct_in_unit_range() {
        for (orb, drb) in [(0.0, 25.0), (10.0, 25.0), (12.0, 0.0), (380.0, 790.0)] {
            let value = offensive_rebound_pct(orb, drb).unwrap();
            assert!((0.0..=1.0).contains(&value), "{} out of range", value);
        }
        assert!(offensive_rebound_pct(0.0, 0.0).is_err());
    }

    #[test]
    fn test_offensive_rating() {
        assert!((offensive_rating(70.0, 63.7).unwrap() - 109.89010989).abs() < 1e-6);
    }
}
