use scraper::{ElementRef, Html};
use tracing::debug;

use crate::{
    error::{Error, Result},
    factors,
    layout::BoxScoreLayout,
    types::FourFactorRow,
    utils::{find_labeled_row, parse_stat, selector, td_texts},
};

pub(crate) fn find_by_id<'a>(document: &'a Html, tag: &str, id: &str) -> Result<Option<ElementRef<'a>>> {
    let tag_selector = selector(&format!("{}[id]", tag))?;
    Ok(document
        .select(&tag_selector)
        .find(|el| el.value().attr("id") == Some(id)))
}

/// Turns a game's box-score page into one four-factor row per team.
pub struct BoxScoreParser<'a> {
    layout: &'a BoxScoreLayout,
}

impl<'a> BoxScoreParser<'a> {
    pub fn new(layout: &'a BoxScoreLayout) -> Self {
        Self { layout }
    }

    /// Distinct team ids in the order their sections first appear.
    pub fn team_ids(&self, document: &Html) -> Result<Vec<String>> {
        let id_selector = selector("[id]")?;
        let mut team_ids: Vec<String> = Vec::new();

        for element in document.select(&id_selector) {
            let Some(id) = element.value().attr("id") else {
                continue;
            };
            let team_id = id
                .strip_prefix(self.layout.section_prefix)
                .and_then(|rest| rest.strip_suffix(self.layout.section_suffix));
            if let Some(team_id) = team_id {
                if !team_id.is_empty() && !team_ids.iter().any(|t| t == team_id) {
                    team_ids.push(team_id.to_string());
                }
            }
        }

        match team_ids.len() {
            2 => Ok(team_ids),
            n if n < 2 => Err(Error::Parse(format!(
                "Team IDs not found: expected 2 team sections, found {}",
                n
            ))),
            n => Err(Error::Parse(format!(
                "Expected 2 team sections, found {}: {:?}",
                n, team_ids
            ))),
        }
    }

    pub fn parse(&self, document: &Html) -> Result<Vec<FourFactorRow>> {
        self.team_ids(document)?
            .iter()
            .map(|team_id| self.parse_team(document, team_id))
            .collect()
    }

    fn totals_cells(&self, document: &Html, table_id: &str) -> Result<Vec<String>> {
        let table = find_by_id(document, "table", table_id)?
            .ok_or_else(|| Error::Parse(format!("Table {} not found", table_id)))?;
        let row = find_labeled_row(&table, self.layout.totals_label)?.ok_or_else(|| {
            Error::Parse(format!("No {:?} row in table {}", self.layout.totals_label, table_id))
        })?;
        td_texts(&row)
    }

    fn parse_team(&self, document: &Html, team_id: &str) -> Result<FourFactorRow> {
        let basic_id = format!("{}{}", self.layout.basic_table_prefix, team_id);
        let advanced_id = format!("{}{}", self.layout.advanced_table_prefix, team_id);

        let basic = self.totals_cells(document, &basic_id)?;
        let columns = &self.layout.basic;
        let fga = parse_stat(&basic, columns.fga, "FGA")?;
        let ft = parse_stat(&basic, columns.ft, "FT")?;
        let fta = parse_stat(&basic, columns.fta, "FTA")?;
        let orb = parse_stat(&basic, columns.orb, "ORB")?;
        let tov = parse_stat(&basic, columns.tov, "TOV")?;
        let points = parse_stat(&basic, columns.pts, "PTS")?;

        let free_throw_rate = factors::free_throw_rate(ft, fga)?;
        let possessions = factors::possessions(fga, orb, tov, fta)?;

        let advanced = self.totals_cells(document, &advanced_id)?;
        let columns = &self.layout.advanced;
        let mut offensive_rebound_pct = parse_stat(&advanced, columns.orb_pct, "ORB%")?;
        if columns.orb_pct_in_percent {
            offensive_rebound_pct /= 100.0;
        }
        let row = FourFactorRow {
            team_id: team_id.to_string(),
            possessions,
            effective_fg_pct: parse_stat(&advanced, columns.efg_pct, "eFG%")?,
            turnover_pct: parse_stat(&advanced, columns.tov_pct, "TOV%")?,
            offensive_rebound_pct,
            free_throw_rate,
            offensive_rating: parse_stat(&advanced, columns.off_rating, "ORtg")?,
            final_score: Some(points),
        };
        debug!("Box score row for {}: {:?}", team_id, row);
        Ok(row)
    }
}
