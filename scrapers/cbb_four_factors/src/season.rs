use scraper::{ElementRef, Html};
use tracing::debug;

use crate::{
    error::{Error, Result},
    factors,
    layout::SeasonLayout,
    types::FourFactorRow,
    utils::{find_labeled_row, parse_stat, selector, td_texts},
};

/// Builds one season-aggregate four-factor row from a team's season page.
pub struct SeasonParser<'a> {
    layout: &'a SeasonLayout,
}

impl<'a> SeasonParser<'a> {
    pub fn new(layout: &'a SeasonLayout) -> Self {
        Self { layout }
    }

    fn table<'d>(&self, document: &'d Html, css: &str) -> Result<ElementRef<'d>> {
        let table_selector = selector(css)?;
        let row_selector = selector("tr")?;
        let table = document
            .select(&table_selector)
            .next()
            .ok_or_else(|| Error::Parse(format!("Table {} not found", css)))?;
        if table.select(&row_selector).next().is_none() {
            return Err(Error::Parse(format!("Table {} is empty", css)));
        }
        Ok(table)
    }

    fn labeled_cells(&self, table: &ElementRef, label: &str, css: &str) -> Result<Vec<String>> {
        let row = find_labeled_row(table, label)?
            .ok_or_else(|| Error::Parse(format!("No {:?} row in {}", label, css)))?;
        td_texts(&row)
    }

    pub fn parse(&self, document: &Html, team_id: &str) -> Result<FourFactorRow> {
        let layout = self.layout;

        let players = self.table(document, layout.players_table)?;
        let totals = self.labeled_cells(&players, layout.players_totals_label, layout.players_table)?;
        let effective_fg_pct = parse_stat(&totals, layout.players_efg_pct, "eFG%")?;
        let points = parse_stat(&totals, layout.players_pts, "PTS")?;

        let team_table = self.table(document, layout.team_table)?;
        let team = self.labeled_cells(&team_table, layout.team_label, layout.team_table)?;
        let opponent = self.labeled_cells(&team_table, layout.opponent_label, layout.team_table)?;

        let columns = &layout.team;
        let fga = parse_stat(&team, columns.fga, "FGA")?;
        let ft = parse_stat(&team, columns.ft, "FT")?;
        let fta = parse_stat(&team, columns.fta, "FTA")?;
        let orb = parse_stat(&team, columns.orb, "ORB")?;
        let tov = parse_stat(&team, columns.tov, "TOV")?;
        let opponent_drb = parse_stat(&opponent, columns.drb, "Opponent DRB")?;

        let possessions = factors::possessions(fga, orb, tov, fta)?;
        let row = FourFactorRow {
            team_id: team_id.to_string(),
            possessions,
            effective_fg_pct,
            turnover_pct: factors::turnover_pct(fga, fta, tov)?,
            offensive_rebound_pct: factors::offensive_rebound_pct(orb, opponent_drb)?,
            free_throw_rate: factors::free_throw_rate(ft, fga)?,
            offensive_rating: factors::offensive_rating(points, possessions)?,
            final_score: None,
        };
        debug!("Season row for {}: {:?}", team_id, row);
        Ok(row)
    }
}
