use chrono::NaiveDate;
use scraper::{ElementRef, Html};
use tracing::{debug, info, warn};

use crate::{
    error::Result,
    layout::{absolutize, ScheduleLayout},
    types::GameSummary,
    utils::{element_text, parse_score, selector, team_slug_from_href},
};

struct TeamLine {
    name: String,
    team_id: Option<String>,
    score: Option<i32>,
}

/// Reads the men's game summaries off a daily scoreboard page.
pub struct ScheduleParser<'a> {
    layout: &'a ScheduleLayout,
    base_url: &'a str,
}

impl<'a> ScheduleParser<'a> {
    pub fn new(layout: &'a ScheduleLayout, base_url: &'a str) -> Self {
        Self { layout, base_url }
    }

    /// Games in document order. A page without game blocks is an empty day.
    pub fn parse(&self, document: &Html, date: NaiveDate) -> Result<Vec<GameSummary>> {
        let block_selector = selector(self.layout.game_block)?;
        let mut games = Vec::new();

        for block in document.select(&block_selector) {
            match self.parse_block(&block, date)? {
                Some(game) => games.push(game),
                None => warn!("Skipping game block without two team rows on {}", date),
            }
        }

        if games.is_empty() {
            info!("No men's games found for {}", date);
        } else {
            debug!("Found {} games for {}", games.len(), date);
        }
        Ok(games)
    }

    fn parse_block(&self, block: &ElementRef, date: NaiveDate) -> Result<Option<GameSummary>> {
        let row_selector = selector(self.layout.team_row)?;
        let boxscore_selector = selector(self.layout.boxscore_link)?;

        let mut lines = Vec::with_capacity(2);
        for row in block.select(&row_selector) {
            if let Some(line) = self.parse_team_row(&row)? {
                lines.push(line);
            }
            if lines.len() == 2 {
                break;
            }
        }
        if lines.len() < 2 {
            return Ok(None);
        }
        let home = lines.remove(1);
        let away = lines.remove(0);

        let boxscore_reference = block
            .select(&boxscore_selector)
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(|href| absolutize(self.base_url, href))
            .transpose()?;

        Ok(Some(GameSummary {
            date,
            away_team_name: away.name,
            home_team_name: home.name,
            away_team_id: away.team_id,
            home_team_id: home.team_id,
            away_score: away.score,
            home_score: home.score,
            boxscore_reference,
        }))
    }

    fn parse_team_row(&self, row: &ElementRef) -> Result<Option<TeamLine>> {
        let name_selector = selector(self.layout.name_cell)?;
        let link_selector = selector(self.layout.team_link)?;
        let score_selector = selector(self.layout.score_cell)?;

        let Some(cell) = row.select(&name_selector).next() else {
            return Ok(None);
        };
        let name = element_text(&cell);
        if name.is_empty() {
            return Ok(None);
        }

        // Non-D1 schools have no link, so the name cell is plain text.
        let team_id = cell
            .select(&link_selector)
            .next()
            .and_then(|a| a.value().attr("href"))
            .and_then(team_slug_from_href);
        let score = row
            .select(&score_selector)
            .next()
            .and_then(|cell| parse_score(&element_text(&cell)));

        Ok(Some(TeamLine { name, team_id, score }))
    }
}
