//! Table layout of the statistics site.
//!
//! Column headers on these pages are never read, so every selector, label and
//! cell position the extractors depend on lives here. When the site changes a
//! table, bump the version and edit this file only.

use chrono::{Datelike, NaiveDate};
use url::Url;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleLayout {
    pub game_block: &'static str,
    pub team_row: &'static str,
    /// Cell holding the team name; the school link is looked up inside it only.
    pub name_cell: &'static str,
    pub team_link: &'static str,
    pub score_cell: &'static str,
    pub boxscore_link: &'static str,
}

/// Positions over the `td` cells of a basic box-score row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicColumns {
    pub fga: usize,
    pub ft: usize,
    pub fta: usize,
    pub orb: usize,
    pub tov: usize,
    pub pts: usize,
}

/// Positions over the `td` cells of an advanced box-score row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvancedColumns {
    pub efg_pct: usize,
    pub orb_pct: usize,
    /// The site prints ORB% in percentage units; rows store a fraction.
    pub orb_pct_in_percent: bool,
    pub tov_pct: usize,
    pub off_rating: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoxScoreLayout {
    /// Team sections are discovered from heading ids of the form
    /// `{section_prefix}{team}{section_suffix}`.
    pub section_prefix: &'static str,
    pub section_suffix: &'static str,
    pub basic_table_prefix: &'static str,
    pub advanced_table_prefix: &'static str,
    pub totals_label: &'static str,
    pub basic: BasicColumns,
    pub advanced: AdvancedColumns,
}

/// Positions over the `td` cells of the season team/opponent table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeasonColumns {
    pub fga: usize,
    pub ft: usize,
    pub fta: usize,
    pub orb: usize,
    pub drb: usize,
    pub tov: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeasonLayout {
    pub players_table: &'static str,
    pub players_totals_label: &'static str,
    pub players_efg_pct: usize,
    pub players_pts: usize,
    pub team_table: &'static str,
    pub team_label: &'static str,
    pub opponent_label: &'static str,
    pub team: SeasonColumns,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteLayout {
    pub version: u32,
    pub schedule: ScheduleLayout,
    pub box_score: BoxScoreLayout,
    pub season: SeasonLayout,
}

impl SiteLayout {
    pub const V1: SiteLayout = SiteLayout {
        version: 1,
        schedule: ScheduleLayout {
            game_block: "div.game_summary.gender-m",
            team_row: "table.teams tr",
            name_cell: "td:first-child",
            team_link: "a",
            score_cell: "td.right",
            boxscore_link: "td.gamelink a",
        },
        box_score: BoxScoreLayout {
            section_prefix: "box-score-advanced-",
            section_suffix: "_sh",
            basic_table_prefix: "box-score-basic-",
            advanced_table_prefix: "box-score-advanced-",
            totals_label: "School Totals",
            // MP FG FGA FG% 3P 3PA 3P% FT FTA FT% ORB DRB TRB AST STL BLK TOV PF PTS
            basic: BasicColumns {
                fga: 2,
                ft: 7,
                fta: 8,
                orb: 10,
                tov: 16,
                pts: 18,
            },
            // MP TS% eFG% 3PAr FTr ORB% DRB% TRB% AST% STL% BLK% TOV% USG% ORtg
            advanced: AdvancedColumns {
                efg_pct: 2,
                orb_pct: 5,
                orb_pct_in_percent: true,
                tov_pct: 11,
                off_rating: 13,
            },
        },
        season: SeasonLayout {
            players_table: "table#players_totals",
            players_totals_label: "Team Totals",
            players_efg_pct: 13,
            players_pts: 25,
            team_table: "table#season-total_totals",
            team_label: "Team",
            opponent_label: "Opponent",
            // G MP FG FGA FG% 2P 2PA 2P% 3P 3PA 3P% FT FTA FT% ORB DRB TRB AST STL BLK TOV PF PTS
            team: SeasonColumns {
                fga: 3,
                ft: 11,
                fta: 12,
                orb: 14,
                drb: 15,
                tov: 20,
            },
        },
    };
}

impl Default for SiteLayout {
    fn default() -> Self {
        Self::V1
    }
}

pub fn schedule_url(base_url: &str, date: NaiveDate) -> String {
    format!(
        "{}/boxscores/index.cgi?month={}&day={}&year={}",
        base_url.trim_end_matches('/'),
        date.month(),
        date.day(),
        date.year()
    )
}

pub fn season_url(base_url: &str, team: &str, year: i32) -> String {
    format!("{}/schools/{}/men/{}.html", base_url.trim_end_matches('/'), team, year)
}

/// Resolves an href found on a page against `base_url`. The base is treated
/// as a directory, so `boxscores/x.html` lands under it.
pub fn absolutize(base_url: &str, href: &str) -> Result<String> {
    let base = Url::parse(&format!("{}/", base_url.trim_end_matches('/')))
        .map_err(|e| Error::Parse(format!("Invalid base URL {}: {}", base_url, e)))?;
    let url = base
        .join(href.trim())
        .map_err(|e| Error::Parse(format!("Invalid link {:?} on {}: {}", href, base_url, e)))?;
    Ok(url.into())
}
