use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::{
    box_score::BoxScoreParser,
    config::ScraperConfig,
    dataset::{assemble, Assembly, ExtractedGame},
    error::{Error, Result},
    fetch::PageFetcher,
    layout::{schedule_url, SiteLayout},
    predict::MatchupPredictor,
    schedule::ScheduleParser,
    season::SeasonParser,
    trainer::{train_models, TrainConfig, TrainedModelPair},
    types::{FourFactorRow, GameSummary, PredictionResult},
    utils::team_slug_from_href,
};

/// Scrape, assemble, train and predict against one site through one fetcher.
pub struct Pipeline<F: PageFetcher> {
    fetcher: F,
    config: ScraperConfig,
    layout: SiteLayout,
}

impl<F: PageFetcher> Pipeline<F> {
    pub fn new(fetcher: F, config: ScraperConfig) -> Self {
        Self {
            fetcher,
            config,
            layout: SiteLayout::default(),
        }
    }

    pub fn with_layout(mut self, layout: SiteLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn config(&self) -> &ScraperConfig {
        &self.config
    }

    pub fn matchups_date(&self, date: NaiveDate) -> Result<Vec<GameSummary>> {
        let url = schedule_url(&self.config.site.base_url, date);
        let document = self.fetcher.fetch(&url)?;
        ScheduleParser::new(&self.layout.schedule, &self.config.site.base_url).parse(&document, date)
    }

    /// Fetches and parses one box score. Teams come back in page order.
    pub fn extract_box_score(&self, reference: Option<&str>) -> Result<Vec<FourFactorRow>> {
        let url = reference.ok_or(Error::MissingReference)?;
        let document = self.fetcher.fetch(url)?;
        BoxScoreParser::new(&self.layout.box_score).parse(&document)
    }

    /// Same as [`Self::extract_box_score`], except a game without a box-score
    /// link yields no rows rather than an error.
    pub fn create_four_factors(&self, reference: Option<&str>) -> Result<Vec<FourFactorRow>> {
        if reference.is_none() {
            debug!("No box score reference, skipping");
            return Ok(Vec::new());
        }
        self.extract_box_score(reference)
    }

    pub fn calculate_team_metrics(&self, season_url: &str) -> Result<FourFactorRow> {
        let team_id = team_slug_from_href(season_url).unwrap_or_else(|| season_url.to_string());
        let document = self.fetcher.fetch(season_url)?;
        SeasonParser::new(&self.layout.season).parse(&document, &team_id)
    }

    /// Every game from `start` to `end` inclusive, at most `cap` per day.
    /// A box score that fails to parse leaves its game without rows; fetch
    /// failures abort the whole run.
    pub fn collect_games(&self, start: NaiveDate, end: NaiveDate, cap: Option<usize>) -> Result<Vec<ExtractedGame>> {
        let mut schedule = Vec::new();
        let mut date = start;
        while date <= end {
            let mut games = self.matchups_date(date)?;
            if let Some(cap) = cap {
                games.truncate(cap);
            }
            info!("{}: {} games", date, games.len());
            schedule.extend(games);
            date = match date.succ_opt() {
                Some(next) => next,
                None => break,
            };
        }

        let total = schedule.len();
        let mut extracted = Vec::with_capacity(total);
        for (i, summary) in schedule.into_iter().enumerate() {
            info!(
                "Processing game {} of {}: {} at {}",
                i + 1,
                total,
                summary.away_team_name,
                summary.home_team_name
            );
            let rows = match self.create_four_factors(summary.boxscore_reference.as_deref()) {
                Ok(rows) => rows,
                Err(e) if e.is_page_local() => {
                    warn!(
                        "Skipping box score for {} at {}: {}",
                        summary.away_team_name, summary.home_team_name, e
                    );
                    Vec::new()
                }
                Err(e) => return Err(e),
            };
            extracted.push(ExtractedGame { summary, rows });
        }
        Ok(extracted)
    }

    pub fn build_dataset(&self, start: NaiveDate, end: NaiveDate, cap: Option<usize>) -> Result<Assembly> {
        let games = self.collect_games(start, end, cap)?;
        Ok(assemble(&games))
    }

    pub fn train_model(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        games_per_day_cap: Option<usize>,
        ensemble_size: usize,
    ) -> Result<TrainedModelPair> {
        if start > end {
            return Err(Error::InsufficientData(format!("Empty date range {} to {}", start, end)));
        }
        let assembly = self.build_dataset(start, end, games_per_day_cap)?;
        if assembly.dropped() > 0 {
            warn!(
                "Dropped {} of {} games ({} incomplete, {} mislabeled)",
                assembly.dropped(),
                assembly.dropped() + assembly.records.len(),
                assembly.dropped_incomplete,
                assembly.dropped_mislabeled
            );
        }

        let config = TrainConfig {
            ensemble_size,
            ..TrainConfig::from(&self.config.training)
        };
        train_models(&assembly.records, &config)
    }

    /// Team 1 plays away, team 2 at home.
    pub fn predict_matchup(
        &self,
        team1_url: &str,
        team2_url: &str,
        models: &TrainedModelPair,
    ) -> Result<PredictionResult> {
        let away = self.calculate_team_metrics(team1_url)?;
        let home = self.calculate_team_metrics(team2_url)?;
        MatchupPredictor::from(models).predict(&away, &home)
    }
}
