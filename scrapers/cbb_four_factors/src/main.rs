use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

use cbb_four_factors::{
    config::ScraperConfig,
    fetch::HttpFetcher,
    trainer::{TestPrediction, TrainedModelPair},
    Pipeline,
};

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Args)]
struct TrainWindow {
    /// First schedule date (YYYY-MM-DD)
    #[arg(long)]
    start: NaiveDate,
    /// Last schedule date, inclusive
    #[arg(long)]
    end: NaiveDate,
    /// Maximum games scraped per day
    #[arg(long)]
    cap: Option<usize>,
    /// Trees per forest
    #[arg(long)]
    trees: Option<usize>,
    /// Seed for the train/test split and the forests
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List the men's games played on a date
    Schedule {
        #[arg(short, long)]
        date: NaiveDate,
    },
    /// Scrape a date range, train both score models and save them
    Train {
        #[command(flatten)]
        window: TrainWindow,
        /// Where to write the trained models (JSON)
        #[arg(short, long)]
        out: PathBuf,
        /// Optional CSV of held-out predictions vs actual scores
        #[arg(long)]
        predictions: Option<PathBuf>,
    },
    /// Predict a matchup with saved models
    Predict {
        #[arg(short, long)]
        model: PathBuf,
        /// Season page URL of the away team
        #[arg(long)]
        away: String,
        /// Season page URL of the home team
        #[arg(long)]
        home: String,
    },
    /// Train on a date range, then predict a matchup without saving
    Matchup {
        #[command(flatten)]
        window: TrainWindow,
        #[arg(long)]
        away: String,
        #[arg(long)]
        home: String,
    },
}

fn write_predictions(path: &Path, predictions: &[TestPrediction]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record([
        "game_id",
        "away_team",
        "home_team",
        "actual_away",
        "predicted_away",
        "actual_home",
        "predicted_home",
    ])?;
    for p in predictions {
        wtr.write_record(&[
            p.game_id.to_string(),
            p.away_team_name.clone(),
            p.home_team_name.clone(),
            p.actual_away.to_string(),
            format!("{:.2}", p.predicted_away),
            p.actual_home.to_string(),
            format!("{:.2}", p.predicted_home),
        ])?;
    }
    wtr.flush()?;
    info!("Wrote {} test predictions to {:?}", predictions.len(), path);
    Ok(())
}

fn train(pipeline: &Pipeline<HttpFetcher>, window: &TrainWindow) -> Result<TrainedModelPair> {
    let trees = window.trees.unwrap_or(pipeline.config().training.ensemble_size);
    let cap = window.cap.or(pipeline.config().training.games_per_day_cap);
    let models = pipeline
        .train_model(window.start, window.end, cap, trees)
        .with_context(|| format!("Training on {} to {} failed", window.start, window.end))?;
    println!("Home RMSE: {:.3}", models.home_rmse);
    println!("Away RMSE: {:.3}", models.away_rmse);
    Ok(models)
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut config = ScraperConfig::from_env();
    if let Commands::Train { window, .. } | Commands::Matchup { window, .. } = &cli.command {
        if let Some(seed) = window.seed {
            config.training.seed = seed;
        }
    }

    let fetcher = HttpFetcher::new(&config).context("Failed to create fetcher")?;
    let pipeline = Pipeline::new(fetcher, config);

    match &cli.command {
        Commands::Schedule { date } => {
            for game in pipeline.matchups_date(*date)? {
                println!(
                    "{} {} @ {} {}  {}",
                    game.away_team_name,
                    game.away_score.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string()),
                    game.home_team_name,
                    game.home_score.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string()),
                    game.boxscore_reference.as_deref().unwrap_or(""),
                );
            }
        }
        Commands::Train { window, out, predictions } => {
            let models = train(&pipeline, window)?;
            models.save(out)?;
            if let Some(path) = predictions {
                write_predictions(path, &models.test_predictions)?;
            }
        }
        Commands::Predict { model, away, home } => {
            let models = TrainedModelPair::load(model)
                .with_context(|| format!("Failed to load models from {:?}", model))?;
            let result = pipeline.predict_matchup(away, home, &models)?;
            println!(
                "{} {:.1} @ {} {:.1}",
                result.away_team, result.predicted_away_points, result.home_team, result.predicted_home_points
            );
        }
        Commands::Matchup { window, away, home } => {
            let models = train(&pipeline, window)?;
            let result = pipeline.predict_matchup(away, home, &models)?;
            println!(
                "{} {:.1} @ {} {:.1}",
                result.away_team, result.predicted_away_points, result.home_team, result.predicted_home_points
            );
        }
    }

    let metrics = pipeline.fetcher().metrics();
    info!(
        "{} requests ({} failed, {} retries, {} rate limited), {:.0} ms waiting on throttle",
        metrics.total_requests,
        metrics.failed_requests,
        metrics.retries,
        metrics.rate_limited_responses,
        metrics.throttle_wait_ms
    );

    Ok(())
}
