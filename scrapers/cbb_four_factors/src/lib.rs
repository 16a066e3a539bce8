pub mod box_score;
pub mod config;
pub mod dataset;
pub mod error;
pub mod factors;
pub mod fetch;
pub mod forest;
pub mod layout;
pub mod metrics;
pub mod pipeline;
pub mod predict;
pub mod schedule;
pub mod season;
pub mod trainer;
pub mod types;
pub mod utils;

pub use error::{Error, Result};
pub use pipeline::Pipeline;
