use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use reqwest::{blocking::Response, header::RETRY_AFTER, StatusCode};
use scraper::Html;
use std::{
    collections::HashMap,
    thread,
    time::{Duration, Instant},
};
use tracing::{debug, info, warn};

use crate::{
    config::ScraperConfig,
    error::{Error, Result},
    metrics::{FetchMetrics, MetricsCollector},
    utils::uncomment_tables,
};

const INITIAL_RETRY_DELAY: Duration = Duration::from_secs(1);
const THROTTLE_POLL: Duration = Duration::from_millis(100);

/// Anything that can turn a URL into a parsed page.
pub trait PageFetcher {
    fn fetch(&self, url: &str) -> Result<Html>;
}

impl<T: PageFetcher + ?Sized> PageFetcher for &T {
    fn fetch(&self, url: &str) -> Result<Html> {
        (**self).fetch(url)
    }
}

/// Gate called before every request. Returns how long the caller was held.
pub trait Throttle: Send + Sync {
    fn wait(&self) -> Duration;
}

pub struct Unthrottled;

impl Throttle for Unthrottled {
    fn wait(&self) -> Duration {
        Duration::ZERO
    }
}

/// At most one request per interval.
pub struct IntervalThrottle {
    limiter: Option<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl IntervalThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            limiter: Quota::with_period(interval).map(RateLimiter::direct),
        }
    }
}

impl Throttle for IntervalThrottle {
    fn wait(&self) -> Duration {
        let Some(limiter) = &self.limiter else {
            return Duration::ZERO;
        };
        let start = Instant::now();
        while limiter.check().is_err() {
            thread::sleep(THROTTLE_POLL);
        }
        start.elapsed()
    }
}

enum Attempt {
    Transient(Error),
    Fatal(Error),
}

pub struct HttpFetcher {
    client: reqwest::blocking::Client,
    throttle: Box<dyn Throttle>,
    metrics: MetricsCollector,
    max_retries: u32,
    default_retry_after: Duration,
    max_retry_after: Duration,
    initial_backoff: Duration,
}

impl HttpFetcher {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(&config.scraping.user_agent)
            .timeout(Duration::from_secs(config.scraping.request_timeout_secs))
            .build()
            .map_err(|e| Error::Fetch {
                url: config.site.base_url.clone(),
                reason: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            throttle: Box::new(IntervalThrottle::new(Duration::from_millis(
                config.rate_limits.request_interval_ms,
            ))),
            metrics: MetricsCollector::new(),
            max_retries: config.rate_limits.max_retries,
            default_retry_after: Duration::from_secs(config.rate_limits.default_retry_after_secs),
            max_retry_after: Duration::from_secs(config.rate_limits.max_retry_after_secs),
            initial_backoff: INITIAL_RETRY_DELAY,
        })
    }

    pub fn with_throttle(mut self, throttle: impl Throttle + 'static) -> Self {
        self.throttle = Box::new(throttle);
        self
    }

    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    pub fn metrics(&self) -> FetchMetrics {
        self.metrics.get_metrics()
    }

    fn retry_after(&self, response: &Response) -> Duration {
        response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(self.default_retry_after)
            .min(self.max_retry_after)
    }

    fn fetch_once(&self, url: &str) -> std::result::Result<String, Attempt> {
        let response = self.client.get(url).send().map_err(|e| {
            Attempt::Transient(Error::Fetch {
                url: url.to_string(),
                reason: e.to_string(),
            })
        })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(Attempt::Transient(Error::RateLimited {
                url: url.to_string(),
                retry_after: self.retry_after(&response),
            }));
        }
        if status.is_server_error() {
            return Err(Attempt::Transient(Error::Fetch {
                url: url.to_string(),
                reason: format!("HTTP {}", status),
            }));
        }
        if !status.is_success() {
            return Err(Attempt::Fatal(Error::Fetch {
                url: url.to_string(),
                reason: format!("HTTP {}", status),
            }));
        }

        response.text().map_err(|e| {
            Attempt::Transient(Error::Fetch {
                url: url.to_string(),
                reason: e.to_string(),
            })
        })
    }

    /// Throttled GET with bounded retries. A 429 waits for its Retry-After,
    /// 5xx and transport errors back off exponentially.
    pub fn fetch_text(&self, url: &str) -> Result<String> {
        let mut backoff = self.initial_backoff;
        let mut attempt = 0;

        loop {
            let waited = self.throttle.wait();
            self.metrics.record_throttle_wait(waited);

            debug!("Fetching {}", url);
            let tracker = self.metrics.record_request_start();
            match self.fetch_once(url) {
                Ok(body) => {
                    tracker.finish(true);
                    debug!("Downloaded {} bytes from {}", body.len(), url);
                    return Ok(body);
                }
                Err(Attempt::Fatal(e)) => {
                    tracker.finish(false);
                    self.metrics.record_error(e.to_string());
                    return Err(e);
                }
                Err(Attempt::Transient(e)) => {
                    tracker.finish(false);
                    self.metrics.record_error(e.to_string());
                    if attempt >= self.max_retries {
                        warn!("Giving up on {} after {} retries: {}", url, attempt, e);
                        return Err(e);
                    }

                    let delay = match &e {
                        Error::RateLimited { retry_after, .. } => *retry_after,
                        _ => {
                            let delay = backoff;
                            backoff *= 2;
                            delay
                        }
                    };
                    info!("Retry attempt {} for {} in {:?} after error: {}", attempt + 1, url, delay, e);
                    self.metrics.record_retry(e.is_retryable());
                    thread::sleep(delay);
                    attempt += 1;
                }
            }
        }
    }
}

impl PageFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Html> {
        let body = self.fetch_text(url)?;
        Ok(Html::parse_document(&uncomment_tables(&body)))
    }
}

/// Serves pages from memory, for replaying saved HTML.
#[derive(Debug, Clone, Default)]
pub struct MemoryFetcher {
    pages: HashMap<String, String>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.insert(url, html);
        self
    }

    pub fn insert(&mut self, url: impl Into<String>, html: impl Into<String>) {
        self.pages.insert(url.into(), html.into());
    }
}

impl PageFetcher for MemoryFetcher {
    fn fetch(&self, url: &str) -> Result<Html> {
        let body = self.pages.get(url).ok_or_else(|| Error::Fetch {
            url: url.to_string(),
            reason: "HTTP 404 Not Found".to_string(),
        })?;
        Ok(Html::parse_document(&uncomment_tables(body)))
    }
}
