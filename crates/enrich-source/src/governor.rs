//! Request pacing for the review source.
//!
//! Delays are drawn by [`draw_delay`], a pure function over an injected RNG,
//! so a seeded [`Governor`] produces the same schedule on every run. The
//! client identity is fixed: every request declares the same user agent.

use std::time::Duration;

use rand::Rng;
use rand::rngs::StdRng;
use thiserror::Error;
use tracing::{debug, info};

/// Default identity sent with every lookup.
pub const DEFAULT_IDENTITY: &str = concat!("roster-enrich/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error, PartialEq)]
pub enum PacingError {
    #[error("delay band minimum {min:?} exceeds maximum {max:?}")]
    InvertedBand { min: Duration, max: Duration },

    #[error("delay {0} is not a valid number of seconds")]
    InvalidDelay(f64),

    #[error("group size must be >= 1")]
    ZeroGroupSize,

    #[error("client identity must not be empty")]
    EmptyIdentity,
}

/// Closed interval `[min, max]` a delay is drawn uniformly from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayBand {
    min: Duration,
    max: Duration,
}

impl DelayBand {
    pub fn new(min: Duration, max: Duration) -> Result<Self, PacingError> {
        if min > max {
            return Err(PacingError::InvertedBand { min, max });
        }
        Ok(Self { min, max })
    }

    pub fn from_secs(min: f64, max: f64) -> Result<Self, PacingError> {
        let secs = |s: f64| Duration::try_from_secs_f64(s).map_err(|_| PacingError::InvalidDelay(s));
        Self::new(secs(min)?, secs(max)?)
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    pub fn contains(&self, d: Duration) -> bool {
        self.min <= d && d <= self.max
    }
}

/// Draw one delay uniformly from `band`.
pub fn draw_delay<R: Rng + ?Sized>(rng: &mut R, band: &DelayBand) -> Duration {
    if band.min == band.max {
        return band.min;
    }
    let secs = rng.gen_range(band.min.as_secs_f64()..=band.max.as_secs_f64());
    // Float rounding can step a hair outside the band; clamp back in.
    Duration::from_secs_f64(secs).clamp(band.min, band.max)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacingConfig {
    /// Pause before each lookup.
    pub request: DelayBand,
    /// Longer pause after every `group_size` lookups.
    pub group: DelayBand,
    pub group_size: usize,
    /// Upper bound on a server-requested back-off.
    pub max_backoff: Duration,
    /// Fallback back-off when a rate-limit response names no delay.
    pub default_backoff: Duration,
    pub identity: String,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            request: DelayBand {
                min: Duration::from_secs(2),
                max: Duration::from_secs(4),
            },
            group: DelayBand {
                min: Duration::from_secs(30),
                max: Duration::from_secs(60),
            },
            group_size: 20,
            max_backoff: Duration::from_secs(300),
            default_backoff: Duration::from_secs(60),
            identity: DEFAULT_IDENTITY.to_string(),
        }
    }
}

impl PacingConfig {
    pub fn validate(&self) -> Result<(), PacingError> {
        if self.group_size == 0 {
            return Err(PacingError::ZeroGroupSize);
        }
        if self.identity.trim().is_empty() {
            return Err(PacingError::EmptyIdentity);
        }
        Ok(())
    }

    /// True when `lookups` completed lookups close a group.
    pub fn is_group_boundary(&self, lookups: usize) -> bool {
        lookups > 0 && lookups % self.group_size == 0
    }
}

/// Paces lookups against one source and supplies the client identity.
pub struct Governor {
    config: PacingConfig,
    rng: StdRng,
}

impl Governor {
    pub fn new(config: PacingConfig, rng: StdRng) -> Result<Self, PacingError> {
        config.validate()?;
        Ok(Self { config, rng })
    }

    pub fn config(&self) -> &PacingConfig {
        &self.config
    }

    /// Next request delay, without sleeping.
    pub fn next_request_delay(&mut self) -> Duration {
        draw_delay(&mut self.rng, &self.config.request)
    }

    /// Next group cooldown, without sleeping.
    pub fn next_group_delay(&mut self) -> Duration {
        draw_delay(&mut self.rng, &self.config.group)
    }

    pub async fn pace_between_requests(&mut self) -> Duration {
        let delay = self.next_request_delay();
        debug!(?delay, "pacing before lookup");
        tokio::time::sleep(delay).await;
        delay
    }

    pub async fn pace_between_groups(&mut self) -> Duration {
        let delay = self.next_group_delay();
        info!(delay_secs = delay.as_secs(), "cooling down between groups");
        tokio::time::sleep(delay).await;
        delay
    }

    /// Sleep for a server-requested back-off, capped at `max_backoff`.
    pub async fn back_off(&mut self, retry_after: Option<Duration>) -> Duration {
        let delay = retry_after
            .unwrap_or(self.config.default_backoff)
            .min(self.config.max_backoff);
        info!(delay_secs = delay.as_secs(), "source rate limited, backing off");
        tokio::time::sleep(delay).await;
        delay
    }

    /// The identity to declare on the next request.
    pub fn next_identity(&self) -> &str {
        &self.config.identity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn governor(seed: u64) -> Governor {
        Governor::new(PacingConfig::default(), StdRng::seed_from_u64(seed)).unwrap()
    }

    #[test]
    fn request_delays_stay_in_band_and_vary() {
        let mut gov = governor(7);
        let band = gov.config().request;
        let delays: Vec<Duration> = (0..100).map(|_| gov.next_request_delay()).collect();
        assert!(delays.iter().all(|d| band.contains(*d)), "{delays:?}");
        assert!(delays.iter().any(|d| *d != delays[0]));
    }

    #[test]
    fn group_delays_stay_in_band() {
        let mut gov = governor(11);
        for _ in 0..50 {
            let d = gov.next_group_delay();
            assert!(d >= Duration::from_secs(30) && d <= Duration::from_secs(60));
        }
    }

    #[test]
    fn same_seed_same_schedule() {
        let mut a = governor(42);
        let mut b = governor(42);
        for _ in 0..10 {
            assert_eq!(a.next_request_delay(), b.next_request_delay());
        }
    }

    #[test]
    fn degenerate_band_returns_its_bound() {
        let band = DelayBand::from_secs(0.0, 0.0).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(draw_delay(&mut rng, &band), Duration::ZERO);
    }

    #[test]
    fn inverted_band_rejected() {
        assert!(matches!(
            DelayBand::from_secs(4.0, 2.0),
            Err(PacingError::InvertedBand { .. })
        ));
    }

    #[test]
    fn negative_delay_rejected() {
        assert_eq!(DelayBand::from_secs(-1.0, 2.0), Err(PacingError::InvalidDelay(-1.0)));
    }

    #[test]
    fn config_validation() {
        let mut config = PacingConfig::default();
        config.group_size = 0;
        assert_eq!(config.validate(), Err(PacingError::ZeroGroupSize));

        let mut config = PacingConfig::default();
        config.identity = " ".into();
        assert_eq!(config.validate(), Err(PacingError::EmptyIdentity));
    }

    #[test]
    fn group_boundaries() {
        let config = PacingConfig::default();
        assert!(!config.is_group_boundary(0));
        assert!(!config.is_group_boundary(19));
        assert!(config.is_group_boundary(20));
        assert!(config.is_group_boundary(40));
    }

    #[test]
    fn identity_is_stable() {
        let gov = governor(3);
        assert_eq!(gov.next_identity(), DEFAULT_IDENTITY);
        assert_eq!(gov.next_identity(), gov.next_identity());
    }

    #[tokio::test(start_paused = true)]
    async fn pacing_sleeps_for_drawn_delay() {
        let mut gov = governor(5);
        let before = tokio::time::Instant::now();
        let delay = gov.pace_between_requests().await;
        let elapsed = tokio::time::Instant::now() - before;
        assert!(elapsed >= delay && elapsed < delay + Duration::from_millis(2), "{elapsed:?} vs {delay:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn back_off_is_capped() {
        let mut gov = governor(5);
        assert_eq!(gov.back_off(Some(Duration::from_secs(3600))).await, Duration::from_secs(300));
        assert_eq!(gov.back_off(None).await, Duration::from_secs(60));
        assert_eq!(gov.back_off(Some(Duration::from_secs(5))).await, Duration::from_secs(5));
    }
}
