//! Immutable run configuration.
//!
//! Built once at startup from whatever surface the host exposes
//! and handed to the components which need it.

use std::{
    fmt,
    num::{NonZeroU32, NonZeroUsize},
    sync::Arc,
    time::Duration,
};

use crate::{
    pace::{self, PaceFormatError, PacePlan},
    signal::DEFAULT_EVENT_SOURCE,
};

pub const DEFAULT_MESSAGE_SIZE: usize = 100;
pub const DEFAULT_PHASE_PAUSE: Duration = Duration::from_secs(1);
pub const DEFAULT_WARMUP: Duration = Duration::from_secs(30);
pub const DEFAULT_LINGER: Duration = Duration::from_secs(120);
pub const DEFAULT_RECEIVER_GRACE: Duration = Duration::from_secs(120);

/// How workload is issued within a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStrategy {
    /// Single producer firing one send per tick.
    Ticker,
    /// Fixed size worker pool drawing from a shared pacer.
    Pool { workers: NonZeroUsize },
}

impl fmt::Display for DispatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchStrategy::Ticker => f.write_str("ticker"),
            DispatchStrategy::Pool { workers } => write!(f, "pool(workers={workers})"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SenderConfig {
    pub plan: PacePlan,
    /// Size of the random filler of each workload message, in bytes.
    pub message_size: usize,
    pub source: Arc<str>,
    pub strategy: DispatchStrategy,
    /// Delay before the first phase starts.
    pub warmup: Duration,
    /// Pause between phases, after the GC signal was sent.
    pub phase_pause: Duration,
    /// Idle time after the end signal was sent.
    pub linger: Duration,
}

impl SenderConfig {
    /// Start building a sender config.
    pub fn builder() -> SenderConfigBuilder {
        SenderConfigBuilder::default()
    }
}

/// Builder for [`SenderConfig`], validated in [`SenderConfigBuilder::build`].
#[derive(Debug, Clone, Default)]
pub struct SenderConfigBuilder {
    pace: Option<String>,
    message_size: Option<usize>,
    source: Option<String>,
    workers: Option<usize>,
    warmup: Option<Duration>,
    phase_pause: Option<Duration>,
    linger: Option<Duration>,
}

impl SenderConfigBuilder {
    rama::utils::macros::generate_set_and_with! {
        /// Pace descriptor, e.g. `100,200:4`.
        pub fn pace(mut self, pace: Option<String>) -> Self {
            self.pace = pace;
            self
        }
    }

    rama::utils::macros::generate_set_and_with! {
        pub fn message_size(mut self, size: Option<usize>) -> Self {
            self.message_size = size;
            self
        }
    }

    rama::utils::macros::generate_set_and_with! {
        pub fn source(mut self, source: Option<String>) -> Self {
            self.source = source;
            self
        }
    }

    rama::utils::macros::generate_set_and_with! {
        /// Use the worker pool strategy with this many workers,
        /// the ticker strategy is used when not set.
        pub fn workers(mut self, workers: Option<usize>) -> Self {
            self.workers = workers;
            self
        }
    }

    rama::utils::macros::generate_set_and_with! {
        pub fn warmup(mut self, warmup: Option<Duration>) -> Self {
            self.warmup = warmup;
            self
        }
    }

    rama::utils::macros::generate_set_and_with! {
        pub fn phase_pause(mut self, pause: Option<Duration>) -> Self {
            self.phase_pause = pause;
            self
        }
    }

    rama::utils::macros::generate_set_and_with! {
        pub fn linger(mut self, linger: Option<Duration>) -> Self {
            self.linger = linger;
            self
        }
    }

    pub fn build(self) -> Result<SenderConfig, ConfigError> {
        let pace = self.pace.ok_or(ConfigError::MissingPace)?;
        let plan = pace::parse(&pace)?;

        let strategy = match self.workers {
            None => DispatchStrategy::Ticker,
            Some(workers) => DispatchStrategy::Pool {
                workers: NonZeroUsize::new(workers).ok_or(ConfigError::ZeroWorkers)?,
            },
        };

        let source = self
            .source
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_EVENT_SOURCE.to_owned());

        Ok(SenderConfig {
            plan,
            message_size: self.message_size.unwrap_or(DEFAULT_MESSAGE_SIZE),
            source: source.into(),
            strategy,
            warmup: self.warmup.unwrap_or(DEFAULT_WARMUP),
            phase_pause: self.phase_pause.unwrap_or(DEFAULT_PHASE_PAUSE),
            linger: self.linger.unwrap_or(DEFAULT_LINGER),
        })
    }
}

#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    /// Arrival rate above which the receiver warns.
    pub max_throughput_expected: NonZeroU32,
    /// Pause between the end signal and shutting down.
    pub grace: Duration,
    /// Whether an end signal stops the receiver.
    pub stop_on_end: bool,
}

impl ReceiverConfig {
    pub fn try_new(
        max_throughput_expected: i64,
        grace: Option<Duration>,
        stop_on_end: bool,
    ) -> Result<Self, ConfigError> {
        let max_throughput_expected = u32::try_from(max_throughput_expected)
            .ok()
            .and_then(NonZeroU32::new)
            .ok_or(ConfigError::NonPositiveThroughput(max_throughput_expected))?;

        Ok(Self {
            max_throughput_expected,
            grace: grace.unwrap_or(DEFAULT_RECEIVER_GRACE),
            stop_on_end,
        })
    }
}

/// Invalid configuration, fatal at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    MissingPace,
    MissingSink,
    NonPositiveThroughput(i64),
    ZeroWorkers,
    Pace(PaceFormatError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingPace => f.write_str("ConfigError: pace is required"),
            ConfigError::MissingSink => f.write_str("ConfigError: sink is required"),
            ConfigError::NonPositiveThroughput(value) => write!(
                f,
                "ConfigError: max throughput expected must be greater than zero (0), got {value}"
            ),
            ConfigError::ZeroWorkers => {
                f.write_str("ConfigError: worker count must be greater than zero (0)")
            }
            ConfigError::Pace(err) => write!(f, "ConfigError: invalid pace: {err}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Pace(err) => Some(err),
            _ => None,
        }
    }
}

impl From<PaceFormatError> for ConfigError {
    fn from(value: PaceFormatError) -> Self {
        ConfigError::Pace(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sender_config_defaults() {
        let cfg = SenderConfig::builder()
            .with_pace("100,200:4".to_owned())
            .build()
            .unwrap();

        assert_eq!(cfg.plan.len(), 2);
        assert_eq!(cfg.message_size, DEFAULT_MESSAGE_SIZE);
        assert_eq!(&*cfg.source, DEFAULT_EVENT_SOURCE);
        assert_eq!(cfg.strategy, DispatchStrategy::Ticker);
        assert_eq!(cfg.warmup, DEFAULT_WARMUP);
        assert_eq!(cfg.phase_pause, DEFAULT_PHASE_PAUSE);
        assert_eq!(cfg.linger, DEFAULT_LINGER);
    }

    #[test]
    fn test_sender_config_overwrites() {
        let cfg = SenderConfig::builder()
            .with_pace("10:1".to_owned())
            .with_message_size(0)
            .with_source("  bench-a ".to_owned())
            .with_workers(4)
            .with_phase_pause(Duration::ZERO)
            .build()
            .unwrap();

        assert_eq!(cfg.message_size, 0);
        assert_eq!(&*cfg.source, "bench-a");
        assert_eq!(
            cfg.strategy,
            DispatchStrategy::Pool {
                workers: NonZeroUsize::new(4).unwrap()
            }
        );
        assert_eq!(cfg.phase_pause, Duration::ZERO);
    }

    #[test]
    fn test_sender_config_errors() {
        assert_eq!(
            SenderConfig::builder().build().unwrap_err(),
            ConfigError::MissingPace
        );
        assert_eq!(
            SenderConfig::builder()
                .with_pace("10".to_owned())
                .with_workers(0)
                .build()
                .unwrap_err(),
            ConfigError::ZeroWorkers
        );
        assert!(matches!(
            SenderConfig::builder().with_pace("abc".to_owned()).build().unwrap_err(),
            ConfigError::Pace(_)
        ));
    }

    #[test]
    fn test_receiver_config_requires_positive_throughput() {
        for value in [0, -1, i64::from(u32::MAX) + 1] {
            assert_eq!(
                ReceiverConfig::try_new(value, None, true).unwrap_err(),
                ConfigError::NonPositiveThroughput(value),
            );
        }

        let cfg = ReceiverConfig::try_new(500, None, false).unwrap();
        assert_eq!(cfg.max_throughput_expected.get(), 500);
        assert_eq!(cfg.grace, DEFAULT_RECEIVER_GRACE);
        assert!(!cfg.stop_on_end);
    }
}
