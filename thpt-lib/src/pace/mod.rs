//! Pace plans: the ordered rate/duration phases of a benchmark run.
//!
//! A plan is described as a comma separated list of phases,
//! each phase being `rate` or `rate:durationSeconds`:
//!
//! ```text
//! 100,200:4,100:1,500:60
//! ```
//!
//! A phase without duration runs for [`DEFAULT_PHASE_DURATION`].

use std::{fmt, num::NonZeroU32, str::FromStr, time::Duration};

#[cfg(test)]
mod tests;

/// Duration used for a phase which does not define one.
pub const DEFAULT_PHASE_DURATION: Duration = Duration::from_secs(10);

/// One phase of a [`PacePlan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaceSpec {
    rate: NonZeroU32,
    duration: Duration,
}

impl PaceSpec {
    /// Create a new phase running at `rate` requests per second for `duration`.
    pub const fn new(rate: NonZeroU32, duration: Duration) -> Self {
        Self { rate, duration }
    }

    /// Target requests per second.
    #[inline(always)]
    pub fn rate(&self) -> NonZeroU32 {
        self.rate
    }

    /// Wall-clock length of the phase.
    #[inline(always)]
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Amount of requests this phase attempts when fully on pace.
    pub fn expected_requests(&self) -> u64 {
        (self.rate.get() as f64 * self.duration.as_secs_f64()).ceil() as u64
    }
}

impl fmt::Display for PaceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} rps for {}",
            self.rate,
            humantime::format_duration(self.duration)
        )
    }
}

/// Ordered, non-empty sequence of [`PaceSpec`] phases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacePlan {
    phases: Vec<PaceSpec>,
}

impl PacePlan {
    /// Create a plan from already validated phases,
    /// returning `None` if no phases are given.
    pub fn try_from_phases(phases: Vec<PaceSpec>) -> Option<Self> {
        (!phases.is_empty()).then_some(Self { phases })
    }

    pub fn phases(&self) -> &[PaceSpec] {
        &self.phases
    }

    pub fn iter(&self) -> impl Iterator<Item = &PaceSpec> {
        self.phases.iter()
    }

    pub fn len(&self) -> usize {
        self.phases.len()
    }

    /// Always `false`, a plan has at least one phase.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Sum of all phase durations, pauses between phases excluded.
    pub fn total_duration(&self) -> Duration {
        self.phases.iter().map(PaceSpec::duration).sum()
    }

    /// Largest amount of requests a single phase attempts.
    ///
    /// Used to size transport queues so that a phase never blocks on them.
    pub fn max_phase_requests(&self) -> u64 {
        self.phases
            .iter()
            .map(PaceSpec::expected_requests)
            .max()
            .unwrap_or_default()
    }
}

impl<'a> IntoIterator for &'a PacePlan {
    type Item = &'a PaceSpec;
    type IntoIter = std::slice::Iter<'a, PaceSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.phases.iter()
    }
}

impl fmt::Display for PacePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, phase) in self.phases.iter().enumerate() {
            if index > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}:{}", phase.rate, phase.duration.as_secs())?;
        }
        Ok(())
    }
}

impl FromStr for PacePlan {
    type Err = PaceFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s)
    }
}

/// Parse a pace descriptor into a [`PacePlan`].
///
/// Parsing is strict: empty descriptors, empty tokens,
/// zero rates or durations and empty duration fields are all rejected.
pub fn parse(descriptor: &str) -> Result<PacePlan, PaceFormatError> {
    let descriptor = descriptor.trim();
    if descriptor.is_empty() {
        return Err(PaceFormatError::new(
            descriptor,
            PaceFormatErrorKind::EmptyDescriptor,
        ));
    }

    let phases = descriptor
        .split(',')
        .map(parse_token)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(PacePlan { phases })
}

fn parse_token(raw_token: &str) -> Result<PaceSpec, PaceFormatError> {
    let token = raw_token.trim();
    if token.is_empty() {
        return Err(PaceFormatError::new(token, PaceFormatErrorKind::EmptyToken));
    }

    let mut fields = token.split(':');
    let rate_field = fields.next().unwrap_or_default();
    let duration_field = fields.next();
    if fields.next().is_some() {
        return Err(PaceFormatError::new(
            token,
            PaceFormatErrorKind::TooManyFields,
        ));
    }

    let rate = parse_digits::<u32>(rate_field).map_err(|overflow| {
        let kind = if overflow {
            PaceFormatErrorKind::RateOutOfRange
        } else {
            PaceFormatErrorKind::InvalidRate
        };
        PaceFormatError::new(token, kind)
    })?;
    let rate = NonZeroU32::new(rate)
        .ok_or_else(|| PaceFormatError::new(token, PaceFormatErrorKind::ZeroRate))?;

    let duration = match duration_field {
        None => DEFAULT_PHASE_DURATION,
        Some(field) => {
            let secs = parse_digits::<u64>(field).map_err(|overflow| {
                let kind = if overflow {
                    PaceFormatErrorKind::DurationOutOfRange
                } else {
                    PaceFormatErrorKind::InvalidDuration
                };
                PaceFormatError::new(token, kind)
            })?;
            if secs == 0 {
                return Err(PaceFormatError::new(
                    token,
                    PaceFormatErrorKind::ZeroDuration,
                ));
            }
            Duration::from_secs(secs)
        }
    };

    Ok(PaceSpec::new(rate, duration))
}

/// Parse a field of plain ascii digits (no sign).
///
/// Errors with `true` if the digits overflow `N`.
fn parse_digits<N: FromStr>(field: &str) -> Result<N, bool> {
    let field = field.trim();
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return Err(false);
    }
    field.parse().map_err(|_| true)
}

/// Malformed pace descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaceFormatError {
    token: String,
    kind: PaceFormatErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaceFormatErrorKind {
    EmptyDescriptor,
    EmptyToken,
    TooManyFields,
    InvalidRate,
    RateOutOfRange,
    ZeroRate,
    InvalidDuration,
    DurationOutOfRange,
    ZeroDuration,
}

impl PaceFormatError {
    fn new(token: &str, kind: PaceFormatErrorKind) -> Self {
        Self {
            token: token.to_owned(),
            kind,
        }
    }

    /// The offending token (empty for an empty descriptor or token).
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn kind(&self) -> PaceFormatErrorKind {
        self.kind
    }
}

impl fmt::Display for PaceFormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self.kind {
            PaceFormatErrorKind::EmptyDescriptor => {
                return write!(f, "PaceFormatError: empty pace descriptor");
            }
            PaceFormatErrorKind::EmptyToken => {
                return write!(f, "PaceFormatError: empty phase token");
            }
            PaceFormatErrorKind::TooManyFields => "expected 'rate' or 'rate:durationSeconds'",
            PaceFormatErrorKind::InvalidRate => "rate is not a non-negative integer",
            PaceFormatErrorKind::RateOutOfRange => "rate is too large",
            PaceFormatErrorKind::ZeroRate => "rate has to be greater than zero (0)",
            PaceFormatErrorKind::InvalidDuration => "duration is not a non-negative integer",
            PaceFormatErrorKind::DurationOutOfRange => "duration is too large",
            PaceFormatErrorKind::ZeroDuration => "duration has to be greater than zero (0)",
        };
        write!(f, "PaceFormatError: token '{}': {reason}", self.token)
    }
}

impl std::error::Error for PaceFormatError {}
