//! Media time representation.
//!
//! All timestamps and durations in mediabuf are signed microsecond counts.
//! An absent timestamp is modelled as `Option<MediaTime>` rather than a
//! sentinel value.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

/// Microseconds per millisecond.
pub const MICROS_PER_MILLI: i64 = 1_000;
/// Microseconds per second.
pub const MICROS_PER_SECOND: i64 = 1_000_000;

/// A point on, or a distance along, the media timeline in microseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaTime(i64);

impl MediaTime {
    /// Time zero.
    pub const ZERO: MediaTime = MediaTime(0);

    /// Largest representable time.
    pub const MAX: MediaTime = MediaTime(i64::MAX);

    /// Create a time from microseconds.
    #[inline]
    pub const fn from_micros(micros: i64) -> Self {
        Self(micros)
    }

    /// Create a time from milliseconds.
    #[inline]
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis * MICROS_PER_MILLI)
    }

    /// Create a time from milliseconds, or `None` if it does not fit.
    #[inline]
    pub const fn checked_from_millis(millis: i64) -> Option<Self> {
        match millis.checked_mul(MICROS_PER_MILLI) {
            Some(micros) => Some(Self(micros)),
            None => None,
        }
    }

    /// Create a time from fractional seconds, truncating below one microsecond.
    #[inline]
    pub fn from_secs_f64(seconds: f64) -> Self {
        Self((seconds * MICROS_PER_SECOND as f64) as i64)
    }

    /// Microsecond count.
    #[inline]
    pub const fn as_micros(self) -> i64 {
        self.0
    }

    /// Millisecond count, truncated toward zero.
    #[inline]
    pub const fn as_millis(self) -> i64 {
        self.0 / MICROS_PER_MILLI
    }

    /// Fractional seconds.
    #[inline]
    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / MICROS_PER_SECOND as f64
    }

    /// True if this time lies before zero.
    #[inline]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Saturating addition.
    #[inline]
    pub const fn saturating_add(self, rhs: MediaTime) -> MediaTime {
        MediaTime(self.0.saturating_add(rhs.0))
    }

    /// Saturating subtraction.
    #[inline]
    pub const fn saturating_sub(self, rhs: MediaTime) -> MediaTime {
        MediaTime(self.0.saturating_sub(rhs.0))
    }
}

impl Add for MediaTime {
    type Output = MediaTime;

    fn add(self, rhs: MediaTime) -> MediaTime {
        MediaTime(self.0 + rhs.0)
    }
}

impl AddAssign for MediaTime {
    fn add_assign(&mut self, rhs: MediaTime) {
        self.0 += rhs.0;
    }
}

impl Sub for MediaTime {
    type Output = MediaTime;

    fn sub(self, rhs: MediaTime) -> MediaTime {
        MediaTime(self.0 - rhs.0)
    }
}

impl SubAssign for MediaTime {
    fn sub_assign(&mut self, rhs: MediaTime) {
        self.0 -= rhs.0;
    }
}

impl Mul<i64> for MediaTime {
    type Output = MediaTime;

    fn mul(self, rhs: i64) -> MediaTime {
        MediaTime(self.0 * rhs)
    }
}

impl Neg for MediaTime {
    type Output = MediaTime;

    fn neg(self) -> MediaTime {
        MediaTime(-self.0)
    }
}

/// Formats as seconds with millisecond precision, e.g. `1.250s`.
impl fmt::Display for MediaTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let secs = abs / MICROS_PER_SECOND as u64;
        let millis = (abs % MICROS_PER_SECOND as u64) / MICROS_PER_MILLI as u64;
        write!(f, "{}{}.{:03}s", sign, secs, millis)
    }
}
