//! Utilities for messing with time
//!
//! Types included allow messing with and mocking out clocks and other
//! side-effect-laden time operations. Times are tracked with microsecond
//! precision so that expiration boundaries can be tested exactly.

#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    missing_copy_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unused_must_use
)]
#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

use std::time::{Duration, SystemTime};

#[cfg(feature = "serde")]
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

const MICROS_PER_SEC: u64 = 1_000_000;

/// Unix time
///
/// Unix time as represented by the number of microseconds elapsed since the
/// beginning of the Unix epoch on 1970/01/01 at 00:00:00 UTC.
///
/// When the `serde` feature is enabled, a time is (de)serialized as a
/// number of seconds. Whole seconds are written as integers and fractional
/// seconds as floats, so values written by stores that track expiry as
/// floating point seconds can be read back directly.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Ord, PartialOrd)]
#[repr(transparent)]
pub struct UnixTime(u64);

impl UnixTime {
    /// The beginning of the Unix epoch
    pub const EPOCH: Self = Self(0);

    /// Constructs a time from whole seconds since the epoch
    #[inline]
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs.saturating_mul(MICROS_PER_SEC))
    }

    /// Constructs a time from microseconds since the epoch
    #[inline]
    pub const fn from_micros(micros: u64) -> Self {
        Self(micros)
    }

    /// Whole seconds since the epoch, truncating any fractional part
    #[inline]
    pub const fn as_secs(self) -> u64 {
        self.0 / MICROS_PER_SEC
    }

    /// Microseconds since the epoch
    #[inline]
    pub const fn as_micros(self) -> u64 {
        self.0
    }

    /// Adds a duration, saturating at the maximum representable time
    #[inline]
    pub fn saturating_add(self, duration: Duration) -> Self {
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        Self(self.0.saturating_add(micros))
    }

    /// Subtracts a duration, saturating at the epoch
    #[inline]
    pub fn saturating_sub(self, duration: Duration) -> Self {
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        Self(self.0.saturating_sub(micros))
    }
}

impl From<SystemTime> for UnixTime {
    /// Times before the Unix epoch are clamped to the epoch
    #[inline]
    fn from(t: SystemTime) -> Self {
        let elapsed = t
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default();

        Self::EPOCH.saturating_add(elapsed)
    }
}

#[cfg(any(feature = "serde", doc))]
#[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
impl Serialize for UnixTime {
    #[inline]
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.0 % MICROS_PER_SEC == 0 {
            self.as_secs().serialize(serializer)
        } else {
            (self.0 as f64 / MICROS_PER_SEC as f64).serialize(serializer)
        }
    }
}

#[cfg(any(feature = "serde", doc))]
#[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
impl<'de> Deserialize<'de> for UnixTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        if !secs.is_finite() || secs < 0.0 {
            return Err(de::Error::custom(format_args!(
                "expected a non-negative number of seconds, got {secs}"
            )));
        }

        Ok(Self((secs * MICROS_PER_SEC as f64).round() as u64))
    }
}

/// Represents a clock, which can tell the current time
pub trait Clock {
    /// Gets the current time according to this clock
    fn now(&self) -> UnixTime;
}

impl<T> Clock for &'_ T
where
    T: Clock + ?Sized,
{
    #[inline]
    fn now(&self) -> UnixTime {
        T::now(self)
    }
}

impl<T> Clock for std::sync::Arc<T>
where
    T: Clock + ?Sized,
{
    #[inline]
    fn now(&self) -> UnixTime {
        T::now(self)
    }
}

/// The system clock as provided by `std::time::SystemTime`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct System;

impl Clock for System {
    #[inline]
    fn now(&self) -> UnixTime {
        UnixTime::from(SystemTime::now())
    }
}

/// A test clock which maintains the current time as internal state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TestClock(UnixTime);

impl Clock for TestClock {
    #[inline]
    fn now(&self) -> UnixTime {
        self.0
    }
}

impl TestClock {
    /// Creates a new test clock with the specified time
    #[inline]
    pub const fn new(time: UnixTime) -> Self {
        Self(time)
    }

    /// Updates the clock's current time to `val`
    pub fn set(&mut self, val: UnixTime) {
        self.0 = val;
    }

    /// Increments the clock's current time by `inc` seconds
    pub fn inc(&mut self, inc: u64) {
        self.0 = self.0.saturating_add(Duration::from_secs(inc));
    }

    /// Increments the clock's current time by `inc` microseconds
    pub fn inc_micros(&mut self, inc: u64) {
        self.0 = self.0.saturating_add(Duration::from_micros(inc));
    }
}
