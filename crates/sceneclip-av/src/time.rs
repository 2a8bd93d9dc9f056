//! Time bases, timestamp rescaling and cross-stream comparison.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The unit fraction a stream's timestamps are expressed in.
///
/// Common time bases:
/// - 1/1000000 for wall-clock microseconds
/// - 1/48000 for 48kHz audio
/// - 1/1000 for milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeBase {
    pub num: i32,
    pub den: i32,
}

impl TimeBase {
    /// Microsecond time base, the unit of wall-clock positions.
    pub const MICROSECONDS: Self = Self {
        num: 1,
        den: 1_000_000,
    };

    /// Millisecond time base (1/1000).
    pub const MILLISECONDS: Self = Self { num: 1, den: 1000 };

    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /// One tick per sample at `rate` Hz.
    pub const fn per_sample(rate: u32) -> Self {
        Self {
            num: 1,
            den: rate as i32,
        }
    }

    /// A usable time base has both terms positive.
    pub fn is_valid(&self) -> bool {
        self.num > 0 && self.den > 0
    }

    pub fn to_seconds(&self, value: i64) -> f64 {
        value as f64 * self.num as f64 / self.den as f64
    }

    /// Express a wall-clock position in this time base.
    pub fn from_seconds(&self, seconds: f64) -> i64 {
        let micros = (seconds * TimeBase::MICROSECONDS.den as f64) as i64;
        rescale(micros, TimeBase::MICROSECONDS, *self)
    }
}

impl fmt::Display for TimeBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// Convert `value` from one time base to another.
///
/// Rounds to the nearest tick, halfway cases away from zero.
pub fn rescale(value: i64, from: TimeBase, to: TimeBase) -> i64 {
    let num = value as i128 * from.num as i128 * to.den as i128;
    let den = from.den as i128 * to.num as i128;
    if den == 0 {
        return 0;
    }
    let (num, den) = if den < 0 { (-num, -den) } else { (num, den) };
    let half = den / 2;
    let rounded = if num >= 0 {
        (num + half) / den
    } else {
        (num - half) / den
    };
    rounded.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

/// Compare two timestamps living in different time bases without rounding.
pub fn compare_ts(a: i64, a_base: TimeBase, b: i64, b_base: TimeBase) -> Ordering {
    let lhs = a as i128 * a_base.num as i128 * b_base.den as i128;
    let rhs = b as i128 * b_base.num as i128 * a_base.den as i128;
    lhs.cmp(&rhs)
}

/// Anything carrying presentation (and optionally decode) timestamps.
pub trait Timestamped {
    fn pts(&self) -> Option<i64>;

    fn set_pts(&mut self, pts: Option<i64>);

    fn dts(&self) -> Option<i64> {
        None
    }

    fn set_dts(&mut self, _dts: Option<i64>) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rescale_between_common_bases() {
        assert_eq!(
            rescale(2_000_000, TimeBase::MICROSECONDS, TimeBase::per_sample(48000)),
            96_000
        );
        assert_eq!(
            rescale(1024, TimeBase::per_sample(48000), TimeBase::MILLISECONDS),
            21
        );
        // 1001/24000 per frame: 1000ms is 23.976 frames
        assert_eq!(
            rescale(1000, TimeBase::MILLISECONDS, TimeBase::new(1001, 24000)),
            24
        );
    }

    #[test]
    fn test_rescale_rounds_half_away_from_zero() {
        assert_eq!(rescale(5, TimeBase::new(1, 10), TimeBase::new(1, 1)), 1);
        assert_eq!(rescale(-5, TimeBase::new(1, 10), TimeBase::new(1, 1)), -1);
        assert_eq!(rescale(4, TimeBase::new(1, 10), TimeBase::new(1, 1)), 0);
    }

    #[test]
    fn test_compare_across_bases() {
        let ms = TimeBase::MILLISECONDS;
        let audio = TimeBase::per_sample(48000);
        assert_eq!(compare_ts(1000, ms, 48000, audio), Ordering::Equal);
        assert_eq!(compare_ts(999, ms, 48000, audio), Ordering::Less);
        assert_eq!(compare_ts(1, ms, 47, audio), Ordering::Greater);
    }

    #[test]
    fn test_from_seconds() {
        assert_eq!(TimeBase::per_sample(48000).from_seconds(5.0), 240_000);
        assert_eq!(TimeBase::new(1, 90000).from_seconds(2.5), 225_000);
        assert_eq!(TimeBase::MILLISECONDS.to_seconds(1500), 1.5);
    }
}
