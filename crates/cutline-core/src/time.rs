use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

use serde::{Deserialize, Serialize};

/// Rational frame rate, `num / den` frames per second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameRate {
    pub num: u32,
    pub den: u32,
}

impl FrameRate {
    pub const FPS_24: FrameRate = FrameRate::new(24, 1);
    pub const FPS_25: FrameRate = FrameRate::new(25, 1);
    pub const FPS_30: FrameRate = FrameRate::new(30, 1);
    pub const NTSC: FrameRate = FrameRate::new(30_000, 1001);

    pub const fn new(num: u32, den: u32) -> FrameRate {
        FrameRate { num, den }
    }

    pub fn is_valid(self) -> bool {
        self.num > 0 && self.den > 0
    }

    pub fn fps_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }
}

impl Default for FrameRate {
    fn default() -> FrameRate {
        FrameRate::FPS_25
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.den == 1 {
            write!(f, "{}fps", self.num)
        } else {
            write!(f, "{}/{}fps", self.num, self.den)
        }
    }
}

/// A position or length on a timeline, counted in whole frames.
///
/// The frame rate is not stored: it is fixed by the timeline that owns the
/// value. Arithmetic is plain integer arithmetic, so repeated edits never
/// drift. Conversion to seconds only happens for display.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct FrameTime {
    frames: i64,
}

impl FrameTime {
    pub const ZERO: FrameTime = FrameTime::from_frames(0);
    pub const MIN: FrameTime = FrameTime::from_frames(i64::MIN);
    pub const MAX: FrameTime = FrameTime::from_frames(i64::MAX);

    pub const fn from_frames(frames: i64) -> FrameTime {
        FrameTime { frames }
    }

    /// Rounds to the nearest frame at `rate`.
    pub fn from_secs(secs: f64, rate: FrameRate) -> FrameTime {
        FrameTime::from_frames((secs * rate.fps_f64()).round() as i64)
    }

    pub const fn frames(self) -> i64 {
        self.frames
    }

    pub fn as_secs_f64(self, rate: FrameRate) -> f64 {
        (self.frames as f64) / rate.fps_f64()
    }

    /// Converts a frame count expressed at `from` into the nearest frame at `to`.
    pub fn rescale(self, from: FrameRate, to: FrameRate) -> FrameTime {
        if from == to {
            return self;
        }

        let num = i128::from(self.frames) * i128::from(to.num) * i128::from(from.den);
        let den = i128::from(from.num) * i128::from(to.den);
        let half = den / 2;
        let rounded = if num >= 0 {
            (num + half) / den
        } else {
            (num - half) / den
        };

        FrameTime::from_frames(rounded as i64)
    }

    pub fn abs_diff(self, other: FrameTime) -> u64 {
        self.frames.abs_diff(other.frames)
    }

    pub fn saturating_add(self, rhs: FrameTime) -> FrameTime {
        FrameTime::from_frames(self.frames.saturating_add(rhs.frames))
    }
}

impl fmt::Display for FrameTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}f", self.frames)
    }
}

impl From<i64> for FrameTime {
    fn from(frames: i64) -> FrameTime {
        FrameTime::from_frames(frames)
    }
}

impl Add<FrameTime> for FrameTime {
    type Output = FrameTime;

    fn add(self, rhs: FrameTime) -> FrameTime {
        FrameTime {
            frames: self.frames + rhs.frames,
        }
    }
}

impl Add<i64> for FrameTime {
    type Output = FrameTime;

    fn add(self, rhs: i64) -> FrameTime {
        FrameTime {
            frames: self.frames + rhs,
        }
    }
}

impl Sub<FrameTime> for FrameTime {
    type Output = FrameTime;

    fn sub(self, rhs: FrameTime) -> FrameTime {
        FrameTime {
            frames: self.frames - rhs.frames,
        }
    }
}

impl Sub<i64> for FrameTime {
    type Output = FrameTime;

    fn sub(self, rhs: i64) -> FrameTime {
        FrameTime {
            frames: self.frames - rhs,
        }
    }
}

impl AddAssign<FrameTime> for FrameTime {
    fn add_assign(&mut self, rhs: FrameTime) {
        self.frames += rhs.frames;
    }
}

impl SubAssign<FrameTime> for FrameTime {
    fn sub_assign(&mut self, rhs: FrameTime) {
        self.frames -= rhs.frames;
    }
}

impl Neg for FrameTime {
    type Output = FrameTime;

    fn neg(self) -> FrameTime {
        FrameTime {
            frames: -self.frames,
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    #[test]
    fn test_conversion() {
        let rate = FrameRate::FPS_25;

        assert_eq!(FrameTime::from_secs(1.0, rate), FrameTime::from_frames(25));
        assert_eq!(FrameTime::from_frames(50).as_secs_f64(rate), 2.0);
        assert_eq!(
            FrameTime::from_secs(1.0, FrameRate::NTSC),
            FrameTime::from_frames(30)
        );
    }

    #[test]
    fn test_rescale() {
        let t = FrameTime::from_frames(50);
        assert_eq!(
            t.rescale(FrameRate::FPS_25, FrameRate::FPS_30),
            FrameTime::from_frames(60)
        );
        assert_eq!(
            FrameTime::from_frames(-50).rescale(FrameRate::FPS_25, FrameRate::FPS_30),
            FrameTime::from_frames(-60)
        );
        assert_eq!(t.rescale(FrameRate::FPS_25, FrameRate::FPS_25), t);
    }

    #[test]
    fn test_values_from_different_rates_compare_by_frames() {
        let a = FrameTime::from_secs(2.0, FrameRate::FPS_25);
        let b = FrameTime::from_frames(60).rescale(FrameRate::FPS_30, FrameRate::FPS_25);
        assert_eq!(a, b);
    }

    #[test]
    fn test_random_arithmetic() {
        let mut rng = SmallRng::seed_from_u64(0);

        for _ in 0..1000 {
            let a = FrameTime::from_frames(rng.gen_range(-1_000_000..1_000_000));
            let b = FrameTime::from_frames(rng.gen_range(-1_000_000..1_000_000));
            let c = rng.gen_range(-1000..1000);

            assert_eq!(a + b, b + a);
            assert_eq!((a + b) - b, a);
            assert_eq!((a + c) - c, a);
            assert_eq!(a + (b + FrameTime::from(c)), (a + b) + c);
            assert_eq!(-(-a), a);
        }
    }
}
