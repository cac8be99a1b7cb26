/*!
    Rational number type for frame rates.
*/

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::Error;

/**
    A rational number represented as a numerator and denominator.

    Used for frame rates (e.g., 24000/1001 for 23.976 fps). Serialized as a
    `"num/den"` string; plain integers such as `"30"` are accepted as well.
*/
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rational {
    pub num: i32,
    pub den: i32,
}

impl Rational {
    /**
        Create a new rational number.

        # Panics

        Panics if `den` is zero.
    */
    #[inline]
    pub const fn new(num: i32, den: i32) -> Self {
        assert!(den != 0, "denominator cannot be zero");
        Self { num, den }
    }

    #[inline]
    pub fn to_f64(self) -> f64 {
        self.num as f64 / self.den as f64
    }

    /**
        Returns true if the value is strictly positive.
    */
    #[inline]
    pub const fn is_positive(self) -> bool {
        (self.num > 0 && self.den > 0) || (self.num < 0 && self.den < 0)
    }

    /**
        Duration of one frame at this rate, or None for non-positive rates.
    */
    pub fn frame_duration(self) -> Option<Duration> {
        if !self.is_positive() {
            return None;
        }
        Some(Duration::from_secs_f64(self.den as f64 / self.num as f64))
    }

    /**
        Whole frames per second, rounded to the nearest integer.
    */
    pub fn rounded(self) -> u32 {
        self.to_f64().round().max(0.0) as u32
    }
}

impl fmt::Debug for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

impl FromStr for Rational {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::invalid_data(format!("invalid rate {s:?}"));
        let (num, den) = match s.trim().split_once('/') {
            Some((num, den)) => (num.trim(), den.trim()),
            None => (s.trim(), "1"),
        };
        let num = num.parse::<i32>().map_err(|_| invalid())?;
        let den = den.parse::<i32>().map_err(|_| invalid())?;
        if den == 0 {
            return Err(invalid());
        }
        Ok(Self { num, den })
    }
}

impl TryFrom<String> for Rational {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Rational> for String {
    fn from(value: Rational) -> Self {
        value.to_string()
    }
}

impl From<(i32, i32)> for Rational {
    fn from((num, den): (i32, i32)) -> Self {
        Self::new(num, den)
    }
}

impl From<i32> for Rational {
    fn from(num: i32) -> Self {
        Self::new(num, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic(expected = "denominator cannot be zero")]
    fn zero_denominator_panics() {
        Rational::new(30, 0);
    }

    #[test]
    fn frame_duration() {
        assert_eq!(
            Rational::new(25, 1).frame_duration(),
            Some(Duration::from_millis(40))
        );
        assert_eq!(Rational::new(0, 1).frame_duration(), None);
        assert_eq!(Rational::new(-30, 1).frame_duration(), None);
    }

    #[test]
    fn ntsc_rounds_to_thirty() {
        let r = Rational::new(30000, 1001);
        assert_eq!(r.rounded(), 30);
        assert!((r.to_f64() - 29.97).abs() < 0.01);
    }

    #[test]
    fn parse_forms() {
        assert_eq!("30000/1001".parse::<Rational>().ok(), Some(Rational::new(30000, 1001)));
        assert_eq!(" 60 ".parse::<Rational>().ok(), Some(Rational::new(60, 1)));
        assert!("30/0".parse::<Rational>().is_err());
        assert!("fast".parse::<Rational>().is_err());
    }

    #[test]
    fn serde_uses_string_form() {
        let json = serde_json::to_string(&Rational::new(24000, 1001)).unwrap();
        assert_eq!(json, "\"24000/1001\"");
        let back: Rational = serde_json::from_str("\"15\"").unwrap();
        assert_eq!(back, Rational::new(15, 1));
    }
}
