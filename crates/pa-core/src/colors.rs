//! # Coat Colours
//!
//! The colour tag a classifier derives from an ad photo, and the closeness test
//! used to find ads with a similar-looking animal.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::AppError;

/// An RGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Accepts `"r g b"` in decimal or six hex digits with an optional leading `#`.
impl FromStr for Color {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || AppError::ValidationError(format!("invalid colour {s:?}"));

        let parts: Vec<&str> = s.split_whitespace().collect();
        if parts.len() == 3 {
            let channel = |raw: &str| raw.parse::<u8>().map_err(|_| invalid());
            return Ok(Self::new(channel(parts[0])?, channel(parts[1])?, channel(parts[2])?));
        }

        let hex = s.strip_prefix('#').unwrap_or(s);
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(invalid());
        }
        let channel = |at: usize| u8::from_str_radix(&hex[at..at + 2], 16).map_err(|_| invalid());
        Ok(Self::new(channel(0)?, channel(2)?, channel(4)?))
    }
}

/// How far apart two colours may be and still count as the same coat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ColorThresholds {
    /// Largest allowed difference on any single channel
    pub max_part_distance: u32,
    /// Largest allowed sum of the three channel differences
    pub max_sum_distance: u32,
}

impl Default for ColorThresholds {
    fn default() -> Self {
        Self {
            max_part_distance: 40,
            max_sum_distance: 90,
        }
    }
}

/// Manhattan distance between `a` and `b`, or `None` when either threshold is exceeded.
pub fn distance(a: Color, b: Color, limits: &ColorThresholds) -> Option<u32> {
    let parts = [a.r.abs_diff(b.r), a.g.abs_diff(b.g), a.b.abs_diff(b.b)].map(u32::from);
    let sum: u32 = parts.iter().sum();

    let near = parts.iter().all(|&part| part <= limits.max_part_distance) && sum <= limits.max_sum_distance;
    near.then_some(sum)
}
