//! Colour bands for heatmap cells.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Shading band of a heatmap cell, lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorBand {
    Lowest,
    Low,
    Mid,
    High,
    Highest,
}

impl ColorBand {
    const ALL: [ColorBand; 5] = [
        ColorBand::Lowest,
        ColorBand::Low,
        ColorBand::Mid,
        ColorBand::High,
        ColorBand::Highest,
    ];

    /// Glyph used in text reports.
    pub fn glyph(&self) -> &'static str {
        match self {
            ColorBand::Lowest => "🟥",
            ColorBand::Low => "🟧",
            ColorBand::Mid => "🟨",
            ColorBand::High => "🟩",
            ColorBand::Highest => "🟦",
        }
    }
}

impl fmt::Display for ColorBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.glyph())
    }
}

/// Linear scale over the value range of a matrix, split into equal bands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorScale {
    min: f64,
    max: f64,
}

impl ColorScale {
    /// Scale spanning the finite values given, or `None` if there are none.
    pub fn from_values(values: impl IntoIterator<Item = f64>) -> Option<Self> {
        let mut range: Option<(f64, f64)> = None;
        for v in values.into_iter().filter(|v| v.is_finite()) {
            range = Some(match range {
                Some((lo, hi)) => (lo.min(v), hi.max(v)),
                None => (v, v),
            });
        }
        range.map(|(min, max)| Self { min, max })
    }

    /// Band breakpoints, excluding the range ends.
    pub fn breakpoints(&self) -> Vec<f64> {
        let step = (self.max - self.min) / ColorBand::ALL.len() as f64;
        (1..ColorBand::ALL.len())
            .map(|i| self.min + step * i as f64)
            .collect()
    }

    /// Band of a value. A degenerate range maps everything to the top band.
    pub fn band(&self, value: f64) -> ColorBand {
        let span = self.max - self.min;
        if span <= f64::EPSILON {
            return ColorBand::Highest;
        }
        let position = ((value - self.min) / span).clamp(0.0, 1.0);
        let last = ColorBand::ALL.len() - 1;
        let idx = ((position * ColorBand::ALL.len() as f64) as usize).min(last);
        ColorBand::ALL[idx]
    }
}
