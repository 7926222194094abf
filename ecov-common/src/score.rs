//! GreenScore classification
//!
//! Maps a 0-100 GreenScore onto one of four bands. The qualitative label and
//! the colour bucket share the same breakpoints (80 / 60 / 40, lower bound
//! inclusive), so both are derived from [`ScoreBand`].
//!
//! Scores coming from the audit service or from persisted records are not
//! trusted: every consumer goes through [`clamp`] first.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lower bound (inclusive) of the Excellent band
pub const EXCELLENT_MIN: f64 = 80.0;
/// Lower bound (inclusive) of the Good band
pub const GOOD_MIN: f64 = 60.0;
/// Lower bound (inclusive) of the Fair band
pub const FAIR_MIN: f64 = 40.0;

/// Qualitative score band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreBand {
    Excellent,
    Good,
    Fair,
    Poor,
}

/// Display colour bucket for a score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorBucket {
    Green,
    Yellow,
    Orange,
    Red,
}

impl ScoreBand {
    /// All bands, best first
    pub const ALL: [ScoreBand; 4] = [
        ScoreBand::Excellent,
        ScoreBand::Good,
        ScoreBand::Fair,
        ScoreBand::Poor,
    ];

    /// Human-readable label ("Excellent", "Good", "Fair", "Poor")
    pub fn label(self) -> &'static str {
        match self {
            ScoreBand::Excellent => "Excellent",
            ScoreBand::Good => "Good",
            ScoreBand::Fair => "Fair",
            ScoreBand::Poor => "Poor",
        }
    }

    pub fn color(self) -> ColorBucket {
        match self {
            ScoreBand::Excellent => ColorBucket::Green,
            ScoreBand::Good => ColorBucket::Yellow,
            ScoreBand::Fair => ColorBucket::Orange,
            ScoreBand::Poor => ColorBucket::Red,
        }
    }
}

impl fmt::Display for ScoreBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl fmt::Display for ColorBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColorBucket::Green => "green",
            ColorBucket::Yellow => "yellow",
            ColorBucket::Orange => "orange",
            ColorBucket::Red => "red",
        };
        f.write_str(name)
    }
}

/// Coerce a score into [0, 100]; NaN and infinities become 0
pub fn clamp(score: f64) -> f64 {
    if !score.is_finite() {
        return 0.0;
    }
    score.clamp(0.0, 100.0)
}

/// Same as [`clamp`] for a possibly missing score
pub fn clamp_opt(score: Option<f64>) -> f64 {
    score.map(clamp).unwrap_or(0.0)
}

/// Classify a (raw) score into its band
pub fn classify(score: f64) -> ScoreBand {
    let score = clamp(score);
    if score >= EXCELLENT_MIN {
        ScoreBand::Excellent
    } else if score >= GOOD_MIN {
        ScoreBand::Good
    } else if score >= FAIR_MIN {
        ScoreBand::Fair
    } else {
        ScoreBand::Poor
    }
}

/// Qualitative label for a score
pub fn label(score: f64) -> ScoreBand {
    classify(score)
}

/// Colour bucket for a score
pub fn color_bucket(score: f64) -> ColorBucket {
    classify(score).color()
}
