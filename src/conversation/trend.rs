use serde::{Deserialize, Serialize};

use crate::stats::{linear_slope, mean_or_zero};

/// Minimum number of points before any trend is computed.
pub const MIN_TREND_POINTS: usize = 3;

/// Direction of a series over a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    /// Score series rising.
    Improving,
    /// Score series falling.
    Declining,
    /// Quantity rising.
    Increasing,
    /// Quantity falling.
    Decreasing,
    /// No significant change.
    Stable,
    /// Fewer than `MIN_TREND_POINTS` points.
    InsufficientData,
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Trend::Improving => "improving",
            Trend::Declining => "declining",
            Trend::Increasing => "increasing",
            Trend::Decreasing => "decreasing",
            Trend::Stable => "stable",
            Trend::InsufficientData => "insufficient_data",
        };
        f.write_str(label)
    }
}

/// A trend with its confidence in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendReport {
    /// Direction.
    pub trend: Trend,
    /// Confidence in [0, 1].
    pub confidence: f64,
    /// Slope (regression) or start/end change (windowed), when computed.
    pub change: Option<f64>,
}

impl TrendReport {
    fn fixed(trend: Trend, confidence: f64) -> Self {
        Self {
            trend,
            confidence,
            change: None,
        }
    }

    /// The result for a series too short to judge.
    pub fn insufficient() -> Self {
        Self::fixed(Trend::InsufficientData, 0.0)
    }
}

/// Emotion series encoded as -1 / 0 / +1. Regression slope above 0.1 is
/// improving, below -0.1 declining. Short series are stable at 0.5 confidence.
pub fn emotion_trend(values: &[f64]) -> TrendReport {
    if values.len() < MIN_TREND_POINTS {
        return TrendReport::fixed(Trend::Stable, 0.5);
    }
    let slope = linear_slope(values).unwrap_or(0.0);
    let trend = if slope > 0.1 {
        Trend::Improving
    } else if slope < -0.1 {
        Trend::Declining
    } else {
        Trend::Stable
    };
    TrendReport {
        trend,
        confidence: (slope.abs() * 2.0).min(1.0),
        change: Some(slope),
    }
}

/// Presence series smoothed with a 3-point sliding window; the first and last
/// window averages are compared with a ±0.2 threshold.
pub fn binary_trend(values: &[bool]) -> TrendReport {
    if values.len() < MIN_TREND_POINTS {
        return TrendReport::insufficient();
    }
    let averages: Vec<f64> = values
        .windows(MIN_TREND_POINTS)
        .map(|w| w.iter().filter(|v| **v).count() as f64 / w.len() as f64)
        .collect();
    let (first, last) = match averages.as_slice() {
        [first, .., last] => (*first, *last),
        _ => return TrendReport::fixed(Trend::Stable, 0.0),
    };

    let diff = last - first;
    let trend = if diff > 0.2 {
        Trend::Increasing
    } else if diff < -0.2 {
        Trend::Decreasing
    } else {
        Trend::Stable
    };
    TrendReport {
        trend,
        confidence: (diff.abs() * 2.0).min(1.0),
        change: Some(diff),
    }
}

/// Regression slope relative to the series mean, ±0.1 threshold.
pub fn numeric_trend(values: &[f64]) -> TrendReport {
    if values.len() < MIN_TREND_POINTS {
        return TrendReport::insufficient();
    }
    let Some(slope) = linear_slope(values) else {
        return TrendReport::fixed(Trend::Stable, 0.0);
    };
    let average = mean_or_zero(values);
    let relative = if average == 0.0 { 0.0 } else { slope / average };

    let trend = if relative > 0.1 {
        Trend::Increasing
    } else if relative < -0.1 {
        Trend::Decreasing
    } else {
        Trend::Stable
    };
    TrendReport {
        trend,
        confidence: (relative.abs() * 5.0).min(1.0),
        change: Some(slope),
    }
}
