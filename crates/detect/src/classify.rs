//! Metric-based change classification
//!
//! Evaluates the configured metrics against a difference array and
//! produces a per-metric verdict. All thresholds compare strictly
//! greater-than: a statistic exactly at its threshold is "not changed".

use crate::config::MetricConfig;
use crate::diff::Difference;
use ndarray::Array2;
use std::fmt;

/// Per-metric verdict for one tile.
///
/// A field is `None` when the metric was not configured, `Some(fired)`
/// otherwise. The overall verdict is the OR over the evaluated metrics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeVerdict {
    pub mean: Option<bool>,
    pub maxima: Option<bool>,
    pub sum: Option<bool>,
    pub count_larger_than: Option<bool>,
    pub percentage_larger_than: Option<bool>,
}

impl ChangeVerdict {
    /// True if any evaluated metric exceeded its threshold
    pub fn changed(&self) -> bool {
        [
            self.mean,
            self.maxima,
            self.sum,
            self.count_larger_than,
            self.percentage_larger_than,
        ]
        .iter()
        .flatten()
        .any(|&fired| fired)
    }
}

impl fmt::Display for ChangeVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let evaluated = [
            ("mean", self.mean),
            ("maxima", self.maxima),
            ("sum", self.sum),
            ("count_larger_than", self.count_larger_than),
            ("percentage_larger_than", self.percentage_larger_than),
        ];
        write!(f, "{{")?;
        let mut first = true;
        for (name, verdict) in evaluated {
            if let Some(fired) = verdict {
                if !first {
                    write!(f, ", ")?;
                }
                write!(f, "{}: {}", name, fired)?;
                first = false;
            }
        }
        write!(f, "}}")
    }
}

/// Classify a difference array against the configured metrics.
///
/// Returns `None` for the no-match sentinel, so "unmatched" propagates
/// instead of being evaluated against nothing.
pub fn classify(diff: &Difference, metrics: &MetricConfig) -> Option<ChangeVerdict> {
    let pixels = match diff {
        Difference::NoMatch => return None,
        Difference::Pixels(pixels) => pixels,
    };

    let mut verdict = ChangeVerdict::default();

    if let Some(threshold) = metrics.mean {
        verdict.mean = Some(mean(pixels) > threshold);
    }
    if let Some(threshold) = metrics.maxima {
        verdict.maxima = Some(maxima(pixels) > threshold);
    }
    if let Some(threshold) = metrics.sum {
        verdict.sum = Some(pixels.sum() > threshold);
    }
    if let Some((value, count)) = metrics.count_larger_than {
        verdict.count_larger_than = Some(count_larger_than(pixels, value) > count);
    }
    if let Some((value, fraction)) = metrics.percentage_larger_than {
        let share = count_larger_than(pixels, value) as f64 / pixels.len() as f64;
        verdict.percentage_larger_than = Some(share > fraction);
    }

    Some(verdict)
}

fn mean(pixels: &Array2<f64>) -> f64 {
    pixels.mean().unwrap_or(0.0)
}

fn maxima(pixels: &Array2<f64>) -> f64 {
    pixels.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

fn count_larger_than(pixels: &Array2<f64>, value: f64) -> usize {
    pixels.iter().filter(|&&v| v > value).count()
}
