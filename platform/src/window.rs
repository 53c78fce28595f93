use platform_traits::{ErrorSample, Vector3};
use std::collections::VecDeque;
use tracing::warn;

pub const DEFAULT_WINDOW_WIDTH: f64 = 4.0;

/// Margin added on each side of the auto-range, as a fraction of the span.
const RANGE_MARGIN: f32 = 0.1;

/// Time-bounded history of difference samples for live plotting.
///
/// Samples are kept in non-decreasing `t` order and every retained sample
/// satisfies `now - t <= width`.
#[derive(Debug, Clone)]
pub struct ErrorSampleWindow {
    samples: VecDeque<ErrorSample>,
    width: f64,
    now: f64,
}

impl ErrorSampleWindow {
    pub fn new(width: f64) -> Self {
        ErrorSampleWindow {
            samples: VecDeque::new(),
            width,
            now: 0.0,
        }
    }

    /// Appends `sample` and prunes relative to its timestamp.
    pub fn push(&mut self, sample: ErrorSample) {
        if let Some(last) = self.samples.back() {
            if sample.t < last.t {
                warn!(t = sample.t, last = last.t, "dropping out-of-order error sample");
                return;
            }
        }
        self.samples.push_back(sample);
        self.prune(sample.t);
    }

    /// Drops samples older than the window, as seen from `now`.
    pub fn prune(&mut self, now: f64) {
        self.now = self.now.max(now);
        while let Some(front) = self.samples.front() {
            if self.now - front.t > self.width {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    /// Horizontal axis bounds: `(max(0, now - width), now)`.
    pub fn range(&self) -> (f64, f64) {
        ((self.now - self.width).max(0.0), self.now)
    }

    /// Vertical bounds covering every retained acceleration difference.
    pub fn accel_range(&self) -> Option<(f32, f32)> {
        auto_range(self.samples.iter().map(|s| s.d_accel))
    }

    /// Vertical bounds covering every retained angular rate difference.
    pub fn gyro_range(&self) -> Option<(f32, f32)> {
        auto_range(self.samples.iter().map(|s| s.d_gyro))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ErrorSample> {
        self.samples.iter()
    }

    pub fn latest(&self) -> Option<&ErrorSample> {
        self.samples.back()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.now = 0.0;
    }
}

impl Default for ErrorSampleWindow {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_WIDTH)
    }
}

fn auto_range(values: impl Iterator<Item = Vector3>) -> Option<(f32, f32)> {
    let (min, max) = values
        .flat_map(Vector3::to_array)
        .fold(None, |acc: Option<(f32, f32)>, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })?;

    if min == max {
        // flat line
        Some((min - 1.0, max + 1.0))
    } else {
        let margin = (max - min) * RANGE_MARGIN;
        Some((min - margin, max + margin))
    }
}
