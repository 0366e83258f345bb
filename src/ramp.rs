//! Fade planning
//!
//! A fade is approximated by a run of discrete messages: one per step from
//! the start value to the end value, spread evenly over the fade time.
//! Integer fades always step by one; float fades step by `10^-granularity`
//! and round each value to `granularity` decimals.

use crate::scheduler::ScheduledEmission;
use crate::value::OscArg;
use log::warn;
use std::time::Duration;

/// Largest supported float granularity (decimal digits)
pub const MAX_GRANULARITY: u32 = 4;

/// Tolerance when counting float steps, so `1.0 / 0.01` is 100 steps, not 101
const STEP_EPSILON: f64 = 1e-9;

/// Value type and bounds of a fade
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RampKind {
    Integer { start: i64, end: i64 },
    Float { start: f64, end: f64, digits: u32 },
}

/// Pre-computed fade: which values to send and when
#[derive(Debug, Clone, PartialEq)]
pub struct RampPlan {
    kind: RampKind,
    step_count: u64,
    step_delay_ms: f64,
}

/// Plan an integer fade from `start` to `end` over `duration_ms`
///
/// Emits every integer in between, inclusive. `start == end` plans a single
/// immediate message.
pub fn plan_integer_ramp(start: i64, end: i64, duration_ms: i64) -> RampPlan {
    let step_count = start.abs_diff(end);
    RampPlan {
        kind: RampKind::Integer { start, end },
        step_count,
        step_delay_ms: step_delay(duration_ms, step_count),
    }
}

/// Plan a float fade from `start` to `end` over `duration_ms`
///
/// `granularity` is clamped to `0..=MAX_GRANULARITY`.
pub fn plan_float_ramp(start: f64, end: f64, duration_ms: i64, granularity: u32) -> RampPlan {
    let digits = if granularity > MAX_GRANULARITY {
        warn!(
            "Granularity {} out of range, using {}",
            granularity, MAX_GRANULARITY
        );
        MAX_GRANULARITY
    } else {
        granularity
    };

    let scaled = (end - start).abs() * scale(digits);
    let nearest = scaled.round();
    let step_count = if (scaled - nearest).abs() < STEP_EPSILON {
        nearest as u64
    } else {
        scaled.ceil() as u64
    };

    RampPlan {
        kind: RampKind::Float { start, end, digits },
        step_count,
        step_delay_ms: step_delay(duration_ms, step_count),
    }
}

fn scale(digits: u32) -> f64 {
    10f64.powi(digits as i32)
}

fn step_delay(duration_ms: i64, step_count: u64) -> f64 {
    if step_count == 0 {
        0.0
    } else {
        duration_ms as f64 / step_count as f64
    }
}

/// Round half away from zero to `digits` decimals
pub fn round_to(value: f64, digits: u32) -> f64 {
    let scale = scale(digits);
    (value * scale).round() / scale
}

impl RampPlan {
    pub fn kind(&self) -> RampKind {
        self.kind
    }

    /// Number of steps between start and end; emissions are one more
    /// (none beyond the first when start equals end)
    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    /// Value distance between consecutive emissions
    pub fn step_size(&self) -> f64 {
        match self.kind {
            RampKind::Integer { .. } => 1.0,
            RampKind::Float { digits, .. } => 1.0 / scale(digits),
        }
    }

    /// Milliseconds between consecutive emissions
    pub fn step_delay_ms(&self) -> f64 {
        self.step_delay_ms
    }

    /// Number of messages this plan sends
    pub fn emission_count(&self) -> u64 {
        self.step_count.saturating_add(1)
    }

    /// Value sent at step `i`
    pub fn value_at(&self, i: u64) -> OscArg {
        match self.kind {
            RampKind::Integer { start, end } => {
                if self.step_count == 0 {
                    return OscArg::Int(end);
                }
                let direction: i128 = if end > start { 1 } else { -1 };
                // stays within [start, end], so the narrowing cannot truncate
                OscArg::Int((i128::from(start) + direction * i128::from(i)) as i64)
            }
            RampKind::Float { start, end, digits } => {
                // a range that is not a whole number of steps ends one
                // partial step past `end`
                let offset = i as f64 / scale(digits);
                let raw = if end > start {
                    start + offset
                } else {
                    start - offset
                };
                OscArg::Float(round_to(raw, digits))
            }
        }
    }

    /// Delay of step `i` from the start of the fade; negative fade times
    /// collapse to zero
    pub fn delay_at(&self, i: u64) -> Duration {
        let ms = self.step_delay_ms * i as f64;
        if ms.is_finite() && ms > 0.0 {
            Duration::from_nanos((ms * 1_000_000.0).round() as u64)
        } else {
            Duration::ZERO
        }
    }

    /// Emissions in step order, computed lazily
    pub fn emissions(&self) -> impl Iterator<Item = ScheduledEmission> + '_ {
        (0..=self.step_count)
            .map(move |i| ScheduledEmission::new(self.delay_at(i), vec![self.value_at(i)]))
    }

    /// Total fade time
    pub fn duration(&self) -> Duration {
        self.delay_at(self.step_count)
    }
}
