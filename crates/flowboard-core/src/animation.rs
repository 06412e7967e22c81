#![forbid(unsafe_code)]

//! Time-based animation primitives: easing curves and the [`Glide`] tween.
//!
//! Animations are advanced explicitly with [`Animation::tick`]; nothing here
//! reads a clock. The driver owns the mapping from host time to `tick` calls.
//!
//! # Invariants
//!
//! 1. `value()` is always in [0.0, 1.0] and is the *eased* progress.
//! 2. A zero duration is clamped to 1ns so progress never divides by zero.
//! 3. Once `is_complete()` is true it stays true until `reset()`.

use std::time::Duration;

/// An easing curve mapping linear progress in [0, 1] to eased progress.
pub type EasingFn = fn(f32) -> f32;

/// A time-driven animation producing a normalized value.
pub trait Animation {
    /// Advance the animation by `dt`.
    fn tick(&mut self, dt: Duration);

    /// Whether the animation reached its end.
    fn is_complete(&self) -> bool;

    /// Current eased value in [0.0, 1.0].
    fn value(&self) -> f32;

    /// Rewind to the initial state.
    fn reset(&mut self);
}

// ---------------------------------------------------------------------------
// Easing
// ---------------------------------------------------------------------------

/// Identity curve.
#[inline]
pub fn linear(t: f32) -> f32 {
    t.clamp(0.0, 1.0)
}

/// Quadratic ease-in.
#[inline]
pub fn ease_in(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    t * t
}

/// Quadratic ease-out.
#[inline]
pub fn ease_out(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    1.0 - (1.0 - t) * (1.0 - t)
}

/// CSS `ease-in-out`, i.e. `cubic-bezier(0.42, 0, 0.58, 1)`.
pub fn ease_in_out(t: f32) -> f32 {
    CubicBezier::EASE_IN_OUT.sample(t)
}

/// CSS `ease`, i.e. `cubic-bezier(0.25, 0.1, 0.25, 1)`.
pub fn ease(t: f32) -> f32 {
    CubicBezier::EASE.sample(t)
}

/// Easing curve for a CSS timing-function keyword.
#[must_use]
pub fn easing_by_name(name: &str) -> Option<EasingFn> {
    match name {
        "linear" => Some(linear),
        "ease" => Some(ease),
        "ease-in" => Some(ease_in),
        "ease-out" => Some(ease_out),
        "ease-in-out" => Some(ease_in_out),
        _ => None,
    }
}

/// A CSS-style cubic Bézier timing curve anchored at (0,0) and (1,1).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubicBezier {
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
}

impl CubicBezier {
    /// `ease-in-out` control points.
    pub const EASE_IN_OUT: Self = Self::new(0.42, 0.0, 0.58, 1.0);
    /// `ease` control points.
    pub const EASE: Self = Self::new(0.25, 0.1, 0.25, 1.0);

    /// Create a curve. `x1`/`x2` should lie in [0, 1] for the curve to be a
    /// function of time; they are clamped when sampling.
    #[must_use]
    pub const fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    fn axis(p1: f64, p2: f64, s: f64) -> f64 {
        // B(s) = 3(1-s)^2 s p1 + 3(1-s) s^2 p2 + s^3
        let inv = 1.0 - s;
        3.0 * inv * inv * s * p1 + 3.0 * inv * s * s * p2 + s * s * s
    }

    fn axis_derivative(p1: f64, p2: f64, s: f64) -> f64 {
        let inv = 1.0 - s;
        3.0 * inv * inv * p1 + 6.0 * inv * s * (p2 - p1) + 3.0 * s * s * (1.0 - p2)
    }

    /// Solve for the curve parameter whose x equals `x`.
    fn solve_parameter(&self, x: f64) -> f64 {
        let (x1, x2) = (self.x1.clamp(0.0, 1.0), self.x2.clamp(0.0, 1.0));

        // Newton-Raphson first; fast for well-behaved curves.
        let mut s = x;
        for _ in 0..8 {
            let err = Self::axis(x1, x2, s) - x;
            if err.abs() < 1e-7 {
                return s;
            }
            let d = Self::axis_derivative(x1, x2, s);
            if d.abs() < 1e-6 {
                break;
            }
            s -= err / d;
        }

        // Bisection fallback.
        let (mut lo, mut hi) = (0.0_f64, 1.0_f64);
        s = x;
        for _ in 0..64 {
            let v = Self::axis(x1, x2, s);
            if (v - x).abs() < 1e-7 {
                break;
            }
            if v < x {
                lo = s;
            } else {
                hi = s;
            }
            s = (lo + hi) / 2.0;
        }
        s
    }

    /// Map linear progress `t` to eased progress.
    #[must_use]
    pub fn sample(&self, t: f32) -> f32 {
        let x = f64::from(t.clamp(0.0, 1.0));
        if x == 0.0 || x == 1.0 {
            return x as f32;
        }
        let s = self.solve_parameter(x);
        Self::axis(self.y1, self.y2, s) as f32
    }
}

// ---------------------------------------------------------------------------
// Glide
// ---------------------------------------------------------------------------

/// A fixed-duration tween with an easing curve.
///
/// `value()` is eased progress; [`Glide::linear_progress`] exposes the raw
/// elapsed fraction for completion checks.
#[derive(Debug, Clone, Copy)]
pub struct Glide {
    duration: Duration,
    elapsed: Duration,
    easing: EasingFn,
}

impl Glide {
    /// Create a glide lasting `duration` with `ease_in_out` easing.
    #[must_use]
    pub fn new(duration: Duration) -> Self {
        Self {
            duration: if duration.is_zero() {
                Duration::from_nanos(1)
            } else {
                duration
            },
            elapsed: Duration::ZERO,
            easing: ease_in_out,
        }
    }

    /// Replace the easing curve (builder pattern).
    #[must_use]
    pub fn easing(mut self, easing: EasingFn) -> Self {
        self.easing = easing;
        self
    }

    /// Total duration.
    #[inline]
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Time elapsed so far, saturating at the duration.
    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Elapsed fraction in [0, 1] before easing.
    pub fn linear_progress(&self) -> f32 {
        (self.elapsed.as_secs_f64() / self.duration.as_secs_f64()).clamp(0.0, 1.0) as f32
    }

    /// Jump to an absolute elapsed time (clamped to the duration).
    pub fn seek(&mut self, elapsed: Duration) {
        self.elapsed = elapsed.min(self.duration);
    }
}

impl Animation for Glide {
    fn tick(&mut self, dt: Duration) {
        self.elapsed = self.elapsed.saturating_add(dt).min(self.duration);
    }

    fn is_complete(&self) -> bool {
        self.elapsed >= self.duration
    }

    fn value(&self) -> f32 {
        (self.easing)(self.linear_progress()).clamp(0.0, 1.0)
    }

    fn reset(&mut self) {
        self.elapsed = Duration::ZERO;
    }
}
