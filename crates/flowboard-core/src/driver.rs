#![forbid(unsafe_code)]

//! Animation Driver: plays glides and reports each completion exactly once.
//!
//! A playback can end in four ways, and the first one wins:
//!
//! | Signal | Outcome |
//! |--------|---------|
//! | [`AnimationDriver::tick`] sees full progress | [`Outcome::Finished`] |
//! | host calls [`AnimationDriver::notify_finished`] | [`Outcome::Finished`] |
//! | fallback timer calls [`AnimationDriver::expire`] | [`Outcome::TimedOut`] |
//! | [`AnimationDriver::cancel`] / [`AnimationDriver::cancel_all`] | [`Outcome::Cancelled`] |
//!
//! Resolution removes the playback, so every later signal for the same id is a
//! no-op returning `None`.
//!
//! # Invariants
//!
//! - `sample()` progress is monotonic in `now` for a playing glide.
//! - The fallback deadline is `start + duration + fallback_margin`.
//! - At most one [`Resolution`] is ever produced per transition id.

use std::collections::BTreeMap;
use std::fmt;

use web_time::Duration;

use crate::animation::{Animation, EasingFn, Glide, ease_in_out};
use crate::geometry::Rect;
use crate::snapshot::CardId;
use crate::transition::TransitionId;

/// Glide playback parameters.
#[derive(Debug, Clone, Copy)]
pub struct GlideConfig {
    /// Length of the glide.
    pub duration: Duration,
    /// Extra time granted before the fallback forces completion.
    pub fallback_margin: Duration,
    /// Easing curve applied to the position.
    pub easing: EasingFn,
    /// Clone opacity at the end of the glide (1.0 = no fade).
    pub end_opacity: f32,
}

impl Default for GlideConfig {
    fn default() -> Self {
        Self {
            duration: Duration::from_millis(500),
            fallback_margin: Duration::from_millis(200),
            easing: ease_in_out,
            end_opacity: 1.0,
        }
    }
}

impl GlideConfig {
    /// Set the glide duration (builder pattern).
    #[must_use]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Set the fallback margin (builder pattern).
    #[must_use]
    pub fn with_fallback_margin(mut self, margin: Duration) -> Self {
        self.fallback_margin = margin;
        self
    }

    /// Set the easing curve (builder pattern).
    #[must_use]
    pub fn with_easing(mut self, easing: EasingFn) -> Self {
        self.easing = easing;
        self
    }

    /// Fade the clone towards `opacity` while gliding (builder pattern).
    #[must_use]
    pub fn with_end_opacity(mut self, opacity: f32) -> Self {
        self.end_opacity = opacity;
        self
    }

    /// Time from playback start until the fallback fires.
    #[inline]
    pub fn fallback_after(&self) -> Duration {
        self.duration.saturating_add(self.fallback_margin)
    }

    /// Check the parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.duration.is_zero() {
            return Err(ConfigError::ZeroDuration);
        }
        if !(0.0..=1.0).contains(&self.end_opacity) {
            return Err(ConfigError::OpacityOutOfRange(self.end_opacity));
        }
        Ok(())
    }
}

/// Invalid glide configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A glide must take some time.
    ZeroDuration,
    /// Opacity must lie in [0, 1].
    OpacityOutOfRange(f32),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroDuration => f.write_str("glide duration must be greater than zero"),
            Self::OpacityOutOfRange(v) => write!(f, "end opacity {v} is outside [0, 1]"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// How a playback ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Reached the end rectangle.
    Finished,
    /// The completion signal never came; the fallback forced it.
    TimedOut,
    /// Stopped abruptly (supersession or teardown).
    Cancelled,
}

/// A playback that just ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub id: TransitionId,
    pub card_id: CardId,
    pub outcome: Outcome,
}

/// Interpolated state of a clone at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlideFrame {
    /// Where to draw the clone.
    pub rect: Rect,
    /// Offset from the start rectangle (a translate transform).
    pub translate: (f64, f64),
    /// Clone opacity.
    pub opacity: f32,
    /// Eased progress in [0, 1].
    pub progress: f32,
}

#[derive(Debug)]
struct Playback {
    card_id: CardId,
    start: Rect,
    end: Rect,
    started_at: Duration,
    fallback_at: Duration,
    glide: Glide,
}

impl Playback {
    fn seek(&mut self, now: Duration) {
        self.glide.seek(now.saturating_sub(self.started_at));
    }

    fn frame(&self, end_opacity: f32) -> GlideFrame {
        let progress = self.glide.value();
        let rect = self.start.lerp(&self.end, f64::from(progress));
        GlideFrame {
            translate: self.start.delta_to(&rect),
            rect,
            opacity: 1.0 + (end_opacity - 1.0) * progress,
            progress,
        }
    }
}

/// Plays glides for transitions whose rectangles are both known.
#[derive(Debug, Default)]
pub struct AnimationDriver {
    config: GlideConfig,
    playing: BTreeMap<TransitionId, Playback>,
}

impl AnimationDriver {
    #[must_use]
    pub fn new(config: GlideConfig) -> Self {
        Self {
            config,
            playing: BTreeMap::new(),
        }
    }

    #[inline]
    pub fn config(&self) -> &GlideConfig {
        &self.config
    }

    /// Start playing `id` at `now`. Returns the fallback deadline.
    ///
    /// Playing an id twice keeps the original playback.
    pub fn play(
        &mut self,
        id: TransitionId,
        card_id: CardId,
        start: Rect,
        end: Rect,
        now: Duration,
    ) -> Duration {
        if let Some(existing) = self.playing.get(&id) {
            return existing.fallback_at;
        }
        let fallback_at = now.saturating_add(self.config.fallback_after());
        tracing::debug!(
            target: "flowboard.driver",
            id = %id,
            card_id = %card_id,
            dx = end.x - start.x,
            dy = end.y - start.y,
            "glide started"
        );
        self.playing.insert(
            id,
            Playback {
                card_id,
                start,
                end,
                started_at: now,
                fallback_at,
                glide: Glide::new(self.config.duration).easing(self.config.easing),
            },
        );
        fallback_at
    }

    /// Interpolated frame for `id` at `now`, if it is playing.
    pub fn sample(&mut self, id: TransitionId, now: Duration) -> Option<GlideFrame> {
        let end_opacity = self.config.end_opacity;
        let playback = self.playing.get_mut(&id)?;
        playback.seek(now);
        Some(playback.frame(end_opacity))
    }

    /// Advance every playback to `now`; completed ones resolve as finished.
    pub fn tick(&mut self, now: Duration) -> Vec<Resolution> {
        let mut done = Vec::new();
        for (id, playback) in &mut self.playing {
            playback.seek(now);
            if playback.glide.is_complete() {
                done.push(*id);
            }
        }
        done.into_iter()
            .filter_map(|id| self.resolve(id, Outcome::Finished))
            .collect()
    }

    /// The host reported that playback of `id` completed.
    pub fn notify_finished(&mut self, id: TransitionId) -> Option<Resolution> {
        self.resolve(id, Outcome::Finished)
    }

    /// The fallback timer for `id` fired.
    pub fn expire(&mut self, id: TransitionId, now: Duration) -> Option<Resolution> {
        if let Some(playback) = self.playing.get(&id) {
            tracing::warn!(
                target: "flowboard.driver",
                id = %id,
                card_id = %playback.card_id,
                elapsed_ms = now.saturating_sub(playback.started_at).as_millis() as u64,
                "glide did not report completion; forcing cleanup"
            );
        }
        self.resolve(id, Outcome::TimedOut)
    }

    /// Stop `id` immediately.
    pub fn cancel(&mut self, id: TransitionId) -> Option<Resolution> {
        self.resolve(id, Outcome::Cancelled)
    }

    /// Stop every playback immediately.
    pub fn cancel_all(&mut self) -> Vec<Resolution> {
        let ids: Vec<TransitionId> = self.playing.keys().copied().collect();
        ids.into_iter()
            .filter_map(|id| self.resolve(id, Outcome::Cancelled))
            .collect()
    }

    fn resolve(&mut self, id: TransitionId, outcome: Outcome) -> Option<Resolution> {
        let Some(playback) = self.playing.remove(&id) else {
            tracing::trace!(
                target: "flowboard.driver",
                id = %id,
                outcome = ?outcome,
                "ignoring signal for resolved glide"
            );
            return None;
        };
        tracing::debug!(
            target: "flowboard.driver",
            id = %id,
            card_id = %playback.card_id,
            outcome = ?outcome,
            "glide resolved"
        );
        Some(Resolution {
            id,
            card_id: playback.card_id,
            outcome,
        })
    }

    #[inline]
    pub fn is_playing(&self, id: TransitionId) -> bool {
        self.playing.contains_key(&id)
    }

    /// Number of active playbacks.
    #[inline]
    pub fn len(&self) -> usize {
        self.playing.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.playing.is_empty()
    }
}
