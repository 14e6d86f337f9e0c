//! Tick-driven interpolation of a 2D property.
//!
//! An [`Animator`] owns up to two timers in a [`Schedule`]: the main timer
//! spanning the whole animation and an optional halfway timer. The owner of
//! the schedule receives the hook actions, samples [`Animator::value`] on
//! every tick and calls [`Animator::finish`] when the main timer ends.

use glam::Vec2;

use crate::{Schedule, Timer, TimerId, TimingError};

/// Easing curves applied to the normalised animation progress.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Easing {
    /// Constant speed.
    #[default]
    Linear,
    /// Starts slow, accelerates (quadratic).
    QuadIn,
    /// Starts fast, decelerates (quadratic).
    QuadOut,
    /// Slow start and end (quadratic).
    QuadInOut,
    /// Starts slow, accelerates (cubic).
    CubicIn,
    /// Starts fast, decelerates (cubic).
    CubicOut,
    /// Slow start and end (cubic).
    CubicInOut,
}

impl Easing {
    /// Maps linear progress `t` onto the curve. `t` is clamped to `0.0..=1.0`.
    #[must_use]
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::Linear => t,
            Self::QuadIn => t * t,
            Self::QuadOut => t * (2.0 - t),
            Self::QuadInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    -1.0 + (4.0 - 2.0 * t) * t
                }
            }
            Self::CubicIn => t * t * t,
            Self::CubicOut => {
                let p = t - 1.0;
                p * p * p + 1.0
            }
            Self::CubicInOut => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    let p = 2.0 * t - 2.0;
                    0.5 * p * p * p + 1.0
                }
            }
        }
    }
}

/// Actions reported to the schedule owner while an animation runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AnimationHooks<A> {
    /// Reported on every tick before completion.
    pub tick: Option<A>,
    /// Reported once, half way through the interval.
    pub halfway: Option<A>,
    /// Reported when the interval elapses.
    pub finished: Option<A>,
}

/// Linear (or eased) interpolation from a start value to an end value.
#[derive(Clone, Debug, Default)]
pub struct Animator {
    from: Vec2,
    to: Vec2,
    easing: Easing,
    timer: Option<TimerId>,
    halfway: Option<TimerId>,
    finished: bool,
    paused: bool,
}

impl Animator {
    /// Creates an idle animator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts animating from `from` to `to` over `interval` ticks.
    ///
    /// Any animation still in flight is cancelled first.
    pub fn animate<A: Copy>(
        &mut self,
        schedule: &mut Schedule<A>,
        from: Vec2,
        to: Vec2,
        interval: u32,
        easing: Easing,
        hooks: AnimationHooks<A>,
    ) -> Result<(), TimingError> {
        self.cancel(schedule);
        self.from = from;
        self.to = to;
        self.easing = easing;
        self.finished = false;

        // registered first so it fires ahead of completion on short intervals
        if let Some(action) = hooks.halfway {
            let halfway = Timer::one_shot("halfway", (interval / 2).max(1)).on_end(action);
            self.halfway = Some(schedule.start(halfway)?);
        }

        let mut timer = Timer::one_shot("animation", interval);
        if let Some(action) = hooks.tick {
            timer = timer.on_tick(action);
        }
        if let Some(action) = hooks.finished {
            timer = timer.on_end(action);
        }
        self.timer = Some(schedule.start(timer)?);
        Ok(())
    }

    /// Current interpolated value.
    #[must_use]
    pub fn value<A: Copy>(&self, schedule: &Schedule<A>) -> Vec2 {
        if self.finished {
            return self.to;
        }
        match self.timer.and_then(|id| schedule.ratio(id)) {
            Some(ratio) => self.from.lerp(self.to, self.easing.apply(ratio)),
            None => self.from,
        }
    }

    /// Marks the animation complete once its main timer ended.
    pub fn finish(&mut self) {
        self.timer = None;
        self.halfway = None;
        self.paused = false;
        self.finished = true;
    }

    /// Forgets the halfway timer once it fired.
    pub fn reached_halfway(&mut self) {
        self.halfway = None;
    }

    /// Tears down both timers. Safe to call repeatedly.
    pub fn cancel<A: Copy>(&mut self, schedule: &mut Schedule<A>) {
        if let Some(id) = self.timer.take() {
            let _ = schedule.cancel(id);
        }
        if let Some(id) = self.halfway.take() {
            let _ = schedule.cancel(id);
        }
        self.paused = false;
    }

    /// Suspends tick accounting without losing progress.
    pub fn pause<A: Copy>(&mut self, schedule: &mut Schedule<A>) -> Result<(), TimingError> {
        for id in self.timer.iter().chain(self.halfway.iter()) {
            schedule.pause(*id)?;
        }
        self.paused = true;
        Ok(())
    }

    /// Resumes a paused animation.
    pub fn unpause<A: Copy>(&mut self, schedule: &mut Schedule<A>) -> Result<(), TimingError> {
        for id in self.timer.iter().chain(self.halfway.iter()) {
            schedule.unpause(*id)?;
        }
        self.paused = false;
        Ok(())
    }

    /// Reports whether the main timer is still registered.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.timer.is_some()
    }

    /// Reports whether the last animation ran to completion.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Reports whether the animation is suspended.
    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.paused
    }

    /// End value of the current or last animation.
    #[must_use]
    pub const fn target(&self) -> Vec2 {
        self.to
    }
}
