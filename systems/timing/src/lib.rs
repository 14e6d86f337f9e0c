#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Fixed-step clocks, cooperative timers and property animators.
//!
//! A [`Clock`] turns wall-clock deltas into a whole number of fires. A
//! [`Schedule`] pairs a clock with the [`Timer`]s registered against it; each
//! fire advances every registered timer by exactly one tick. Timers carry a
//! copyable action payload instead of a callback, so the owner of the
//! schedule decides what a tick or a completion means and stays free to
//! mutate itself (including the schedule) while reacting.

mod animator;

use std::{collections::BTreeMap, time::Duration};

use thiserror::Error;

pub use animator::{AnimationHooks, Animator, Easing};

/// Errors raised when the timing contracts are broken.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TimingError {
    /// A clock was created with a zero interval and would never stop firing.
    #[error("clock {name:?} requires a non-zero interval")]
    ZeroInterval {
        /// Name of the offending clock.
        name: String,
    },
    /// A timer was registered with a clock that already lists it.
    #[error("timer {timer:?} is already registered with clock {clock:?}")]
    AlreadyRegistered {
        /// Name of the clock.
        clock: String,
        /// Identifier of the timer.
        timer: TimerId,
    },
    /// The schedule has no record of the timer.
    #[error("timer {0:?} is unknown to the schedule")]
    UnknownTimer(TimerId),
}

/// Identifier of a timer held by a [`Schedule`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl TimerId {
    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

/// Accumulator that fires at a fixed interval, after an optional initial delay.
#[derive(Clone, Debug)]
pub struct Clock {
    name: String,
    interval: Duration,
    delay: Duration,
    accumulator: Duration,
    elapsed: Duration,
    next: Duration,
    counter: u64,
    timers: Vec<TimerId>,
}

impl Clock {
    /// Creates a clock firing every `interval`.
    pub fn new(name: impl Into<String>, interval: Duration) -> Result<Self, TimingError> {
        let name = name.into();
        if interval.is_zero() {
            return Err(TimingError::ZeroInterval { name });
        }

        Ok(Self {
            name,
            interval,
            delay: Duration::ZERO,
            accumulator: Duration::ZERO,
            elapsed: Duration::ZERO,
            next: interval,
            counter: 0,
            timers: Vec::new(),
        })
    }

    /// Uses `delay` instead of the interval as the first threshold.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self.next = self.first_threshold();
        self
    }

    fn first_threshold(&self) -> Duration {
        if self.delay.is_zero() {
            self.interval
        } else {
            self.delay
        }
    }

    /// Accumulates `dt` and returns how many times the clock fired.
    ///
    /// The owner runs its own per-fire callback once for every fire, before
    /// advancing registered timers for that fire.
    pub fn advance(&mut self, dt: Duration) -> u32 {
        self.accumulator = self.accumulator.saturating_add(dt);
        self.elapsed = self.elapsed.saturating_add(dt);

        let mut fires = 0;
        while self.accumulator >= self.next {
            self.counter += 1;
            fires += 1;
            self.accumulator -= self.next;
            self.next = self.interval;
        }
        fires
    }

    /// Clears counters, restores the initial delay and forgets every timer.
    pub fn reset(&mut self) {
        self.counter = 0;
        self.accumulator = Duration::ZERO;
        self.elapsed = Duration::ZERO;
        self.next = self.first_threshold();
        self.timers.clear();
    }

    /// Adds a timer to the tick list.
    pub fn register(&mut self, timer: TimerId) -> Result<(), TimingError> {
        if self.is_registered(timer) {
            return Err(TimingError::AlreadyRegistered {
                clock: self.name.clone(),
                timer,
            });
        }
        self.timers.push(timer);
        Ok(())
    }

    /// Removes a timer from the tick list, reporting whether it was present.
    pub fn deregister(&mut self, timer: TimerId) -> bool {
        let before = self.timers.len();
        self.timers.retain(|registered| *registered != timer);
        before != self.timers.len()
    }

    /// Reports whether the timer is currently listed.
    #[must_use]
    pub fn is_registered(&self, timer: TimerId) -> bool {
        self.timers.contains(&timer)
    }

    /// Timers in registration order.
    #[must_use]
    pub fn registered(&self) -> &[TimerId] {
        &self.timers
    }

    /// Name given at construction.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of fires since construction or the last reset.
    #[must_use]
    pub const fn counter(&self) -> u64 {
        self.counter
    }

    /// Total wall-clock time fed into the clock.
    #[must_use]
    pub const fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

/// Outcome of advancing a single timer by one tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerStep<A> {
    /// The timer is paused, complete or no longer registered.
    Idle,
    /// The timer progressed without reaching its interval.
    Tick(Option<A>),
    /// The timer reached its interval.
    End(Option<A>),
}

/// Countdown measured in clock ticks.
#[derive(Clone, Debug)]
pub struct Timer<A> {
    name: String,
    interval: u32,
    elapsed: u32,
    paused: bool,
    periodic: bool,
    complete: bool,
    on_end: Option<A>,
    on_tick: Option<A>,
}

impl<A: Copy> Timer<A> {
    /// Timer that completes once after `interval` ticks.
    #[must_use]
    pub fn one_shot(name: impl Into<String>, interval: u32) -> Self {
        Self {
            name: name.into(),
            interval,
            elapsed: 0,
            paused: false,
            periodic: false,
            complete: false,
            on_end: None,
            on_tick: None,
        }
    }

    /// Timer that completes every `interval` ticks until cancelled.
    #[must_use]
    pub fn periodic(name: impl Into<String>, interval: u32) -> Self {
        Self {
            periodic: true,
            ..Self::one_shot(name, interval)
        }
    }

    /// Action reported when the interval is reached.
    #[must_use]
    pub fn on_end(mut self, action: A) -> Self {
        self.on_end = Some(action);
        self
    }

    /// Action reported on every tick that stays below the interval.
    #[must_use]
    pub fn on_tick(mut self, action: A) -> Self {
        self.on_tick = Some(action);
        self
    }

    /// Name given at construction.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ticks accumulated towards the interval.
    #[must_use]
    pub const fn elapsed(&self) -> u32 {
        self.elapsed
    }

    /// Number of ticks until completion.
    #[must_use]
    pub const fn interval(&self) -> u32 {
        self.interval
    }

    /// Reports whether ticks are currently ignored.
    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.paused
    }

    /// Progress through the interval in `0.0..=1.0`.
    #[must_use]
    pub fn ratio(&self) -> f32 {
        if self.interval == 0 {
            1.0
        } else {
            self.elapsed as f32 / self.interval as f32
        }
    }

    fn advance(&mut self) -> TimerStep<A> {
        if self.paused || self.complete {
            return TimerStep::Idle;
        }

        self.elapsed = self.elapsed.saturating_add(1);
        if self.elapsed < self.interval {
            return TimerStep::Tick(self.on_tick);
        }

        self.elapsed = self.interval;
        if self.periodic {
            self.elapsed = 0;
        } else {
            self.complete = true;
        }
        TimerStep::End(self.on_end)
    }
}

/// A clock together with the timers registered against it.
#[derive(Clone, Debug)]
pub struct Schedule<A> {
    clock: Clock,
    timers: BTreeMap<TimerId, Timer<A>>,
    next_id: u64,
}

impl<A: Copy> Schedule<A> {
    /// Creates an empty schedule driven by `clock`.
    #[must_use]
    pub fn new(clock: Clock) -> Self {
        Self {
            clock,
            timers: BTreeMap::new(),
            next_id: 0,
        }
    }

    /// Clock driving the schedule.
    #[must_use]
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Feeds wall-clock time into the clock and returns the number of ticks due.
    ///
    /// For every tick the owner runs its per-tick logic, then walks
    /// [`Schedule::tick_order`] calling [`Schedule::advance_timer`].
    pub fn advance(&mut self, dt: Duration) -> u32 {
        self.clock.advance(dt)
    }

    /// Registers a fresh timer and returns its identifier.
    pub fn start(&mut self, timer: Timer<A>) -> Result<TimerId, TimingError> {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.clock.register(id)?;
        let _ = self.timers.insert(id, timer);
        Ok(id)
    }

    /// Removes the timer. Cancelling an unknown or finished timer is a no-op.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let _ = self.clock.deregister(id);
        self.timers.remove(&id).is_some()
    }

    /// Stops the timer from accumulating ticks.
    pub fn pause(&mut self, id: TimerId) -> Result<(), TimingError> {
        self.timer_mut(id)?.paused = true;
        Ok(())
    }

    /// Lets a paused timer accumulate ticks again.
    pub fn unpause(&mut self, id: TimerId) -> Result<(), TimingError> {
        self.timer_mut(id)?.paused = false;
        Ok(())
    }

    /// Changes the interval of a running timer, keeping its elapsed ticks.
    pub fn set_interval(&mut self, id: TimerId, interval: u32) -> Result<(), TimingError> {
        self.timer_mut(id)?.interval = interval;
        Ok(())
    }

    /// Looks up a registered timer.
    #[must_use]
    pub fn timer(&self, id: TimerId) -> Option<&Timer<A>> {
        self.timers.get(&id)
    }

    /// Progress of a registered timer.
    #[must_use]
    pub fn ratio(&self, id: TimerId) -> Option<f32> {
        self.timers.get(&id).map(Timer::ratio)
    }

    /// Reports whether the timer is still registered.
    #[must_use]
    pub fn is_active(&self, id: TimerId) -> bool {
        self.clock.is_registered(id)
    }

    /// Number of registered timers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.timers.len()
    }

    /// Reports whether no timer is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Snapshot of the registration order used to advance one tick.
    ///
    /// Callbacks may cancel or start timers while the snapshot is walked;
    /// cancelled timers report [`TimerStep::Idle`] and new ones first tick on
    /// the following fire.
    #[must_use]
    pub fn tick_order(&self) -> Vec<TimerId> {
        self.clock.registered().to_vec()
    }

    /// Advances one timer by a single tick.
    pub fn advance_timer(&mut self, id: TimerId) -> TimerStep<A> {
        if !self.clock.is_registered(id) {
            return TimerStep::Idle;
        }
        let Some(timer) = self.timers.get_mut(&id) else {
            return TimerStep::Idle;
        };

        let step = timer.advance();
        if matches!(step, TimerStep::End(_)) && !timer.periodic {
            let _ = self.cancel(id);
        }
        step
    }

    /// Clears the clock and drops every timer.
    pub fn reset(&mut self) {
        self.clock.reset();
        self.timers.clear();
    }

    fn timer_mut(&mut self, id: TimerId) -> Result<&mut Timer<A>, TimingError> {
        self.timers
            .get_mut(&id)
            .ok_or(TimingError::UnknownTimer(id))
    }
}
