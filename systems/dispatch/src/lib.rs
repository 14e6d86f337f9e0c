#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Input dispatcher that turns raw keys and frame deltas into world commands.
//!
//! The dispatcher owns no simulation state. It remaps keys onto abstract
//! inputs, simulates typematic repeat for held directional keys and gates the
//! logic clock on the current [`GameState`]. Everything it decides is pushed as
//! [`Command`]s for the caller to apply to the world.

use std::{collections::BTreeMap, time::Duration};

use dynamite_core::{Action, Command};
use dynamite_system_timing::{Clock, TimingError};
use dynamite_world::SimulationConfig;
use log::debug;

/// Raw keys delivered by an input source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    /// Letter W.
    W,
    /// Letter A.
    A,
    /// Letter S.
    S,
    /// Letter D.
    D,
    /// Arrow up.
    Up,
    /// Arrow down.
    Down,
    /// Arrow left.
    Left,
    /// Arrow right.
    Right,
    /// Space bar.
    Space,
    /// Enter or return.
    Enter,
    /// Letter B.
    B,
    /// Letter L.
    L,
    /// Letter R.
    R,
    /// Escape.
    Escape,
    /// Any key the dispatcher has no use for.
    Other,
}

/// Abstract input a raw key is remapped onto.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Input {
    /// A command for the key handler of the world.
    Action(Action),
    /// Toggles between playing and paused.
    Pause,
    /// Tears the level down and loads it again.
    Reload,
}

impl Key {
    /// Input the key maps onto, if any.
    #[must_use]
    pub const fn input(self) -> Option<Input> {
        let input = match self {
            Self::W | Self::Up => Input::Action(Action::Up),
            Self::A | Self::Left => Input::Action(Action::Left),
            Self::S | Self::Down => Input::Action(Action::Down),
            Self::D | Self::Right => Input::Action(Action::Right),
            Self::Space | Self::Enter => Input::Action(Action::Interact),
            Self::B => Input::Action(Action::DropBomb),
            Self::L => Input::Action(Action::Log),
            Self::R => Input::Reload,
            Self::Escape => Input::Pause,
            Self::Other => return None,
        };
        Some(input)
    }
}

/// Top-level state of a game session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GameState {
    /// No state has been entered yet.
    Invalid,
    /// The main menu is shown.
    MainMenu,
    /// A level is being materialised.
    Loading,
    /// The level intro plays.
    Preshow,
    /// The logic clock runs and actions reach the world.
    Playing,
    /// The logic clock is frozen.
    Paused,
    /// The current level was solved.
    LevelComplete,
    /// The player lost.
    GameOver,
    /// Every level was solved.
    GameWon,
    /// The player is asked to confirm leaving.
    ConfirmExit,
}

/// Game session dispatcher.
#[derive(Debug)]
pub struct Game {
    state: GameState,
    repeaters: BTreeMap<Action, Clock>,
    repeating: Option<Action>,
}

impl Game {
    /// Creates a dispatcher already in [`GameState::Playing`].
    pub fn new(config: &SimulationConfig) -> Result<Self, TimingError> {
        let mut repeaters = BTreeMap::new();
        for action in [Action::Up, Action::Down, Action::Left, Action::Right] {
            let clock = Clock::new(format!("{action:?} repeater"), config.typematic_interval())?
                .with_delay(config.typematic_delay());
            let _ = repeaters.insert(action, clock);
        }

        let mut game = Self {
            state: GameState::Invalid,
            repeaters,
            repeating: None,
        };
        game.transition_to(GameState::Playing);
        Ok(game)
    }

    /// Current state of the session.
    #[must_use]
    pub fn state(&self) -> GameState {
        self.state
    }

    /// Action whose key is currently auto-repeating, if any.
    #[must_use]
    pub fn repeating(&self) -> Option<Action> {
        self.repeating
    }

    /// Enters `state`.
    pub fn transition_to(&mut self, state: GameState) {
        if state == self.state {
            return;
        }
        debug!("game state {:?} -> {:?}", self.state, state);
        if state != GameState::Playing {
            self.repeating = None;
        }
        self.state = state;
    }

    /// Forwards one frame delta.
    ///
    /// The active repeater runs first and re-issues its action once per fire;
    /// the delta reaches the world only while playing.
    pub fn timer(&mut self, dt: Duration, out: &mut Vec<Command>) {
        if let Some(action) = self.repeating {
            if let Some(repeater) = self.repeaters.get_mut(&action) {
                for _ in 0..repeater.advance(dt) {
                    out.push(Command::Press { action });
                }
            }
        }

        if self.state == GameState::Playing {
            out.push(Command::Tick { dt });
        }
    }

    /// Handles a key going down.
    pub fn on_key_press(&mut self, key: Key, out: &mut Vec<Command>) {
        let Some(input) = key.input() else {
            return;
        };

        match input {
            Input::Pause => {
                let next = if self.state == GameState::Paused {
                    GameState::Playing
                } else {
                    GameState::Paused
                };
                self.transition_to(next);
            }
            Input::Reload => {
                self.transition_to(GameState::Loading);
                out.push(Command::ReloadLevel);
                self.transition_to(GameState::Playing);
            }
            Input::Action(action) => {
                if self.state != GameState::Playing {
                    debug!("dropping {action:?} while {:?}", self.state);
                    return;
                }
                if let Some(repeater) = self.repeaters.get_mut(&action) {
                    repeater.reset();
                    self.repeating = Some(action);
                }
                out.push(Command::Press { action });
            }
        }
    }

    /// Handles a key going up.
    pub fn on_key_release(&mut self, key: Key, out: &mut Vec<Command>) {
        let Some(Input::Action(action)) = key.input() else {
            return;
        };
        if self.repeating == Some(action) {
            self.repeating = None;
        }
        out.push(Command::Release { action });
    }
}
