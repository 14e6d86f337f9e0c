use std::time::Duration;

use dynamite_core::Direction;
use serde::Deserialize;

/// Tunable timing and gameplay constants.
///
/// Durations are given in seconds, everything suffixed `_logics` counts
/// logic ticks. Missing fields fall back to [`SimulationConfig::default`].
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Seconds between two logic ticks.
    pub logic_interval_seconds: f64,
    /// Seconds between typematic repeats of a held key.
    pub typematic_interval_seconds: f64,
    /// Seconds a key must be held before it starts repeating.
    pub typematic_delay_seconds: f64,
    /// Ticks a single player step takes.
    pub player_movement_logics: u32,
    /// Ticks a two-cell leap over water takes.
    pub player_leap_logics: u32,
    /// Ticks a bomb needs to drift one cell along a current.
    pub water_speed_logics: u32,
    /// Ticks a bomb needs to slide one cell after being pushed by an explosion.
    pub push_speed_logics: u32,
    /// Ticks of the landing transition of a bomb dropped into water.
    pub land_logics: u32,
    /// Ticks between placing a timed bomb and its detonation.
    pub timed_bomb_interval: u32,
    /// Ticks between warning flashes; halved during the final second.
    pub warning_toggle_logics: u32,
    /// Ticks an exploded bomb keeps its cell before leaving the grid.
    pub post_explosion_logics: u32,
    /// Maximum number of bombs the player can carry.
    pub max_bombs: usize,
    /// Direction the player faces when the level starts.
    pub spawn_orientation: Direction,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            logic_interval_seconds: 1.0 / 60.0,
            typematic_interval_seconds: 0.25,
            typematic_delay_seconds: 1.0,
            player_movement_logics: 15,
            player_leap_logics: 24,
            water_speed_logics: 60,
            push_speed_logics: 8,
            land_logics: 10,
            timed_bomb_interval: 240,
            warning_toggle_logics: 30,
            post_explosion_logics: 20,
            max_bombs: 3,
            spawn_orientation: Direction::East,
        }
    }
}

impl SimulationConfig {
    /// Wall-clock duration of one logic tick. Invalid values map to zero.
    #[must_use]
    pub fn logic_interval(&self) -> Duration {
        seconds(self.logic_interval_seconds)
    }

    /// Wall-clock period of typematic repeats.
    #[must_use]
    pub fn typematic_interval(&self) -> Duration {
        seconds(self.typematic_interval_seconds)
    }

    /// Wall-clock delay before typematic repeats start.
    #[must_use]
    pub fn typematic_delay(&self) -> Duration {
        seconds(self.typematic_delay_seconds)
    }

    /// Number of logic ticks in one second, at least one.
    #[must_use]
    pub fn ticks_per_second(&self) -> u32 {
        if self.logic_interval_seconds > 0.0 {
            ((1.0 / self.logic_interval_seconds).round() as u32).max(1)
        } else {
            1
        }
    }

    /// Ticks of the return animation after an aborted step.
    #[must_use]
    pub fn abort_logics(&self) -> u32 {
        (self.player_movement_logics / 3).max(1)
    }
}

fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let config: SimulationConfig = toml::from_str(
            "player_movement_logics = 6\nspawn_orientation = \"North\"\n",
        )
        .expect("parse config");

        assert_eq!(config.player_movement_logics, 6);
        assert_eq!(config.spawn_orientation, Direction::North);
        assert_eq!(config.max_bombs, SimulationConfig::default().max_bombs);
        assert_eq!(config.abort_logics(), 2);
    }

    #[test]
    fn derived_durations_follow_seconds() {
        let config = SimulationConfig {
            logic_interval_seconds: 0.1,
            ..SimulationConfig::default()
        };
        assert_eq!(config.logic_interval(), Duration::from_millis(100));
        assert_eq!(config.ticks_per_second(), 10);

        let broken = SimulationConfig {
            logic_interval_seconds: -1.0,
            ..SimulationConfig::default()
        };
        assert_eq!(broken.logic_interval(), Duration::ZERO);
        assert_eq!(broken.ticks_per_second(), 1);
    }
}
