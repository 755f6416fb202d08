use crate::config::TimelineConfig;
use crate::types::{END_YEAR, START_YEAR};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Playing,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speed {
    Slow,
    Normal,
    Fast,
}

impl Speed {
    pub fn parse(s: &str) -> Option<Speed> {
        match s {
            "slow" => Some(Speed::Slow),
            "normal" => Some(Speed::Normal),
            "fast" => Some(Speed::Fast),
            _ => None,
        }
    }

    pub fn interval(&self, config: &TimelineConfig) -> Duration {
        let ms = match self {
            Speed::Slow => config.slow_ms,
            Speed::Normal => config.normal_ms,
            Speed::Fast => config.fast_ms,
        };
        Duration::from_millis(ms)
    }
}

/// The whole scene-2 playback state. One value, owned by the server
/// controller; event handlers never mutate it in place.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlaybackState {
    pub phase: Phase,
    pub year: u16,
    pub speed: Speed,
}

impl Default for PlaybackState {
    fn default() -> Self {
        PlaybackState {
            phase: Phase::Paused,
            year: START_YEAR,
            speed: Speed::Normal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlaybackEvent {
    Play,
    Pause,
    Reset,
    Scrub(u16),
    Tick,
    SetSpeed(Speed),
}

/// Side effects a step asks the driver to perform. The driver keeps the
/// ticker as an explicit handle so StopTicker always cancels it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Effect {
    StartTicker(Duration),
    StopTicker,
}

/// Pure transition function: (state, event) -> (state, effects).
pub fn step(
    state: PlaybackState,
    event: PlaybackEvent,
    config: &TimelineConfig,
) -> (PlaybackState, Vec<Effect>) {
    let mut next = state;
    let mut effects = Vec::new();

    match event {
        PlaybackEvent::Play => {
            if state.phase != Phase::Playing {
                // Restart from the top when the run already finished.
                if state.year >= END_YEAR {
                    next.year = START_YEAR;
                }
                next.phase = Phase::Playing;
                effects.push(Effect::StartTicker(state.speed.interval(config)));
            }
        }
        PlaybackEvent::Pause => {
            if state.phase == Phase::Playing {
                next.phase = Phase::Paused;
                effects.push(Effect::StopTicker);
            }
        }
        PlaybackEvent::Reset => {
            next = PlaybackState {
                phase: Phase::Paused,
                year: START_YEAR,
                speed: state.speed,
            };
            effects.push(Effect::StopTicker);
        }
        PlaybackEvent::Scrub(year) => {
            next.year = year.clamp(START_YEAR, END_YEAR);
            if state.phase == Phase::Playing {
                next.phase = Phase::Paused;
                effects.push(Effect::StopTicker);
            }
        }
        PlaybackEvent::Tick => {
            // Ticks from a cancelled timer can still arrive; ignore them
            // outside Playing.
            if state.phase == Phase::Playing {
                next.year = (state.year + 1).min(END_YEAR);
                if next.year == END_YEAR {
                    next.phase = Phase::Idle;
                    effects.push(Effect::StopTicker);
                }
            }
        }
        PlaybackEvent::SetSpeed(speed) => {
            next.speed = speed;
            if state.phase == Phase::Playing {
                effects.push(Effect::StopTicker);
                effects.push(Effect::StartTicker(speed.interval(config)));
            }
        }
    }

    (next, effects)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> TimelineConfig {
        TimelineConfig::default()
    }

    fn apply(state: PlaybackState, events: &[PlaybackEvent]) -> PlaybackState {
        events
            .iter()
            .fold(state, |s, &e| step(s, e, &config()).0)
    }

    #[test]
    fn play_starts_ticker_and_enters_playing() {
        let (state, effects) = step(PlaybackState::default(), PlaybackEvent::Play, &config());
        assert_eq!(state.phase, Phase::Playing);
        assert_eq!(state.year, START_YEAR);
        assert_eq!(
            effects,
            vec![Effect::StartTicker(Duration::from_millis(800))]
        );
    }

    #[test]
    fn play_at_final_year_restarts_at_start() {
        let finished = PlaybackState {
            phase: Phase::Idle,
            year: END_YEAR,
            speed: Speed::Normal,
        };
        let (state, effects) = step(finished, PlaybackEvent::Play, &config());
        assert_eq!(state.phase, Phase::Playing);
        assert_eq!(state.year, START_YEAR);
        assert!(!effects.is_empty());
    }

    #[test]
    fn tick_advances_and_final_year_goes_idle() {
        let playing = PlaybackState {
            phase: Phase::Playing,
            year: 2022,
            speed: Speed::Fast,
        };
        let (state, effects) = step(playing, PlaybackEvent::Tick, &config());
        assert_eq!(state.year, 2023);
        assert_eq!(state.phase, Phase::Playing);
        assert!(effects.is_empty());

        let (state, effects) = step(state, PlaybackEvent::Tick, &config());
        assert_eq!(state.year, END_YEAR);
        assert_eq!(state.phase, Phase::Idle);
        assert_eq!(effects, vec![Effect::StopTicker]);
    }

    #[test]
    fn stale_ticks_outside_playing_are_ignored() {
        for phase in [Phase::Paused, Phase::Idle] {
            let state = PlaybackState {
                phase,
                year: 2010,
                speed: Speed::Normal,
            };
            let (next, effects) = step(state, PlaybackEvent::Tick, &config());
            assert_eq!(next, state);
            assert!(effects.is_empty());
        }
    }

    #[test]
    fn scrub_pauses_playback_and_clamps() {
        let playing = PlaybackState {
            phase: Phase::Playing,
            year: 2010,
            speed: Speed::Normal,
        };
        let (state, effects) = step(playing, PlaybackEvent::Scrub(2015), &config());
        assert_eq!(state.phase, Phase::Paused);
        assert_eq!(state.year, 2015);
        assert_eq!(effects, vec![Effect::StopTicker]);

        let (state, _) = step(state, PlaybackEvent::Scrub(1990), &config());
        assert_eq!(state.year, START_YEAR);
        let (state, _) = step(state, PlaybackEvent::Scrub(2100), &config());
        assert_eq!(state.year, END_YEAR);
    }

    #[test]
    fn speed_change_while_playing_restarts_ticker_keeping_year() {
        let playing = PlaybackState {
            phase: Phase::Playing,
            year: 2013,
            speed: Speed::Normal,
        };
        let (state, effects) = step(playing, PlaybackEvent::SetSpeed(Speed::Fast), &config());
        assert_eq!(state.year, 2013);
        assert_eq!(state.phase, Phase::Playing);
        assert_eq!(
            effects,
            vec![
                Effect::StopTicker,
                Effect::StartTicker(Duration::from_millis(300)),
            ]
        );

        // Paused speed change leaves the ticker alone.
        let paused = PlaybackState {
            phase: Phase::Paused,
            ..playing
        };
        let (state, effects) = step(paused, PlaybackEvent::SetSpeed(Speed::Slow), &config());
        assert_eq!(state.speed, Speed::Slow);
        assert!(effects.is_empty());
    }

    #[test]
    fn reset_forces_paused_at_start_from_any_state() {
        for phase in [Phase::Idle, Phase::Playing, Phase::Paused] {
            let state = PlaybackState {
                phase,
                year: 2019,
                speed: Speed::Fast,
            };
            let (next, effects) = step(state, PlaybackEvent::Reset, &config());
            assert_eq!(next.phase, Phase::Paused);
            assert_eq!(next.year, START_YEAR);
            assert_eq!(next.speed, Speed::Fast);
            assert_eq!(effects, vec![Effect::StopTicker]);
        }
    }

    #[test]
    fn full_run_then_reset_round_trips_to_initial_state() {
        let mut state = PlaybackState::default();
        let initial = state;

        state = step(state, PlaybackEvent::Play, &config()).0;
        while state.phase == Phase::Playing {
            state = step(state, PlaybackEvent::Tick, &config()).0;
        }
        assert_eq!(state.year, END_YEAR);
        assert_eq!(state.phase, Phase::Idle);

        state = step(state, PlaybackEvent::Reset, &config()).0;
        assert_eq!(state, initial);
    }

    #[test]
    fn pause_then_play_resumes_from_current_year() {
        let state = apply(
            PlaybackState::default(),
            &[
                PlaybackEvent::Play,
                PlaybackEvent::Tick,
                PlaybackEvent::Tick,
                PlaybackEvent::Pause,
            ],
        );
        assert_eq!(state.year, 2002);
        assert_eq!(state.phase, Phase::Paused);

        let resumed = apply(state, &[PlaybackEvent::Play]);
        assert_eq!(resumed.year, 2002);
        assert_eq!(resumed.phase, Phase::Playing);
    }
}
