//! Audio stimulus player.
//!
//! `change-state{stimulus, playing: true}` starts the player on the named
//! file; `playing` drops back to false when the player exits, is stopped,
//! or fails. A player that exits with an error is reported as a warning.

use log::{debug, info};
use serde_json::{Map, Value, json};

use crate::adapters::audio::{Playback, SoundPlayer};
use crate::adapters::registry::Claim;
use crate::app::meta::{Direction, Domain, Meta};
use crate::app::service::{Context, Device};
use crate::config::AudioParams;
use crate::error::{AdapterError, ProtocolError, Result};

use super::{flag, to_object};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct PlayerState {
    stimulus: Option<String>,
    playing: bool,
}

#[derive(Debug, Default)]
struct Patch {
    stimulus: Option<String>,
    playing: Option<bool>,
}

impl Patch {
    fn parse(data: &Map<String, Value>) -> core::result::Result<Self, ProtocolError> {
        let mut patch = Self::default();
        for (field, value) in data {
            match field.as_str() {
                "stimulus" => match value.as_str() {
                    Some(path) if !path.is_empty() => patch.stimulus = Some(path.to_owned()),
                    _ => {
                        return Err(ProtocolError::Malformed(format!(
                            "stimulus: expected a file path, got {value}"
                        )));
                    }
                },
                "playing" => patch.playing = Some(flag(field, value)?),
                other => debug!("aplayer ignores unknown field {other:?}"),
            }
        }
        Ok(patch)
    }
}

pub struct AudioPlayer {
    params: AudioParams,
    player: SoundPlayer,
    /// Held so no other component plays on the same device.
    claim: Claim,
    playback: Option<Playback>,
    meta: Meta,
    state: PlayerState,
}

impl AudioPlayer {
    pub fn new(params: AudioParams, player: SoundPlayer, claim: Claim) -> Self {
        info!("audio player on {}", claim.path());
        let meta = Meta::new("aplayer", Direction::Output)
            .variable("stimulus", Domain::Text)
            .variable("playing", Domain::Boolean);
        Self {
            params,
            player,
            claim,
            playback: None,
            meta,
            state: PlayerState::default(),
        }
    }

    fn halt(&mut self) {
        if let Some(mut playback) = self.playback.take() {
            playback.stop();
            debug!("{}: stopped {}", self.claim.path(), playback.stimulus());
        }
        self.state.playing = false;
    }

    fn play(&mut self, stimulus: String) -> Result<()> {
        self.halt();
        self.playback = Some(self.player.start(&stimulus)?);
        self.state = PlayerState {
            stimulus: Some(stimulus),
            playing: true,
        };
        Ok(())
    }
}

impl Device for AudioPlayer {
    type Timer = core::convert::Infallible;
    type Input = core::result::Result<(), AdapterError>;

    fn meta(&self) -> &Meta {
        &self.meta
    }

    fn params(&self) -> Value {
        to_object(&self.params)
    }

    fn state(&self) -> Map<String, Value> {
        let mut state = Map::new();
        state.insert("stimulus".into(), json!(self.state.stimulus));
        state.insert("playing".into(), json!(self.state.playing));
        state
    }

    async fn change_state(
        &mut self,
        _ctx: &mut Context<'_, Self::Timer>,
        data: &Map<String, Value>,
    ) -> Result<()> {
        let patch = Patch::parse(data)?;
        match patch.playing {
            Some(true) => {
                let Some(stimulus) = patch.stimulus.or_else(|| self.state.stimulus.clone()) else {
                    return Err(ProtocolError::Malformed("playing: no stimulus to play".into()).into());
                };
                if self.state.playing && self.state.stimulus.as_ref() == Some(&stimulus) {
                    return Ok(());
                }
                self.play(stimulus)
            }
            Some(false) => {
                self.halt();
                if patch.stimulus.is_some() {
                    self.state.stimulus = patch.stimulus;
                }
                Ok(())
            }
            None => match patch.stimulus {
                Some(_) if self.state.playing => Err(ProtocolError::Malformed(
                    "stimulus: cannot change while playing".into(),
                )
                .into()),
                Some(stimulus) => {
                    self.state.stimulus = Some(stimulus);
                    Ok(())
                }
                None => Ok(()),
            },
        }
    }

    async fn reset_state(&mut self, _ctx: &mut Context<'_, Self::Timer>) -> Result<()> {
        self.halt();
        self.state = PlayerState::default();
        Ok(())
    }

    async fn on_timer(
        &mut self,
        _ctx: &mut Context<'_, Self::Timer>,
        timer: Self::Timer,
    ) -> Result<()> {
        match timer {}
    }

    async fn next_input(&mut self) -> Self::Input {
        match self.playback.as_mut() {
            Some(playback) => playback.finished().await,
            None => futures_lite::future::pending().await,
        }
    }

    async fn on_input(&mut self, ctx: &mut Context<'_, Self::Timer>, input: Self::Input) -> Result<()> {
        if let Some(playback) = self.playback.take() {
            debug!("{}: {} ended", ctx.addr(), playback.stimulus());
        }
        self.state.playing = false;
        input.map_err(Into::into)
    }

    async fn release(&mut self, _ctx: &mut Context<'_, Self::Timer>) -> Result<()> {
        self.halt();
        Ok(())
    }
}
