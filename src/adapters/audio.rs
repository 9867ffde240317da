//! Audio cue playback through `aplay`.
//!
//! Each cue runs the player as a child process. The child is polled for
//! exit on the executor rather than waited on, so playback never blocks
//! the components sharing the thread. [`AudioPlayer`] wraps this in the
//! component contract.
//!
//! [`AudioPlayer`]: crate::drivers::aplayer::AudioPlayer

use core::time::Duration;
use std::io::Read;
use std::process::{Child, Command, Stdio};

use async_io_mini::Timer;
use log::{debug, info};

use crate::error::AdapterError;

#[derive(Debug, Clone)]
pub struct SoundPlayer {
    program: String,
    device: String,
    poll_interval: Duration,
}

impl SoundPlayer {
    /// Player for the ALSA `device` (e.g. `"default"`).
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            program: "aplay".into(),
            device: device.into(),
            poll_interval: Duration::from_millis(20),
        }
    }

    /// Run `program` instead of `aplay`. It receives the same arguments.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Start playing the file at `stimulus`. The returned [`Playback`]
    /// resolves when the player exits; dropping it stops the player.
    pub fn start(&self, stimulus: &str) -> Result<Playback, AdapterError> {
        let child = Command::new(&self.program)
            .args(["-D", &self.device, stimulus])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| AdapterError::io(&self.program, e))?;
        info!("playing {stimulus} on {}", self.device);
        Ok(Playback {
            child,
            program: self.program.clone(),
            stimulus: stimulus.to_owned(),
            poll_interval: self.poll_interval,
            done: false,
        })
    }
}

/// One running player process.
#[derive(Debug)]
pub struct Playback {
    child: Child,
    program: String,
    stimulus: String,
    poll_interval: Duration,
    done: bool,
}

impl Playback {
    pub fn stimulus(&self) -> &str {
        &self.stimulus
    }

    /// Wait for the player to exit. Cancel-safe: the child is only polled.
    pub async fn finished(&mut self) -> Result<(), AdapterError> {
        let status = loop {
            match self.child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    Timer::after(self.poll_interval).await;
                }
                Err(e) => return Err(AdapterError::io(&self.program, e)),
            }
        };
        self.done = true;

        if !status.success() {
            let mut stderr = String::new();
            if let Some(mut pipe) = self.child.stderr.take() {
                let _ = pipe.read_to_string(&mut stderr);
            }
            let msg = stderr.trim();
            return Err(AdapterError::failed(
                &self.program,
                if msg.is_empty() {
                    format!("exited with {status}")
                } else {
                    format!("error: {msg}")
                },
            ));
        }
        debug!("finished {}", self.stimulus);
        Ok(())
    }

    /// Kill the player if it is still running. Idempotent.
    pub fn stop(&mut self) {
        if self.done {
            return;
        }
        self.done = true;
        if self.child.kill().is_ok() {
            debug!("stopped {}", self.stimulus);
        }
        let _ = self.child.wait();
    }
}

impl Drop for Playback {
    fn drop(&mut self) {
        self.stop();
    }
}
