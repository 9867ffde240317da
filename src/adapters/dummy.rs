//! In-memory adapters for benches without a cape, and for tests.
//!
//! Each dummy adapter comes with a test bench: a cloneable handle onto the
//! adapter's simulated hardware. Benches inject levels and failures and
//! record what the component wrote.

use core::time::Duration;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use async_io_mini::Timer;
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::signal::Signal;

use crate::app::ports::{Edge, EdgeWatch, GpioLine, Level, LedChannel, PwmChannel};
use crate::error::AdapterError;

use super::registry::Claim;

// ───────────────────────────────────────────────────────────────
// GPIO
// ───────────────────────────────────────────────────────────────

struct WatchSlot {
    edge: Edge,
    signal: Signal<NoopRawMutex, Level>,
    closed: Cell<bool>,
}

#[derive(Default)]
struct GpioSim {
    level: Option<Level>,
    fail_reads: bool,
    fail_writes: bool,
    writes: Vec<Level>,
    watches: Vec<Rc<WatchSlot>>,
}

/// Simulated side of a [`DummyGpio`].
#[derive(Clone, Default)]
pub struct GpioBench {
    sim: Rc<RefCell<GpioSim>>,
}

impl GpioBench {
    /// Drive the line to `level`, notifying watches whose edge matches.
    pub fn set_level(&self, level: Level) {
        let mut sim = self.sim.borrow_mut();
        let old = sim.level.unwrap_or(Level::Low);
        sim.level = Some(level);
        sim.watches.retain(|w| !w.closed.get());
        for watch in &sim.watches {
            if watch.edge.matches(old, level) {
                watch.signal.signal(level);
            }
        }
    }

    /// Low then high then low: one rising and one falling edge.
    pub fn pulse(&self) {
        self.set_level(Level::Low);
        self.set_level(Level::High);
        self.set_level(Level::Low);
    }

    pub fn level(&self) -> Level {
        self.sim.borrow().level.unwrap_or(Level::Low)
    }

    pub fn fail_reads(&self, fail: bool) {
        self.sim.borrow_mut().fail_reads = fail;
    }

    pub fn fail_writes(&self, fail: bool) {
        self.sim.borrow_mut().fail_writes = fail;
    }

    pub fn writes(&self) -> Vec<Level> {
        self.sim.borrow().writes.clone()
    }

    /// Watches not yet closed.
    pub fn open_watches(&self) -> usize {
        self.sim
            .borrow()
            .watches
            .iter()
            .filter(|w| !w.closed.get())
            .count()
    }
}

pub struct DummyGpio {
    claim: Claim,
    sim: Rc<RefCell<GpioSim>>,
}

impl DummyGpio {
    pub fn new(claim: Claim) -> (Self, GpioBench) {
        let bench = GpioBench::default();
        (
            Self {
                claim,
                sim: bench.sim.clone(),
            },
            bench,
        )
    }
}

impl GpioLine for DummyGpio {
    type Watch = DummyWatch;

    fn path(&self) -> &str {
        self.claim.path()
    }

    async fn read(&mut self) -> Result<Level, AdapterError> {
        let sim = self.sim.borrow();
        if sim.fail_reads {
            return Err(AdapterError::failed(self.claim.path(), "simulated read failure"));
        }
        Ok(sim.level.unwrap_or(Level::Low))
    }

    async fn write(&mut self, level: Level) -> Result<(), AdapterError> {
        let mut sim = self.sim.borrow_mut();
        if sim.fail_writes {
            return Err(AdapterError::failed(self.claim.path(), "simulated write failure"));
        }
        sim.level = Some(level);
        sim.writes.push(level);
        Ok(())
    }

    fn watch(&mut self, edge: Edge) -> Result<DummyWatch, AdapterError> {
        let slot = Rc::new(WatchSlot {
            edge,
            signal: Signal::new(),
            closed: Cell::new(false),
        });
        self.sim.borrow_mut().watches.push(slot.clone());
        Ok(DummyWatch { slot })
    }
}

pub struct DummyWatch {
    slot: Rc<WatchSlot>,
}

impl EdgeWatch for DummyWatch {
    async fn changed(&mut self) -> Result<Level, AdapterError> {
        if self.slot.closed.get() {
            return futures_lite::future::pending().await;
        }
        Ok(self.slot.signal.wait().await)
    }

    fn close(&mut self) {
        self.slot.closed.set(true);
        self.slot.signal.reset();
    }

    fn is_closed(&self) -> bool {
        self.slot.closed.get()
    }
}

// ───────────────────────────────────────────────────────────────
// PWM
// ───────────────────────────────────────────────────────────────

/// One command a [`DummyPwm`] received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PwmCall {
    Pulse {
        duty: u8,
        duration: Duration,
        hold_duty: u8,
    },
    Duty(u8),
}

#[derive(Default)]
struct PwmSim {
    duty: u8,
    fail: bool,
    calls: Vec<PwmCall>,
}

/// Simulated side of a [`DummyPwm`].
#[derive(Clone, Default)]
pub struct PwmBench {
    sim: Rc<RefCell<PwmSim>>,
}

impl PwmBench {
    /// Duty currently in effect.
    pub fn duty(&self) -> u8 {
        self.sim.borrow().duty
    }

    pub fn calls(&self) -> Vec<PwmCall> {
        self.sim.borrow().calls.clone()
    }

    pub fn fail(&self, fail: bool) {
        self.sim.borrow_mut().fail = fail;
    }
}

pub struct DummyPwm {
    claim: Claim,
    sim: Rc<RefCell<PwmSim>>,
}

impl DummyPwm {
    pub fn new(claim: Claim) -> (Self, PwmBench) {
        let bench = PwmBench::default();
        (
            Self {
                claim,
                sim: bench.sim.clone(),
            },
            bench,
        )
    }

    fn apply(&self, call: PwmCall, duty: u8) -> Result<(), AdapterError> {
        let mut sim = self.sim.borrow_mut();
        if sim.fail {
            return Err(AdapterError::failed(self.claim.path(), "unable to write to PWM"));
        }
        sim.calls.push(call);
        sim.duty = duty;
        Ok(())
    }
}

impl PwmChannel for DummyPwm {
    fn path(&self) -> &str {
        self.claim.path()
    }

    async fn pulse(
        &mut self,
        duty: u8,
        duration: Duration,
        hold_duty: u8,
    ) -> Result<(), AdapterError> {
        let call = PwmCall::Pulse {
            duty,
            duration,
            hold_duty,
        };
        self.apply(call, duty)?;
        Timer::after(duration).await;
        self.sim.borrow_mut().duty = hold_duty;
        Ok(())
    }

    async fn duty(&mut self, duty: u8) -> Result<(), AdapterError> {
        self.apply(PwmCall::Duty(duty), duty)
    }
}

// ───────────────────────────────────────────────────────────────
// LED
// ───────────────────────────────────────────────────────────────

#[derive(Default)]
struct LedSim {
    brightness: u32,
    max: u32,
    fail: bool,
    writes: Vec<u32>,
}

/// Simulated side of a [`DummyLed`].
#[derive(Clone, Default)]
pub struct LedBench {
    sim: Rc<RefCell<LedSim>>,
}

impl LedBench {
    pub fn brightness(&self) -> u32 {
        self.sim.borrow().brightness
    }

    /// Raw values the component asked for, before clamping.
    pub fn writes(&self) -> Vec<u32> {
        self.sim.borrow().writes.clone()
    }

    pub fn fail(&self, fail: bool) {
        self.sim.borrow_mut().fail = fail;
    }
}

/// LED that clamps writes to its maximum, like the kernel LED class.
pub struct DummyLed {
    claim: Claim,
    sim: Rc<RefCell<LedSim>>,
}

impl DummyLed {
    pub fn new(claim: Claim, max: u32) -> (Self, LedBench) {
        let bench = LedBench::default();
        bench.sim.borrow_mut().max = max;
        (
            Self {
                claim,
                sim: bench.sim.clone(),
            },
            bench,
        )
    }
}

impl LedChannel for DummyLed {
    fn path(&self) -> &str {
        self.claim.path()
    }

    async fn write(&mut self, brightness: u32) -> Result<u32, AdapterError> {
        let mut sim = self.sim.borrow_mut();
        if sim.fail {
            return Err(AdapterError::failed(self.claim.path(), "unable to write brightness"));
        }
        sim.writes.push(brightness);
        sim.brightness = brightness.min(sim.max);
        Ok(sim.brightness)
    }
}
