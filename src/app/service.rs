//! Component service: the shared request/state/publish contract.
//!
//! Every device variant (feeder, lights, key panel, audio player)
//! implements [`Device`]. [`ComponentHandle::spawn`] moves the device into
//! its own dispatch task on the apparatus executor. The task owns the
//! device, its [`Scheduler`], and its event sink, and is the only place
//! any of them are touched.
//!
//! ```text
//!   req()/disconnect() ──▶ inbox ──┐
//!                                  │      ┌───────────────────────┐
//!   Scheduler::expired() ──────────┼─or──▶│  dispatch loop        │──▶ EventSink
//!                                  │      │  one input at a time  │
//!   Device::next_input() ──────────┘      └───────────────────────┘
//!     (edge watches)                               │
//!                                                  ▼ Reply (exactly once)
//! ```
//!
//! ## Contract enforced here, not in the variants
//!
//! - One input is handled to completion before the next is taken, so at
//!   most one hardware-mutating operation is in flight per component.
//!   Requests queue behind it; a full inbox rejects with `Busy`.
//! - State is snapshotted before and after each handler; one
//!   `state-changed` event carrying only the changed fields is published
//!   when (and only when) the snapshot differs.
//! - Hardware errors are published as a `warning` and returned in the
//!   reply. Protocol errors go to the reply only.
//! - `get-*` requests never reach a mutating handler.
//! - Disconnect lets the device park its hardware (e.g. a feeder drops to
//!   zero duty) before it is dropped; nothing is published afterwards.

use core::cell::Cell;
use core::fmt::Debug;
use std::rc::Rc;

use edge_executor::LocalExecutor;
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::channel::{Channel, TrySendError};
use futures_lite::future;
use log::{debug, info, warn};
use serde_json::{Map, Value};

use crate::error::{ProtocolError, Result};
use crate::scheduler::Scheduler;

use super::commands::{PendingReply, Reply, Request, reply_channel};
use super::events::DeviceEvent;
use super::meta::Meta;
use super::ports::EventSink;

/// Requests that may wait behind an in-flight operation.
pub const INBOX_DEPTH: usize = 16;

// ───────────────────────────────────────────────────────────────
// Device trait
// ───────────────────────────────────────────────────────────────

/// What a handler can reach besides its own device: the component's
/// timers and a way to publish warnings.
pub struct Context<'a, K> {
    addr: &'a str,
    pub timers: &'a mut Scheduler<K>,
    sink: &'a mut dyn EventSink,
}

impl<K> Context<'_, K> {
    pub fn addr(&self) -> &str {
        self.addr
    }

    /// Publish a non-fatal `warning` without failing the current handler.
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("{}: {}", self.addr, message);
        self.sink.emit(&DeviceEvent::warning(self.addr, message));
    }
}

/// One device variant's state machine.
///
/// Handlers mutate State only after the hardware confirms; on error they
/// leave it as it was.
#[allow(async_fn_in_trait)]
pub trait Device {
    /// Keys of this variant's timers.
    type Timer: Copy + Eq + Debug;
    /// Autonomous hardware input (edges, polls).
    type Input;

    fn meta(&self) -> &Meta;

    /// Params as a JSON object (read-only after construction).
    fn params(&self) -> Value;

    /// Current State as a JSON object. Keys are a subset of
    /// `meta().variables`.
    fn state(&self) -> Map<String, Value>;

    /// Shallow-merge `data` into State.
    async fn change_state(
        &mut self,
        ctx: &mut Context<'_, Self::Timer>,
        data: &Map<String, Value>,
    ) -> Result<()>;

    /// Restore the snapshot taken after construction.
    async fn reset_state(&mut self, ctx: &mut Context<'_, Self::Timer>) -> Result<()>;

    async fn on_timer(&mut self, ctx: &mut Context<'_, Self::Timer>, timer: Self::Timer)
    -> Result<()>;

    /// Wait for the next hardware input. Pends forever for variants
    /// without autonomous input.
    async fn next_input(&mut self) -> Self::Input {
        future::pending().await
    }

    async fn on_input(
        &mut self,
        ctx: &mut Context<'_, Self::Timer>,
        input: Self::Input,
    ) -> Result<()> {
        let _ = (ctx, input);
        Ok(())
    }

    /// Put the hardware in a safe state and stop watches before the device
    /// is dropped. Timers are already cleared. State changes made here are
    /// published like any other; an error becomes a `warning` but does not
    /// stop the disconnect.
    async fn release(&mut self, ctx: &mut Context<'_, Self::Timer>) -> Result<()> {
        let _ = ctx;
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Inbox
// ───────────────────────────────────────────────────────────────

enum Message {
    Request(Request, Reply),
    Disconnect(Reply),
}

impl Message {
    fn reject(self, err: ProtocolError) {
        match self {
            Self::Request(_, reply) | Self::Disconnect(reply) => reply.err(err),
        }
    }
}

type Inbox = Channel<NoopRawMutex, Message, INBOX_DEPTH>;

enum Wake<K, I> {
    Message(Message),
    Timer(K),
    Input(I),
}

// ───────────────────────────────────────────────────────────────
// ComponentHandle
// ───────────────────────────────────────────────────────────────

/// Controller-side handle to a running component. Cheap to clone.
#[derive(Clone)]
pub struct ComponentHandle {
    addr: Rc<str>,
    inbox: Rc<Inbox>,
    alive: Rc<Cell<bool>>,
}

impl ComponentHandle {
    /// Start `device`'s dispatch task on `executor`. The initial State is
    /// published once when the task first runs.
    pub fn spawn<'a, D, S>(executor: &LocalExecutor<'a>, addr: &str, device: D, sink: S) -> Self
    where
        D: Device + 'a,
        S: EventSink + 'a,
    {
        let handle = Self {
            addr: Rc::from(addr),
            inbox: Rc::new(Channel::new()),
            alive: Rc::new(Cell::new(true)),
        };
        executor
            .spawn(dispatch(
                handle.addr.clone(),
                device,
                sink,
                handle.inbox.clone(),
                handle.alive.clone(),
            ))
            .detach();
        handle
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// False once `disconnect` has been processed.
    pub fn is_connected(&self) -> bool {
        self.alive.get()
    }

    /// Queue `request`; `reply` is answered exactly once, possibly right
    /// away with `Busy` or `Disconnected`.
    pub fn send(&self, request: Request, reply: Reply) {
        if !self.alive.get() {
            reply.err(ProtocolError::Disconnected);
            return;
        }
        if let Err(TrySendError::Full(msg)) = self.inbox.try_send(Message::Request(request, reply))
        {
            warn!("{}: request queue full, rejecting", self.addr);
            msg.reject(ProtocolError::Busy);
        }
    }

    /// Queue `request` and return the awaitable answer.
    pub fn submit(&self, request: Request) -> PendingReply {
        let (reply, pending) = reply_channel();
        self.send(request, reply);
        pending
    }

    pub async fn request(&self, request: Request) -> Result<Value> {
        self.submit(request).wait().await
    }

    /// Wire-level entry point: `kind` is one of the five message names.
    pub async fn req(&self, kind: &str, data: Value) -> Result<Value> {
        let request = Request::parse(kind, data)?;
        self.request(request).await
    }

    /// Cancel timers, stop watches, release hardware. After this returns
    /// the component publishes nothing further. Safe to call repeatedly.
    pub async fn disconnect(&self) {
        if !self.alive.get() {
            return;
        }
        let (reply, pending) = reply_channel();
        self.inbox.send(Message::Disconnect(reply)).await;
        if !self.alive.get() {
            // The loop exited while we waited for queue space; nobody else
            // will drain what we just queued.
            drain(&self.inbox);
        }
        let _ = pending.wait().await;
    }
}

fn drain(inbox: &Inbox) {
    while let Ok(msg) = inbox.try_receive() {
        msg.reject(ProtocolError::Disconnected);
    }
}

// ───────────────────────────────────────────────────────────────
// Dispatch loop
// ───────────────────────────────────────────────────────────────

async fn dispatch<D: Device, S: EventSink>(
    addr: Rc<str>,
    mut device: D,
    mut sink: S,
    inbox: Rc<Inbox>,
    alive: Rc<Cell<bool>>,
) {
    let mut timers: Scheduler<D::Timer> = Scheduler::new(&*addr);

    info!("{}: {} component started", addr, device.meta().kind);
    sink.emit(&DeviceEvent::state_changed(&addr, device.state()));

    loop {
        let wake = {
            let message = async { Wake::Message(inbox.receive().await) };
            let timer = async { Wake::Timer(timers.expired().await) };
            let input = async { Wake::Input(device.next_input().await) };
            future::or(message, future::or(timer, input)).await
        };

        match wake {
            Wake::Message(Message::Request(request, reply)) => {
                debug!("{}: req {}", addr, request.kind());
                handle_request(&addr, &mut device, &mut timers, &mut sink, request, reply).await;
            }
            Wake::Message(Message::Disconnect(reply)) => {
                info!("{}: disconnecting", addr);
                timers.clear();
                let before = device.state();
                let result = {
                    let mut ctx = Context {
                        addr: &addr,
                        timers: &mut timers,
                        sink: &mut sink,
                    };
                    device.release(&mut ctx).await
                };
                settle(&addr, &mut sink, &before, &device.state(), result.as_ref().err());
                timers.clear();
                drop(device);
                alive.set(false);
                drain(&inbox);
                reply.ok(Value::Null);
                return;
            }
            Wake::Timer(key) => {
                let before = device.state();
                let result = {
                    let mut ctx = Context {
                        addr: &addr,
                        timers: &mut timers,
                        sink: &mut sink,
                    };
                    device.on_timer(&mut ctx, key).await
                };
                settle(&addr, &mut sink, &before, &device.state(), result.as_ref().err());
            }
            Wake::Input(input) => {
                let before = device.state();
                let result = {
                    let mut ctx = Context {
                        addr: &addr,
                        timers: &mut timers,
                        sink: &mut sink,
                    };
                    device.on_input(&mut ctx, input).await
                };
                settle(&addr, &mut sink, &before, &device.state(), result.as_ref().err());
            }
        }
    }
}

async fn handle_request<D: Device, S: EventSink>(
    addr: &str,
    device: &mut D,
    timers: &mut Scheduler<D::Timer>,
    sink: &mut S,
    request: Request,
    reply: Reply,
) {
    match request {
        Request::GetState => reply.ok(Value::Object(device.state())),
        Request::GetParams => reply.ok(device.params()),
        Request::GetMeta => match serde_json::to_value(device.meta()) {
            Ok(meta) => reply.ok(meta),
            Err(e) => reply.err(ProtocolError::Malformed(e.to_string())),
        },
        Request::ChangeState(_) | Request::ResetState => {
            let before = device.state();
            let result = {
                let mut ctx = Context {
                    addr,
                    timers,
                    sink: &mut *sink,
                };
                match &request {
                    Request::ChangeState(data) => device.change_state(&mut ctx, data).await,
                    _ => device.reset_state(&mut ctx).await,
                }
            };
            settle(addr, sink, &before, &device.state(), result.as_ref().err());
            reply.send(result.map(|()| Value::Null));
        }
    }
}

/// Publish the state diff (if any) and a warning for hardware failures.
fn settle(
    addr: &str,
    sink: &mut impl EventSink,
    before: &Map<String, Value>,
    after: &Map<String, Value>,
    error: Option<&crate::error::Error>,
) {
    let changed = changed_fields(before, after);
    if !changed.is_empty() {
        sink.emit(&DeviceEvent::state_changed(addr, changed));
    }
    if let Some(err) = error {
        if err.is_hardware() {
            warn!("{}: {}", addr, err);
            sink.emit(&DeviceEvent::warning(addr, err.to_string()));
        } else {
            debug!("{}: request failed: {}", addr, err);
        }
    }
}

/// Fields of `after` whose value differs from (or is missing in) `before`.
pub fn changed_fields(before: &Map<String, Value>, after: &Map<String, Value>) -> Map<String, Value> {
    after
        .iter()
        .filter(|(k, v)| before.get(*k) != Some(*v))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}
