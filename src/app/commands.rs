//! Inbound requests and their single-completion reply token.
//!
//! These are the five messages the experiment controller can send to any
//! component. A request travels with a [`Reply`]; the controller keeps the
//! matching [`PendingReply`] and awaits it.
//!
//! `Reply::send` consumes the token, so a component cannot answer twice.
//! Dropping an unanswered token answers with [`ProtocolError::NoReply`],
//! so a request is never left without an answer either.

use std::rc::Rc;

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::signal::Signal;
use serde_json::{Map, Value};

use crate::error::{Error, ProtocolError, Result};

/// Requests the controller can send to a component.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// Merge-apply the given fields into State.
    ChangeState(Map<String, Value>),
    /// Restore State to the snapshot taken after construction.
    ResetState,
    GetState,
    GetMeta,
    GetParams,
}

impl Request {
    /// Parse a wire-level `(kind, data)` pair.
    pub fn parse(kind: &str, data: Value) -> core::result::Result<Self, ProtocolError> {
        match kind {
            "change-state" => match data {
                Value::Object(fields) => Ok(Self::ChangeState(fields)),
                Value::Null => Ok(Self::ChangeState(Map::new())),
                other => Err(ProtocolError::Malformed(format!(
                    "change-state expects an object, got {other}"
                ))),
            },
            "reset-state" => Ok(Self::ResetState),
            "get-state" => Ok(Self::GetState),
            "get-meta" => Ok(Self::GetMeta),
            "get-params" => Ok(Self::GetParams),
            other => Err(ProtocolError::Unsupported(other.to_owned())),
        }
    }

    /// Wire-level name of this request.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ChangeState(_) => "change-state",
            Self::ResetState => "reset-state",
            Self::GetState => "get-state",
            Self::GetMeta => "get-meta",
            Self::GetParams => "get-params",
        }
    }

    /// `get-*` requests never mutate State and never emit events.
    pub fn is_read_only(&self) -> bool {
        matches!(self, Self::GetState | Self::GetMeta | Self::GetParams)
    }
}

type ReplySlot = Signal<NoopRawMutex, Result<Value>>;

/// Create a connected reply token and its awaitable counterpart.
pub fn reply_channel() -> (Reply, PendingReply) {
    let slot = Rc::new(ReplySlot::new());
    (
        Reply {
            slot: Some(slot.clone()),
        },
        PendingReply { slot },
    )
}

/// Component side of a request: answered exactly once.
#[must_use = "dropping a Reply answers the request with NoReply"]
pub struct Reply {
    slot: Option<Rc<ReplySlot>>,
}

impl Reply {
    pub fn send(mut self, result: Result<Value>) {
        if let Some(slot) = self.slot.take() {
            slot.signal(result);
        }
    }

    pub fn ok(self, value: Value) {
        self.send(Ok(value));
    }

    pub fn err(self, err: impl Into<Error>) {
        self.send(Err(err.into()));
    }
}

impl Drop for Reply {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            slot.signal(Err(ProtocolError::NoReply.into()));
        }
    }
}

impl core::fmt::Debug for Reply {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Reply")
            .field("answered", &self.slot.is_none())
            .finish()
    }
}

/// Controller side of a request.
pub struct PendingReply {
    slot: Rc<ReplySlot>,
}

impl PendingReply {
    /// Wait for the component's answer.
    pub async fn wait(self) -> Result<Value> {
        self.slot.wait().await
    }

    /// Take the answer if it has already arrived.
    pub fn try_take(&self) -> Option<Result<Value>> {
        self.slot.try_take()
    }
}
