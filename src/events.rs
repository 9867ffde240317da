//! Event publisher: fan-out of component events to subscribers.
//!
//! Every component publishes through a clone of one [`Publisher`]. The
//! publisher forwards each event to all subscribed sinks in subscription
//! order; zero subscribers is valid.
//!
//! ```text
//! ┌──────────────┐
//! │ feeder_left  │──┐
//! ├──────────────┤  │    ┌────────────┐     ┌───────────────┐
//! │ house_lights │──┼───▶│ Publisher  │──┬─▶│ LogEventSink  │
//! ├──────────────┤  │    └────────────┘  │  ├───────────────┤
//! │ keys         │──┘                    └─▶│ relay / tests │
//! └──────────────┘                           └───────────────┘
//! ```
//!
//! Everything runs on the apparatus executor thread, so subscribers are
//! held behind `Rc<RefCell<..>>`. A sink must not publish re-entrantly
//! from inside `emit`.

use std::cell::RefCell;
use std::rc::Rc;

use crate::app::events::DeviceEvent;
use crate::app::ports::EventSink;

/// Cloneable fan-out sink.
#[derive(Clone, Default)]
pub struct Publisher {
    subscribers: Rc<RefCell<Vec<Box<dyn EventSink>>>>,
}

impl Publisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber. It receives every event published afterwards.
    pub fn subscribe(&self, sink: impl EventSink + 'static) {
        self.subscribers.borrow_mut().push(Box::new(sink));
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }
}

impl EventSink for Publisher {
    fn emit(&mut self, event: &DeviceEvent) {
        for sink in self.subscribers.borrow_mut().iter_mut() {
            sink.emit(event);
        }
    }
}

/// Sink that appends every event to a shared list. Cloning shares the list.
#[derive(Clone, Default)]
pub struct EventLog {
    events: Rc<RefCell<Vec<DeviceEvent>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far.
    pub fn snapshot(&self) -> Vec<DeviceEvent> {
        self.events.borrow().clone()
    }

    /// Remove and return everything recorded so far.
    pub fn take(&self) -> Vec<DeviceEvent> {
        core::mem::take(&mut *self.events.borrow_mut())
    }

    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }
}

impl EventSink for EventLog {
    fn emit(&mut self, event: &DeviceEvent) {
        self.events.borrow_mut().push(event.clone());
    }
}
