//! Event bus utilities providing fan-out to telemetry sinks.
//!
//! The module is organised around a flume-backed [`EventBus`] that broadcasts
//! every [`Event`] to its configured sinks from a background listener task.
//! Producers treat the bus as fire-and-forget: a run never fails because
//! telemetry could not be recorded.

pub mod bus;
pub mod event;
pub mod sink;

pub use bus::EventBus;
pub use event::{Event, InvokerEvent, InvokerEventScope, StageEvent};
pub use sink::{ChannelSink, EventSink, MemorySink, StdOutSink};
