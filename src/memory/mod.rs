//! Scope-keyed runtime state shared between message tasks.
//!
//! Each piece sits behind a trait so a multi-instance deployment can swap the
//! in-process implementation for a shared store. Writes are last-writer-wins.

pub mod charts;
pub mod gate;
pub mod notifications;

pub use charts::{ChartMemory, InMemoryChartMemory};
pub use gate::{MessageGate, RecentMessages};
pub use notifications::{InMemoryNotifications, Notification, NotificationBoard};
