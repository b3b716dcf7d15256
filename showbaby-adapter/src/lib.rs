//! SHOWBABY peripheral command adapter
//!
//! The sans-io core of the listener: a single-threaded state machine that
//! consumes raw BLE stack events (peripheral discovered, connected, services
//! discovered, value updated, ...) and answers with the requests the stack
//! should issue next (stop scanning, connect, subscribe, ...), decoding
//! command-characteristic payloads into [`CommandCode`]s along the way.
//!
//! Feed it [`Event`]s, execute the [`Action`]s it returns:
//!
//! ```
//! use showbaby_adapter::{Action, AdapterConfig, Event, PeripheralCommandAdapter};
//!
//! let mut adapter = PeripheralCommandAdapter::new(AdapterConfig::default());
//! let actions = adapter.handle(Event::PeripheralDiscovered {
//!     id: "hci0/dev_01".into(),
//!     name: Some("SHOWBABY-42".into()),
//! });
//! assert_eq!(actions[0], Action::StopScan);
//! ```
//!
//! The adapter holds no locks and never blocks: it expects to run on the
//! single queue that delivers BLE callbacks, and every request it emits is
//! fire-and-forget with the result arriving later as another event.

mod adapter;
mod error;
mod event;

pub use adapter::{AdapterConfig, ConnectionState, PeripheralCommandAdapter};
pub use error::AdapterError;
pub use event::{Action, CentralStatus, Event, PeripheralRef};

// Re-export commonly used types
pub use showbaby_proto::{CommandCode, CommandTable};
