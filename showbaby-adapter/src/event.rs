//! Inbound BLE stack events and outbound adapter actions
//!
//! The adapter consumes [`Event`]s from whatever BLE stack hosts it and
//! answers with [`Action`]s for that stack to execute. Both sides of the
//! contract are plain enums, so the adapter can be driven in tests without
//! a radio.

use uuid::Uuid;

/// A discovered peripheral: the stack's opaque id plus its advertised name.
///
/// The adapter only ever borrows this handle; the peripheral itself is
/// owned by the BLE stack and invalidated on disconnect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeripheralRef {
    pub id: String,
    pub name: String,
}

/// Power/authorization state of the BLE central, as reported by the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CentralStatus {
    PoweredOn,
    PoweredOff,
    Unsupported,
    Unauthorized,
    Resetting,
    Unknown,
}

impl CentralStatus {
    /// Human-readable status message for alert/banner display.
    pub fn message(&self) -> &'static str {
        match self {
            CentralStatus::PoweredOn => "Bluetooth LE is turned on and ready for communication.",
            CentralStatus::PoweredOff => "Bluetooth on this device is currently powered off.",
            CentralStatus::Unsupported => "This device does not support Bluetooth Low Energy.",
            CentralStatus::Unauthorized => {
                "This app is not authorized to use Bluetooth Low Energy."
            }
            CentralStatus::Resetting => "The BLE manager is resetting; a state update is pending.",
            CentralStatus::Unknown => "The state of the BLE manager is unknown.",
        }
    }
}

/// Events delivered by the BLE stack collaborator.
///
/// Error-carrying variants hold the stack's failure description as a plain
/// string; `None` means the callback reported success.
#[derive(Debug, Clone)]
pub enum Event {
    /// The central's power/authorization state changed.
    CentralStatusChanged(CentralStatus),
    /// A peripheral was seen while scanning. `name` is the advertised
    /// local name, absent when the advertisement carried none.
    PeripheralDiscovered { id: String, name: Option<String> },
    /// A connection requested via [`Action::Connect`] completed.
    Connected { id: String },
    /// A connection requested via [`Action::Connect`] failed.
    ConnectFailed { id: String, reason: String },
    /// An established connection was torn down.
    Disconnected { id: String, reason: Option<String> },
    /// Service enumeration finished for a connected peripheral.
    ServicesDiscovered {
        id: String,
        services: Vec<Uuid>,
        error: Option<String>,
    },
    /// Characteristic enumeration finished for one service.
    CharacteristicsDiscovered {
        service: Uuid,
        characteristics: Vec<Uuid>,
        error: Option<String>,
    },
    /// A subscribed characteristic pushed a new value.
    ValueUpdated {
        characteristic: Uuid,
        payload: Vec<u8>,
        error: Option<String>,
    },
}

/// Requests the adapter issues back to the BLE stack.
///
/// All are fire-and-forget: results arrive later as [`Event`]s. An event
/// that needs no reaction simply yields no actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Begin scanning for peripherals.
    StartScan,
    /// Stop scanning (issued as soon as the target is found, to save power).
    StopScan,
    /// Connect to the named peripheral.
    Connect { id: String },
    /// Enumerate services, all of them when `filter` is `None`.
    DiscoverServices { id: String, filter: Option<Uuid> },
    /// Enumerate characteristics of one service, all of them when `filter`
    /// is `None`.
    DiscoverCharacteristics { service: Uuid, filter: Option<Uuid> },
    /// Enable notifications on a characteristic.
    SubscribeNotify { characteristic: Uuid },
    /// Surface a newly seen peripheral to the presentation layer
    /// (list-all-discovered mode only).
    Record(PeripheralRef),
}
