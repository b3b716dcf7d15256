//! SHOWBABY protocol - command signatures and payload decoding
//!
//! A SHOWBABY peripheral pushes short binary payloads over its command
//! characteristic. Each control input on the device (trigger, button, pump
//! switch) produces one payload on press and one on release. This crate
//! holds the fixed signature table and decodes payloads into [`CommandCode`]
//! values; it knows nothing about radios or GATT plumbing.

pub mod ble;

use std::fmt;

/// A decoded SHOWBABY control command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandCode {
    TriggerDown,
    TriggerUp,
    ButtonDown,
    ButtonUp,
    PumpDown,
    PumpUp,
}

impl CommandCode {
    /// Human-readable label for list rendering.
    pub fn label(&self) -> &'static str {
        match self {
            CommandCode::TriggerDown => "Trigger Down",
            CommandCode::TriggerUp => "Trigger Up",
            CommandCode::ButtonDown => "Button Down",
            CommandCode::ButtonUp => "Button Up",
            CommandCode::PumpDown => "Pump Down",
            CommandCode::PumpUp => "Pump Up",
        }
    }
}

impl fmt::Display for CommandCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The fixed command signature table: base64 canonical form of each payload
/// the device emits, paired with its command code.
///
/// The forms are kept byte-for-byte as the device firmware documents them;
/// two of them carry nonstandard single-`=` padding, so decoding must ignore
/// trailing padding rather than insist on canonical base64.
pub const COMMAND_SIGNATURES: [(&str, CommandCode); 6] = [
    ("QjJET1dO", CommandCode::TriggerDown),
    ("QjJVUA=", CommandCode::TriggerUp),
    ("QjRET1dO", CommandCode::ButtonDown),
    ("QjRVUA=", CommandCode::ButtonUp),
    ("QjNET1dO", CommandCode::PumpDown),
    ("QjNVUA=", CommandCode::PumpUp),
];

/// Decode a canonical signature form into the raw payload bytes it names.
pub fn decode_signature(canonical: &str) -> Option<Vec<u8>> {
    let trimmed = canonical.trim_end_matches('=');
    data_encoding::BASE64_NOPAD.decode(trimmed.as_bytes()).ok()
}

/// Base64 canonical form of a payload, for diagnostics.
pub fn canonical_form(payload: &[u8]) -> String {
    data_encoding::BASE64.encode(payload)
}

/// Immutable payload-to-command lookup table, built from
/// [`COMMAND_SIGNATURES`].
pub struct CommandTable {
    entries: Vec<(Vec<u8>, CommandCode)>,
}

impl CommandTable {
    /// Build the table, panicking if the built-in signature list is
    /// malformed or contains colliding payloads.
    pub fn new() -> Self {
        let mut entries: Vec<(Vec<u8>, CommandCode)> =
            Vec::with_capacity(COMMAND_SIGNATURES.len());
        for (canonical, code) in COMMAND_SIGNATURES {
            let payload =
                decode_signature(canonical).expect("invalid signature in showbaby_proto");
            assert!(
                entries.iter().all(|(existing, _)| *existing != payload),
                "colliding signature in showbaby_proto: {canonical}"
            );
            entries.push((payload, code));
        }
        Self { entries }
    }

    /// Look up a payload. Returns `None` for anything outside the table;
    /// the command characteristic multiplexes other traffic, so unknown
    /// payloads are expected and not an error.
    pub fn decode(&self, payload: &[u8]) -> Option<CommandCode> {
        self.entries
            .iter()
            .find(|(signature, _)| signature == payload)
            .map(|(_, code)| *code)
    }
}

impl Default for CommandTable {
    fn default() -> Self {
        Self::new()
    }
}
