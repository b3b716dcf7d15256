//! BLE GATT Protocol Constants for SHOWBABY devices
//!
//! This module defines the advertised name and the GATT UUIDs used by the
//! SHOWBABY command characteristic.

/// Advertised name substring identifying a SHOWBABY device.
///
/// The device appends a unit suffix (e.g. "SHOWBABY-42"), so discovery
/// matches on a case-insensitive substring rather than the full name.
pub const DEVICE_NAME: &str = "SHOWBABY";

/// Command Service UUID (vendor range FFF0)
pub const SERVICE_UUID: &str = "0000FFF0-0000-1000-8000-00805F9B34FB";

/// Command Characteristic UUID (notify)
pub const COMMAND_UUID: &str = "0000FFF4-0000-1000-8000-00805F9B34FB";

/// Returns true when `name` identifies a SHOWBABY device.
pub fn matches_device_name(name: &str) -> bool {
    name.to_uppercase().contains(DEVICE_NAME)
}

#[cfg(test)]
mod tests {
    use super::matches_device_name;

    #[test]
    fn device_name_match_is_case_insensitive_substring() {
        assert!(matches_device_name("SHOWBABY"));
        assert!(matches_device_name("ShowBaby-42"));
        assert!(matches_device_name("nimble [showbaby-7]"));
        assert!(!matches_device_name("SHOWBAB"));
        assert!(!matches_device_name("FlowerCare"));
        assert!(!matches_device_name(""));
    }
}
