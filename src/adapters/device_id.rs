//! Device identity derived from the ESP32 factory MAC address.
//!
//! The system ID is the last three MAC bytes in uppercase hex (`A1B2C3`).
//! It is stable across reboots and names the MQTT topic, the debug
//! exporter tag and the provisioning access point.

use core::fmt::Write;

/// Six hex digits.
pub type SystemId = heapless::String<8>;

/// Full 6-byte MAC address.
pub type MacAddress = [u8; 6];

/// Read the factory MAC address from eFuse.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
    unsafe {
        esp_idf_svc::sys::esp_efuse_mac_get_default(mac.as_mut_ptr());
    }
    mac
}

/// Simulation: returns a deterministic fake MAC.
#[cfg(not(target_os = "espidf"))]
pub fn read_mac() -> MacAddress {
    [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE]
}

pub fn system_id(mac: &MacAddress) -> SystemId {
    let mut id = SystemId::new();
    let _ = write!(id, "{:02X}{:02X}{:02X}", mac[3], mac[4], mac[5]);
    id
}

/// Access-point name used for provisioning, e.g. `FerrarisMeter-EFCAFE`.
pub fn ap_name(mac: &MacAddress) -> heapless::String<32> {
    let mut name = heapless::String::<32>::new();
    let _ = write!(name, "FerrarisMeter-{}", system_id(mac));
    name
}
