//! Fuzz target: console line parser and settings import
//!
//! Arbitrary text must either parse into a request or be rejected; any
//! settings that import successfully must pass validation.
//!
//! cargo fuzz run fuzz_console

#![no_main]

use ferraris::config::import_settings;
use ferraris::console::parse_line;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let _ = parse_line(text);

    if let Ok(config) = import_settings(text) {
        assert!(config.validate().is_ok(), "imported settings out of range");
    }
});
