#![no_main]

use libfuzzer_sys::fuzz_target;
use modbus_bridge::{parse_channel_config, parse_point_descriptor};

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = parse_channel_config(text);
        if let Ok(point) = parse_point_descriptor(text) {
            assert!(point.quantity >= 1);
        }
    }
});
