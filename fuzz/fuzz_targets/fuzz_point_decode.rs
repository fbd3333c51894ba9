#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use modbus_bridge::{decode_point_value, ByteOrder, ValueType};

#[derive(Debug, Arbitrary)]
struct Input {
    value_type: u8,
    byte_order: u8,
    buf: Vec<u8>,
}

fuzz_target!(|input: Input| {
    let Some(value_type) = ValueType::from_code(i64::from(input.value_type % 5)) else {
        return;
    };
    let order = match input.byte_order % 4 {
        0 => ByteOrder::BigEndian,
        1 => ByteOrder::LittleEndian,
        2 => ByteOrder::BigEndianSwap,
        _ => ByteOrder::LittleEndianSwap,
    };
    if let Ok(value) = decode_point_value(&input.buf, value_type, order) {
        assert!(value_type == ValueType::String || value.byte_len() == input.buf.len());
    }
});
