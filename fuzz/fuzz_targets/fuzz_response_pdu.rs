#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use modbus_bridge::{ModbusFunction, ModbusResponse};

#[derive(Debug, Arbitrary)]
struct Input {
    function: u8,
    quantity: u16,
    pdu: Vec<u8>,
}

fuzz_target!(|input: Input| {
    let Ok(function) = ModbusFunction::from_u8(input.function) else {
        return;
    };
    if let Ok(response) = ModbusResponse::from_pdu(1, &input.pdu, function) {
        let _ = response.parse_bits(input.quantity);
        let _ = response.parse_registers(input.quantity);
        let _ = response.into_result();
    }
});
