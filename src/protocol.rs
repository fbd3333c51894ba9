//! Modbus application layer: function codes, requests and responses.
//!
//! Requests and responses are transport-agnostic; the TCP and RTU transports
//! wrap the same PDU in an MBAP header or in slave id + CRC respectively.

use std::fmt;

use bytes::{BufMut, BytesMut};

use crate::constants::{
    EXCEPTION_FLAG, FC_READ_COILS, FC_READ_DISCRETE_INPUTS, FC_READ_HOLDING_REGISTERS,
    FC_READ_INPUT_REGISTERS, FC_WRITE_MULTIPLE_COILS, FC_WRITE_MULTIPLE_REGISTERS,
    FC_WRITE_SINGLE_COIL, FC_WRITE_SINGLE_REGISTER, MAX_PDU_SIZE,
};
use crate::error::{ModbusError, ModbusResult};

/// Modbus slave/unit identifier.
pub type SlaveId = u8;

/// Function codes understood by the wire client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModbusFunction {
    ReadCoils,
    ReadDiscreteInputs,
    ReadHoldingRegisters,
    ReadInputRegisters,
    WriteSingleCoil,
    WriteSingleRegister,
    WriteMultipleCoils,
    WriteMultipleRegisters,
}

impl ModbusFunction {
    pub fn to_u8(self) -> u8 {
        match self {
            Self::ReadCoils => FC_READ_COILS,
            Self::ReadDiscreteInputs => FC_READ_DISCRETE_INPUTS,
            Self::ReadHoldingRegisters => FC_READ_HOLDING_REGISTERS,
            Self::ReadInputRegisters => FC_READ_INPUT_REGISTERS,
            Self::WriteSingleCoil => FC_WRITE_SINGLE_COIL,
            Self::WriteSingleRegister => FC_WRITE_SINGLE_REGISTER,
            Self::WriteMultipleCoils => FC_WRITE_MULTIPLE_COILS,
            Self::WriteMultipleRegisters => FC_WRITE_MULTIPLE_REGISTERS,
        }
    }

    pub fn from_u8(code: u8) -> ModbusResult<Self> {
        match code {
            FC_READ_COILS => Ok(Self::ReadCoils),
            FC_READ_DISCRETE_INPUTS => Ok(Self::ReadDiscreteInputs),
            FC_READ_HOLDING_REGISTERS => Ok(Self::ReadHoldingRegisters),
            FC_READ_INPUT_REGISTERS => Ok(Self::ReadInputRegisters),
            FC_WRITE_SINGLE_COIL => Ok(Self::WriteSingleCoil),
            FC_WRITE_SINGLE_REGISTER => Ok(Self::WriteSingleRegister),
            FC_WRITE_MULTIPLE_COILS => Ok(Self::WriteMultipleCoils),
            FC_WRITE_MULTIPLE_REGISTERS => Ok(Self::WriteMultipleRegisters),
            other => Err(ModbusError::invalid_function(other)),
        }
    }

    /// FC01-FC04
    pub fn is_read(self) -> bool {
        matches!(
            self,
            Self::ReadCoils
                | Self::ReadDiscreteInputs
                | Self::ReadHoldingRegisters
                | Self::ReadInputRegisters
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::ReadCoils => "Read Coils",
            Self::ReadDiscreteInputs => "Read Discrete Inputs",
            Self::ReadHoldingRegisters => "Read Holding Registers",
            Self::ReadInputRegisters => "Read Input Registers",
            Self::WriteSingleCoil => "Write Single Coil",
            Self::WriteSingleRegister => "Write Single Register",
            Self::WriteMultipleCoils => "Write Multiple Coils",
            Self::WriteMultipleRegisters => "Write Multiple Registers",
        }
    }
}

impl fmt::Display for ModbusFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FC{:02X} ({})", self.to_u8(), self.name())
    }
}

/// A single Modbus request.
///
/// `data` carries the payload that follows address/quantity: the coil or
/// register value for FC05/06, the packed values for FC15/16 (the byte count
/// is added during encoding). Reads have no payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ModbusRequest {
    pub slave_id: SlaveId,
    pub function: ModbusFunction,
    pub address: u16,
    pub quantity: u16,
    pub data: Vec<u8>,
}

impl ModbusRequest {
    pub fn new_read(slave_id: SlaveId, function: ModbusFunction, address: u16, quantity: u16) -> Self {
        Self {
            slave_id,
            function,
            address,
            quantity,
            data: Vec::new(),
        }
    }

    /// Append the request PDU to `buf`.
    pub fn encode_pdu(&self, buf: &mut BytesMut) -> ModbusResult<()> {
        let start = buf.len();
        buf.put_u8(self.function.to_u8());
        buf.put_u16(self.address);

        match self.function {
            ModbusFunction::ReadCoils
            | ModbusFunction::ReadDiscreteInputs
            | ModbusFunction::ReadHoldingRegisters
            | ModbusFunction::ReadInputRegisters => {
                buf.put_u16(self.quantity);
            }
            ModbusFunction::WriteSingleCoil | ModbusFunction::WriteSingleRegister => {
                if self.data.len() != 2 {
                    return Err(ModbusError::invalid_data(format!(
                        "{} expects a 2-byte value, got {} bytes",
                        self.function,
                        self.data.len()
                    )));
                }
                buf.put_slice(&self.data);
            }
            ModbusFunction::WriteMultipleCoils | ModbusFunction::WriteMultipleRegisters => {
                let byte_count = u8::try_from(self.data.len()).map_err(|_| {
                    ModbusError::invalid_data(format!("payload too large: {} bytes", self.data.len()))
                })?;
                buf.put_u16(self.quantity);
                buf.put_u8(byte_count);
                buf.put_slice(&self.data);
            }
        }

        let pdu_len = buf.len() - start;
        if pdu_len > MAX_PDU_SIZE {
            return Err(ModbusError::invalid_data(format!(
                "PDU too large: {} bytes (max {})",
                pdu_len, MAX_PDU_SIZE
            )));
        }
        Ok(())
    }
}

/// A decoded Modbus response.
///
/// `data` holds everything after the function code; for reads that starts
/// with the byte count.
#[derive(Debug, Clone, PartialEq)]
pub struct ModbusResponse {
    pub slave_id: SlaveId,
    pub function: ModbusFunction,
    data: Vec<u8>,
    exception: Option<u8>,
}

impl ModbusResponse {
    pub fn new_success(slave_id: SlaveId, function: ModbusFunction, data: Vec<u8>) -> Self {
        Self {
            slave_id,
            function,
            data,
            exception: None,
        }
    }

    pub fn new_exception(slave_id: SlaveId, function: ModbusFunction, code: u8) -> Self {
        Self {
            slave_id,
            function,
            data: Vec::new(),
            exception: Some(code),
        }
    }

    /// Parse a response PDU received for a request with function `expected`.
    pub fn from_pdu(slave_id: SlaveId, pdu: &[u8], expected: ModbusFunction) -> ModbusResult<Self> {
        let (&fc, rest) = pdu
            .split_first()
            .ok_or_else(|| ModbusError::protocol("empty response PDU"))?;

        if fc & 0x7F != expected.to_u8() {
            return Err(ModbusError::protocol(format!(
                "function code mismatch: expected 0x{:02X}, got 0x{:02X}",
                expected.to_u8(),
                fc
            )));
        }

        if fc & EXCEPTION_FLAG != 0 {
            let code = *rest
                .first()
                .ok_or_else(|| ModbusError::protocol("exception response without code"))?;
            return Ok(Self::new_exception(slave_id, expected, code));
        }

        Ok(Self::new_success(slave_id, expected, rest.to_vec()))
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn is_exception(&self) -> bool {
        self.exception.is_some()
    }

    pub fn exception_code(&self) -> Option<u8> {
        self.exception
    }

    /// Turn an exception response into an error.
    pub fn into_result(self) -> ModbusResult<Self> {
        match self.exception {
            Some(code) => Err(ModbusError::exception(self.function.to_u8(), code)),
            None => Ok(self),
        }
    }

    /// Byte-count prefixed payload of a read response.
    fn read_payload(&self, expected_bytes: usize) -> ModbusResult<&[u8]> {
        let (&byte_count, payload) = self
            .data
            .split_first()
            .ok_or_else(|| ModbusError::protocol("read response without byte count"))?;

        if byte_count as usize != expected_bytes || payload.len() != expected_bytes {
            return Err(ModbusError::protocol(format!(
                "byte count mismatch: expected {}, header says {}, payload has {}",
                expected_bytes,
                byte_count,
                payload.len()
            )));
        }
        Ok(payload)
    }

    /// Unpack FC01/FC02 data into exactly `quantity` bits (LSB first).
    pub fn parse_bits(&self, quantity: u16) -> ModbusResult<Vec<bool>> {
        let quantity = quantity as usize;
        let payload = self.read_payload(quantity.div_ceil(8))?;
        Ok((0..quantity)
            .map(|i| payload[i / 8] & (1 << (i % 8)) != 0)
            .collect())
    }

    /// Unpack FC03/FC04 data into exactly `quantity` registers.
    pub fn parse_registers(&self, quantity: u16) -> ModbusResult<Vec<u16>> {
        let payload = self.read_payload(quantity as usize * 2)?;
        Ok(payload
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect())
    }

    /// Check that a write response echoes the request address.
    pub fn check_write_echo(&self, address: u16) -> ModbusResult<()> {
        if self.data.len() < 4 {
            return Err(ModbusError::protocol(format!(
                "write response too short: {} bytes",
                self.data.len()
            )));
        }
        let echoed = u16::from_be_bytes([self.data[0], self.data[1]]);
        if echoed != address {
            return Err(ModbusError::protocol(format!(
                "write response address mismatch: sent {}, echoed {}",
                address, echoed
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(request: &ModbusRequest) -> Vec<u8> {
        let mut buf = BytesMut::new();
        request.encode_pdu(&mut buf).unwrap();
        buf.to_vec()
    }

    #[test]
    fn test_function_code_mapping() {
        for code in [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x0F, 0x10] {
            assert_eq!(ModbusFunction::from_u8(code).unwrap().to_u8(), code);
        }
        assert_eq!(
            ModbusFunction::from_u8(0x17),
            Err(ModbusError::InvalidFunction { code: 0x17 })
        );
        assert!(ModbusFunction::ReadInputRegisters.is_read());
        assert!(!ModbusFunction::WriteSingleCoil.is_read());
    }

    #[test]
    fn test_encode_read_request() {
        let request = ModbusRequest::new_read(1, ModbusFunction::ReadHoldingRegisters, 0x006B, 3);
        assert_eq!(encode(&request), vec![0x03, 0x00, 0x6B, 0x00, 0x03]);
    }

    #[test]
    fn test_encode_write_single_coil() {
        let request = ModbusRequest {
            slave_id: 1,
            function: ModbusFunction::WriteSingleCoil,
            address: 0x00AC,
            quantity: 1,
            data: vec![0xFF, 0x00],
        };
        assert_eq!(encode(&request), vec![0x05, 0x00, 0xAC, 0xFF, 0x00]);
    }

    #[test]
    fn test_encode_write_multiple_registers() {
        let request = ModbusRequest {
            slave_id: 1,
            function: ModbusFunction::WriteMultipleRegisters,
            address: 0x0001,
            quantity: 2,
            data: vec![0x00, 0x0A, 0x01, 0x02],
        };
        assert_eq!(
            encode(&request),
            vec![0x10, 0x00, 0x01, 0x00, 0x02, 0x04, 0x00, 0x0A, 0x01, 0x02]
        );
    }

    #[test]
    fn test_encode_rejects_bad_single_write_payload() {
        let request = ModbusRequest {
            slave_id: 1,
            function: ModbusFunction::WriteSingleRegister,
            address: 0,
            quantity: 1,
            data: vec![0x01],
        };
        let mut buf = BytesMut::new();
        assert!(request.encode_pdu(&mut buf).is_err());
    }

    #[test]
    fn test_parse_registers() {
        let pdu = [0x03, 0x04, 0x00, 0x01, 0x00, 0x02];
        let response = ModbusResponse::from_pdu(1, &pdu, ModbusFunction::ReadHoldingRegisters).unwrap();
        assert_eq!(response.parse_registers(2).unwrap(), vec![1, 2]);
        assert!(response.parse_registers(3).is_err());
    }

    #[test]
    fn test_parse_bits_lsb_first() {
        // 10 coils: 1,0,1,1,0,0,0,0 | 1,0
        let pdu = [0x01, 0x02, 0b0000_1101, 0b0000_0001];
        let response = ModbusResponse::from_pdu(1, &pdu, ModbusFunction::ReadCoils).unwrap();
        let bits = response.parse_bits(10).unwrap();
        assert_eq!(
            bits,
            vec![true, false, true, true, false, false, false, false, true, false]
        );
    }

    #[test]
    fn test_exception_response() {
        let pdu = [0x83, 0x02];
        let response = ModbusResponse::from_pdu(1, &pdu, ModbusFunction::ReadHoldingRegisters).unwrap();
        assert!(response.is_exception());
        assert_eq!(response.exception_code(), Some(0x02));
        assert!(matches!(
            response.into_result(),
            Err(ModbusError::Exception { function: 0x03, code: 0x02, .. })
        ));
    }

    #[test]
    fn test_function_mismatch_is_protocol_error() {
        let pdu = [0x04, 0x02, 0x00, 0x01];
        let err = ModbusResponse::from_pdu(1, &pdu, ModbusFunction::ReadHoldingRegisters).unwrap_err();
        assert!(matches!(err, ModbusError::Protocol { .. }));
    }

    #[test]
    fn test_write_echo() {
        let response = ModbusResponse::new_success(
            1,
            ModbusFunction::WriteSingleRegister,
            vec![0x00, 0x64, 0x12, 0x34],
        );
        assert!(response.check_write_echo(100).is_ok());
        assert!(response.check_write_echo(101).is_err());
    }
}
