//! Modbus client on top of a transport
//!
//! Modbus TCP and RTU share the same application layer (PDU) and differ only
//! in how the transport wraps it:
//! - **TCP**: MBAP Header + PDU
//! - **RTU**: Slave ID + PDU + CRC
//!
//! [`GenericModbusClient`] implements request construction and response
//! parsing once and is reused for every transport.
//!
//! | Function Code | Method |
//! |---------------|--------|
//! | 0x01 | `read_01()` |
//! | 0x02 | `read_02()` |
//! | 0x03 | `read_03()` |
//! | 0x04 | `read_04()` |
//! | 0x05 | `write_05()` |
//! | 0x06 | `write_06()` |
//! | 0x0F | `write_0f()` |
//! | 0x10 | `write_10()` |

use std::future::Future;

use tracing::debug;

use crate::constants::{MAX_READ_COILS, MAX_READ_REGISTERS, MAX_WRITE_COILS, MAX_WRITE_REGISTERS};
use crate::error::{ModbusError, ModbusResult};
use crate::protocol::{ModbusFunction, ModbusRequest, ModbusResponse, SlaveId};
use crate::transport::{ModbusTransport, TransportStats};

/// Async interface for the standard Modbus functions.
///
/// # Protocol Limits
///
/// | Operation | Limit |
/// |-----------|-------|
/// | Read Coils (0x01) | 2000 coils |
/// | Read Discrete Inputs (0x02) | 2000 bits |
/// | Read Holding Registers (0x03) | 125 registers |
/// | Read Input Registers (0x04) | 125 registers |
/// | Write Multiple Coils (0x0F) | 1968 coils |
/// | Write Multiple Registers (0x10) | 123 registers |
pub trait ModbusClient: Send + Sync {
    /// Read coils (function code 0x01).
    ///
    /// Returns exactly `quantity` coil states.
    fn read_01(
        &mut self,
        slave_id: SlaveId,
        address: u16,
        quantity: u16,
    ) -> impl Future<Output = ModbusResult<Vec<bool>>> + Send;

    /// Read discrete inputs (function code 0x02).
    fn read_02(
        &mut self,
        slave_id: SlaveId,
        address: u16,
        quantity: u16,
    ) -> impl Future<Output = ModbusResult<Vec<bool>>> + Send;

    /// Read holding registers (function code 0x03).
    ///
    /// Returns exactly `quantity` 16-bit register values.
    fn read_03(
        &mut self,
        slave_id: SlaveId,
        address: u16,
        quantity: u16,
    ) -> impl Future<Output = ModbusResult<Vec<u16>>> + Send;

    /// Read input registers (function code 0x04).
    fn read_04(
        &mut self,
        slave_id: SlaveId,
        address: u16,
        quantity: u16,
    ) -> impl Future<Output = ModbusResult<Vec<u16>>> + Send;

    /// Write single coil (function code 0x05).
    ///
    /// `true` is sent as 0xFF00, `false` as 0x0000.
    fn write_05(&mut self, slave_id: SlaveId, address: u16, value: bool) -> impl Future<Output = ModbusResult<()>> + Send;

    /// Write single register (function code 0x06).
    fn write_06(&mut self, slave_id: SlaveId, address: u16, value: u16) -> impl Future<Output = ModbusResult<()>> + Send;

    /// Write multiple coils (function code 0x0F).
    fn write_0f(
        &mut self,
        slave_id: SlaveId,
        address: u16,
        values: &[bool],
    ) -> impl Future<Output = ModbusResult<()>> + Send;

    /// Write multiple registers (function code 0x10).
    fn write_10(
        &mut self,
        slave_id: SlaveId,
        address: u16,
        values: &[u16],
    ) -> impl Future<Output = ModbusResult<()>> + Send;

    /// Whether the underlying transport is connected.
    fn is_connected(&self) -> bool;

    /// Close the underlying transport.
    fn close(&mut self) -> impl Future<Output = ModbusResult<()>> + Send;

    fn get_stats(&self) -> TransportStats;
}

/// Modbus client that works with any transport.
pub struct GenericModbusClient<T: ModbusTransport> {
    transport: T,
}

impl<T: ModbusTransport> GenericModbusClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Execute a raw request. Exception responses are returned as errors.
    pub async fn execute_request(&mut self, request: ModbusRequest) -> ModbusResult<ModbusResponse> {
        debug!(
            slave_id = request.slave_id,
            function = %request.function,
            address = request.address,
            quantity = request.quantity,
            "Modbus request"
        );

        let response = self.transport.request(&request).await?;

        debug!(
            slave_id = response.slave_id,
            exception = ?response.exception_code(),
            bytes = response.data().len(),
            "Modbus response"
        );

        response.into_result()
    }

    async fn read_bits(
        &mut self,
        function: ModbusFunction,
        slave_id: SlaveId,
        address: u16,
        quantity: u16,
    ) -> ModbusResult<Vec<bool>> {
        if quantity == 0 || quantity > MAX_READ_COILS {
            return Err(ModbusError::invalid_data(format!(
                "Invalid quantity {} (1-{})",
                quantity, MAX_READ_COILS
            )));
        }
        let response = self
            .execute_request(ModbusRequest::new_read(slave_id, function, address, quantity))
            .await?;
        response.parse_bits(quantity)
    }

    async fn read_words(
        &mut self,
        function: ModbusFunction,
        slave_id: SlaveId,
        address: u16,
        quantity: u16,
    ) -> ModbusResult<Vec<u16>> {
        if quantity == 0 || quantity > MAX_READ_REGISTERS {
            return Err(ModbusError::invalid_data(format!(
                "Invalid quantity {} (1-{})",
                quantity, MAX_READ_REGISTERS
            )));
        }
        let response = self
            .execute_request(ModbusRequest::new_read(slave_id, function, address, quantity))
            .await?;
        response.parse_registers(quantity)
    }
}

impl<T: ModbusTransport + Send + Sync> ModbusClient for GenericModbusClient<T> {
    async fn read_01(&mut self, slave_id: SlaveId, address: u16, quantity: u16) -> ModbusResult<Vec<bool>> {
        self.read_bits(ModbusFunction::ReadCoils, slave_id, address, quantity)
            .await
    }

    async fn read_02(&mut self, slave_id: SlaveId, address: u16, quantity: u16) -> ModbusResult<Vec<bool>> {
        self.read_bits(ModbusFunction::ReadDiscreteInputs, slave_id, address, quantity)
            .await
    }

    async fn read_03(&mut self, slave_id: SlaveId, address: u16, quantity: u16) -> ModbusResult<Vec<u16>> {
        self.read_words(ModbusFunction::ReadHoldingRegisters, slave_id, address, quantity)
            .await
    }

    async fn read_04(&mut self, slave_id: SlaveId, address: u16, quantity: u16) -> ModbusResult<Vec<u16>> {
        self.read_words(ModbusFunction::ReadInputRegisters, slave_id, address, quantity)
            .await
    }

    async fn write_05(&mut self, slave_id: SlaveId, address: u16, value: bool) -> ModbusResult<()> {
        let request = ModbusRequest {
            slave_id,
            function: ModbusFunction::WriteSingleCoil,
            address,
            quantity: 1,
            data: if value { vec![0xFF, 0x00] } else { vec![0x00, 0x00] },
        };

        self.execute_request(request).await?.check_write_echo(address)
    }

    async fn write_06(&mut self, slave_id: SlaveId, address: u16, value: u16) -> ModbusResult<()> {
        let request = ModbusRequest {
            slave_id,
            function: ModbusFunction::WriteSingleRegister,
            address,
            quantity: 1,
            data: value.to_be_bytes().to_vec(),
        };

        self.execute_request(request).await?.check_write_echo(address)
    }

    async fn write_0f(&mut self, slave_id: SlaveId, address: u16, values: &[bool]) -> ModbusResult<()> {
        if values.is_empty() || values.len() > MAX_WRITE_COILS as usize {
            return Err(ModbusError::invalid_data("Invalid quantity"));
        }

        // byte count is added during PDU encoding
        let data = values
            .chunks(8)
            .map(|chunk| {
                chunk
                    .iter()
                    .enumerate()
                    .fold(0u8, |byte, (i, &coil)| if coil { byte | (1 << i) } else { byte })
            })
            .collect();

        let request = ModbusRequest {
            slave_id,
            function: ModbusFunction::WriteMultipleCoils,
            address,
            quantity: values.len() as u16,
            data,
        };

        self.execute_request(request).await?.check_write_echo(address)
    }

    async fn write_10(&mut self, slave_id: SlaveId, address: u16, values: &[u16]) -> ModbusResult<()> {
        if values.is_empty() || values.len() > MAX_WRITE_REGISTERS as usize {
            return Err(ModbusError::invalid_data("Invalid quantity"));
        }

        let data = values.iter().flat_map(|v| v.to_be_bytes()).collect();

        let request = ModbusRequest {
            slave_id,
            function: ModbusFunction::WriteMultipleRegisters,
            address,
            quantity: values.len() as u16,
            data,
        };

        self.execute_request(request).await?.check_write_echo(address)
    }

    fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    async fn close(&mut self) -> ModbusResult<()> {
        self.transport.close().await
    }

    fn get_stats(&self) -> TransportStats {
        self.transport.get_stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockDevice;

    fn client_for(device: &MockDevice) -> GenericModbusClient<crate::transport::mock::MockTransport> {
        GenericModbusClient::new(device.connect().unwrap())
    }

    #[tokio::test]
    async fn test_read_holding_registers() {
        let device = MockDevice::new().with_holding(&[10, 20, 30, 40]);
        let mut client = client_for(&device);

        let regs = client.read_03(1, 1, 2).await.unwrap();
        assert_eq!(regs, vec![20, 30]);

        let requests = device.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].function, ModbusFunction::ReadHoldingRegisters);
        assert_eq!(requests[0].address, 1);
        assert_eq!(requests[0].quantity, 2);
    }

    #[tokio::test]
    async fn test_read_input_registers_and_bits() {
        let device = MockDevice::new()
            .with_input(&[0xBEEF])
            .with_coils(&[true, false, true])
            .with_discrete(&[false, true]);
        let mut client = client_for(&device);

        assert_eq!(client.read_04(1, 0, 1).await.unwrap(), vec![0xBEEF]);
        assert_eq!(client.read_01(1, 0, 3).await.unwrap(), vec![true, false, true]);
        assert_eq!(client.read_02(1, 1, 1).await.unwrap(), vec![true]);
    }

    #[tokio::test]
    async fn test_quantity_limits_rejected_before_sending() {
        let device = MockDevice::new();
        let mut client = client_for(&device);

        assert!(matches!(
            client.read_03(1, 0, 0).await,
            Err(ModbusError::InvalidData { .. })
        ));
        assert!(client.read_04(1, 0, 126).await.is_err());
        assert!(client.read_01(1, 0, 2001).await.is_err());
        assert!(client.write_10(1, 0, &[0u16; 124]).await.is_err());
        assert!(device.requests().is_empty());
    }

    #[tokio::test]
    async fn test_exception_response_is_error() {
        let device = MockDevice::new().with_holding(&[1, 2]);
        let mut client = client_for(&device);

        let err = client.read_03(1, 1, 5).await.unwrap_err();
        assert!(matches!(err, ModbusError::Exception { function: 0x03, code: 0x02, .. }));
        // exception leaves the link usable
        assert!(client.is_connected());
    }

    #[tokio::test]
    async fn test_writes_are_encoded() {
        let device = MockDevice::new();
        let mut client = client_for(&device);

        client.write_05(1, 7, true).await.unwrap();
        client.write_06(1, 8, 0x1234).await.unwrap();
        client.write_0f(1, 9, &[true, false, true, true, false, false, false, false, true]).await.unwrap();
        client.write_10(1, 20, &[0x000A, 0x0102]).await.unwrap();

        let requests = device.requests();
        assert_eq!(requests[0].data, vec![0xFF, 0x00]);
        assert_eq!(requests[1].data, vec![0x12, 0x34]);
        assert_eq!(requests[2].data, vec![0b0000_1101, 0b0000_0001]);
        assert_eq!(requests[2].quantity, 9);
        assert_eq!(requests[3].data, vec![0x00, 0x0A, 0x01, 0x02]);
    }

    #[tokio::test]
    async fn test_link_failure_disconnects() {
        let device = MockDevice::new().with_holding(&[1]);
        let mut client = client_for(&device);

        device.fail_next(1);
        assert!(matches!(client.read_03(1, 0, 1).await, Err(ModbusError::Io { .. })));
        assert!(!client.is_connected());

        client.close().await.unwrap();
        assert_eq!(device.closes(), 1);
    }
}
