//! Transport connection owned by a channel.
//!
//! A [`Connection`] wraps one physical link (TCP socket or serial line) to
//! one device. It knows how to (re)establish the link from the channel
//! configuration and exposes the read/write primitives the pipeline
//! dispatches to. Read primitives return the raw point buffer (one byte per
//! bit for FC01/02, big-endian register bytes for FC03/04).

use tracing::{debug, info, warn};

use crate::client::{GenericModbusClient, ModbusClient};
use crate::codec::{bits_to_buffer, registers_to_buffer};
use crate::error::{BridgeError, BridgeResult, ModbusError, ModbusResult};
use crate::params::{ChannelConfig, TransportParams};
use crate::protocol::{ModbusRequest, ModbusResponse};
use crate::transport::{ModbusTransport, TcpTransport, TransportStats, TransportTimeouts};

#[cfg(feature = "rtu")]
use crate::params::{Parity, SerialParams};
#[cfg(feature = "rtu")]
use crate::transport::{RtuTransport, SerialSettings};

#[cfg(test)]
use crate::transport::mock::{MockDevice, MockTransport};

/// Process-wide knobs applied to every link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSettings {
    /// Prefix for serial ports given by index
    pub serial_port_prefix: String,
    /// Hex-dump every frame at debug level
    pub packet_logging: bool,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            serial_port_prefix: crate::config::default_serial_port_prefix(),
            packet_logging: false,
        }
    }
}

/// The concrete transport behind a connection.
pub(crate) enum Link {
    Tcp(TcpTransport),
    #[cfg(feature = "rtu")]
    Rtu(RtuTransport),
    #[cfg(test)]
    Mock(MockTransport),
}

impl ModbusTransport for Link {
    async fn request(&mut self, request: &ModbusRequest) -> ModbusResult<ModbusResponse> {
        match self {
            Link::Tcp(t) => t.request(request).await,
            #[cfg(feature = "rtu")]
            Link::Rtu(t) => t.request(request).await,
            #[cfg(test)]
            Link::Mock(t) => t.request(request).await,
        }
    }

    fn is_connected(&self) -> bool {
        match self {
            Link::Tcp(t) => t.is_connected(),
            #[cfg(feature = "rtu")]
            Link::Rtu(t) => t.is_connected(),
            #[cfg(test)]
            Link::Mock(t) => t.is_connected(),
        }
    }

    async fn close(&mut self) -> ModbusResult<()> {
        match self {
            Link::Tcp(t) => t.close().await,
            #[cfg(feature = "rtu")]
            Link::Rtu(t) => t.close().await,
            #[cfg(test)]
            Link::Mock(t) => t.close().await,
        }
    }

    fn get_stats(&self) -> TransportStats {
        match self {
            Link::Tcp(t) => t.get_stats(),
            #[cfg(feature = "rtu")]
            Link::Rtu(t) => t.get_stats(),
            #[cfg(test)]
            Link::Mock(t) => t.get_stats(),
        }
    }
}

#[cfg(feature = "rtu")]
fn serial_settings(serial: &SerialParams, prefix: &str) -> SerialSettings {
    SerialSettings {
        path: serial.port.device_path(prefix),
        baud_rate: serial.baud_rate,
        data_bits: match serial.data_bits {
            5 => tokio_serial::DataBits::Five,
            6 => tokio_serial::DataBits::Six,
            7 => tokio_serial::DataBits::Seven,
            _ => tokio_serial::DataBits::Eight,
        },
        stop_bits: if serial.stop_bits == 2 {
            tokio_serial::StopBits::Two
        } else {
            tokio_serial::StopBits::One
        },
        parity: match serial.parity {
            Parity::None => tokio_serial::Parity::None,
            Parity::Even => tokio_serial::Parity::Even,
            Parity::Odd => tokio_serial::Parity::Odd,
        },
    }
}

/// One device link plus the configuration to rebuild it.
pub struct Connection {
    config: ChannelConfig,
    settings: LinkSettings,
    client: Option<GenericModbusClient<Link>>,
    #[cfg(test)]
    mock: Option<MockDevice>,
}

impl Connection {
    /// Open the link described by `config`.
    ///
    /// On failure nothing is kept and the error is [`BridgeError::Connect`].
    pub async fn open(config: ChannelConfig, settings: &LinkSettings) -> BridgeResult<Self> {
        let mut connection = Self {
            config,
            settings: settings.clone(),
            client: None,
            #[cfg(test)]
            mock: None,
        };
        connection.connect().await?;
        Ok(connection)
    }

    /// Open against a simulated device.
    #[cfg(test)]
    pub(crate) async fn open_mock(config: ChannelConfig, device: MockDevice) -> BridgeResult<Self> {
        let mut connection = Self {
            config,
            settings: LinkSettings::default(),
            client: None,
            mock: Some(device),
        };
        connection.connect().await?;
        Ok(connection)
    }

    async fn establish(&self) -> ModbusResult<Link> {
        #[cfg(test)]
        if let Some(device) = &self.mock {
            return device.connect().map(Link::Mock);
        }

        let timeouts = TransportTimeouts::uniform(self.config.timeout);
        match &self.config.transport {
            TransportParams::Tcp { host, port } => {
                let mut transport = TcpTransport::connect_host(host, *port, timeouts).await?;
                transport.set_packet_logging(self.settings.packet_logging);
                Ok(Link::Tcp(transport))
            }
            #[cfg(feature = "rtu")]
            TransportParams::Rtu(serial) => {
                let settings = serial_settings(serial, &self.settings.serial_port_prefix);
                let mut transport = RtuTransport::open(settings, timeouts)?;
                transport.set_packet_logging(self.settings.packet_logging);
                Ok(Link::Rtu(transport))
            }
            #[cfg(not(feature = "rtu"))]
            TransportParams::Rtu(_) => Err(ModbusError::configuration(
                "serial channels need the `rtu` feature",
            )),
        }
    }

    async fn connect(&mut self) -> BridgeResult<()> {
        let endpoint = self.endpoint();
        match self.establish().await {
            Ok(link) => {
                info!(
                    transport = %self.config.kind(),
                    endpoint = %endpoint,
                    slave_id = self.config.slave_id,
                    "Modbus link established"
                );
                self.client = Some(GenericModbusClient::new(link));
                Ok(())
            }
            Err(e) => {
                warn!(transport = %self.config.kind(), endpoint = %endpoint, "Modbus connect failed: {}", e);
                Err(BridgeError::Connect(format!("{}: {}", endpoint, e)))
            }
        }
    }

    /// Release the link. Idempotent.
    pub async fn close(&mut self) {
        if let Some(mut client) = self.client.take() {
            if let Err(e) = client.close().await {
                debug!(endpoint = %self.endpoint(), "close reported: {}", e);
            }
        }
    }

    /// Drop whatever link is left and open a fresh one.
    pub async fn reconnect(&mut self) -> BridgeResult<()> {
        self.close().await;
        self.connect().await
    }

    pub fn is_open(&self) -> bool {
        self.client.as_ref().is_some_and(|c| c.is_connected())
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    pub fn endpoint(&self) -> String {
        self.config.endpoint(&self.settings.serial_port_prefix)
    }

    /// Counters of the current link.
    pub fn stats(&self) -> TransportStats {
        self.client
            .as_ref()
            .map(|c| c.get_stats())
            .unwrap_or_default()
    }

    fn client(&mut self) -> ModbusResult<&mut GenericModbusClient<Link>> {
        match self.client.as_mut() {
            Some(client) if client.is_connected() => Ok(client),
            _ => Err(ModbusError::connection("link is closed")),
        }
    }

    // ===== Read primitives =====

    /// FC01
    pub async fn read_bits(&mut self, address: u16, quantity: u16) -> ModbusResult<Vec<u8>> {
        let slave_id = self.config.slave_id;
        let bits = self.client()?.read_01(slave_id, address, quantity).await?;
        Ok(bits_to_buffer(&bits))
    }

    /// FC02
    pub async fn read_input_bits(&mut self, address: u16, quantity: u16) -> ModbusResult<Vec<u8>> {
        let slave_id = self.config.slave_id;
        let bits = self.client()?.read_02(slave_id, address, quantity).await?;
        Ok(bits_to_buffer(&bits))
    }

    /// FC03
    pub async fn read_registers(&mut self, address: u16, quantity: u16) -> ModbusResult<Vec<u8>> {
        let slave_id = self.config.slave_id;
        let regs = self.client()?.read_03(slave_id, address, quantity).await?;
        Ok(registers_to_buffer(&regs))
    }

    /// FC04
    pub async fn read_input_registers(&mut self, address: u16, quantity: u16) -> ModbusResult<Vec<u8>> {
        let slave_id = self.config.slave_id;
        let regs = self.client()?.read_04(slave_id, address, quantity).await?;
        Ok(registers_to_buffer(&regs))
    }

    // ===== Write primitives =====
    // Not reached from the bridge write operation, which only acknowledges.

    /// FC05
    pub async fn write_bit(&mut self, address: u16, value: bool) -> ModbusResult<()> {
        let slave_id = self.config.slave_id;
        self.client()?.write_05(slave_id, address, value).await
    }

    /// FC06
    pub async fn write_register(&mut self, address: u16, value: u16) -> ModbusResult<()> {
        let slave_id = self.config.slave_id;
        self.client()?.write_06(slave_id, address, value).await
    }

    /// FC15
    pub async fn write_bits(&mut self, address: u16, values: &[bool]) -> ModbusResult<()> {
        let slave_id = self.config.slave_id;
        self.client()?.write_0f(slave_id, address, values).await
    }

    /// FC16
    pub async fn write_registers(&mut self, address: u16, values: &[u16]) -> ModbusResult<()> {
        let slave_id = self.config.slave_id;
        self.client()?.write_10(slave_id, address, values).await
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::tcp_config;
    use super::*;
    use crate::protocol::ModbusFunction;

    #[tokio::test]
    async fn test_read_primitives_buffer_lengths() {
        let device = MockDevice::new()
            .with_holding(&[1, 2, 3])
            .with_input(&[0xABCD])
            .with_coils(&[true, false, true])
            .with_discrete(&[true]);
        let mut conn = Connection::open_mock(tcp_config(), device).await.unwrap();

        assert_eq!(conn.read_bits(0, 3).await.unwrap(), vec![1, 0, 1]);
        assert_eq!(conn.read_input_bits(0, 1).await.unwrap(), vec![1]);
        assert_eq!(conn.read_registers(0, 2).await.unwrap(), vec![0, 1, 0, 2]);
        assert_eq!(conn.read_input_registers(0, 1).await.unwrap(), vec![0xAB, 0xCD]);
    }

    #[tokio::test]
    async fn test_open_failure_is_connect_error() {
        let device = MockDevice::new();
        device.set_online(false);
        let result = Connection::open_mock(tcp_config(), device.clone()).await;
        assert!(matches!(result, Err(BridgeError::Connect(_))));
        assert_eq!(device.connects(), 0);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let device = MockDevice::new();
        let mut conn = Connection::open_mock(tcp_config(), device.clone()).await.unwrap();
        assert!(conn.is_open());

        conn.close().await;
        conn.close().await;
        assert!(!conn.is_open());
        assert_eq!(device.closes(), 1);

        let err = conn.read_registers(0, 1).await.unwrap_err();
        assert!(matches!(err, ModbusError::Connection { .. }));
    }

    #[tokio::test]
    async fn test_reconnect_opens_new_link() {
        let device = MockDevice::new().with_holding(&[7]);
        let mut conn = Connection::open_mock(tcp_config(), device.clone()).await.unwrap();

        device.fail_next(1);
        assert!(conn.read_registers(0, 1).await.is_err());
        assert!(!conn.is_open());

        conn.reconnect().await.unwrap();
        assert!(conn.is_open());
        assert_eq!(device.connects(), 2);
        assert_eq!(conn.read_registers(0, 1).await.unwrap(), vec![0, 7]);
    }

    #[tokio::test]
    async fn test_write_primitives_use_slave_id() {
        let device = MockDevice::new();
        let mut config = tcp_config();
        config.slave_id = 9;
        let mut conn = Connection::open_mock(config, device.clone()).await.unwrap();

        conn.write_bit(1, true).await.unwrap();
        conn.write_register(2, 0x0102).await.unwrap();
        conn.write_bits(3, &[true, true]).await.unwrap();
        conn.write_registers(4, &[5, 6]).await.unwrap();

        let functions: Vec<_> = device.requests().iter().map(|r| (r.slave_id, r.function)).collect();
        assert_eq!(
            functions,
            vec![
                (9, ModbusFunction::WriteSingleCoil),
                (9, ModbusFunction::WriteSingleRegister),
                (9, ModbusFunction::WriteMultipleCoils),
                (9, ModbusFunction::WriteMultipleRegisters),
            ]
        );
    }
}
