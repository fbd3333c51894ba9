//! Network transport layer for TCP and RTU communication
//!
//! A transport owns one physical link and performs one request/response
//! exchange at a time. Two timeouts bound every exchange:
//!
//! - the **response timeout** covers the wait for the first bytes of the reply;
//! - the **byte timeout** covers each subsequent read of the same frame.
//!
//! Any I/O failure, timeout or framing error drops the underlying stream, so
//! [`ModbusTransport::is_connected`] turns `false` and the owner has to
//! reconnect before the next request.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::constants::{MAX_MBAP_LENGTH, MBAP_HEADER_LEN, MBAP_PROTOCOL_ID};
use crate::error::{ModbusError, ModbusResult};
use crate::logging::format_hex;
use crate::protocol::{ModbusRequest, ModbusResponse};

#[cfg(feature = "rtu")]
use crate::constants::{EXCEPTION_FLAG, MAX_RTU_FRAME_SIZE};

/// Counters kept by every transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportStats {
    pub requests_sent: u64,
    pub responses_received: u64,
    pub errors: u64,
    pub timeouts: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

impl TransportStats {
    fn record_failure(&mut self, err: &ModbusError) {
        self.errors += 1;
        if matches!(err, ModbusError::Timeout { .. }) {
            self.timeouts += 1;
        }
    }
}

/// Response and inter-byte timeouts applied to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportTimeouts {
    pub response: Duration,
    pub byte: Duration,
}

impl TransportTimeouts {
    /// Same value for both timeouts.
    pub fn uniform(timeout: Duration) -> Self {
        Self {
            response: timeout,
            byte: timeout,
        }
    }
}

/// A link able to carry Modbus requests.
pub trait ModbusTransport: Send + Sync {
    /// Send a request and wait for the matching response.
    fn request(
        &mut self,
        request: &ModbusRequest,
    ) -> impl Future<Output = ModbusResult<ModbusResponse>> + Send;

    /// Whether the link is currently usable.
    fn is_connected(&self) -> bool;

    /// Release the link. Safe to call more than once.
    fn close(&mut self) -> impl Future<Output = ModbusResult<()>> + Send;

    fn get_stats(&self) -> TransportStats;
}

/// Read exactly `buf.len()` bytes or fail after `limit`.
async fn read_exact_within<R>(
    reader: &mut R,
    buf: &mut [u8],
    limit: Duration,
    what: &str,
) -> ModbusResult<()>
where
    R: AsyncRead + Unpin,
{
    match timeout(limit, reader.read_exact(buf)).await {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            Err(ModbusError::connection(format!("connection closed by peer while reading {}", what)))
        }
        Ok(Err(e)) => Err(e.into()),
        Err(_) => Err(ModbusError::timeout(
            format!("reading {}", what),
            limit.as_millis() as u64,
        )),
    }
}

async fn write_all_within<W>(writer: &mut W, frame: &[u8], limit: Duration) -> ModbusResult<()>
where
    W: AsyncWrite + Unpin,
{
    match timeout(limit, writer.write_all(frame)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.into()),
        Err(_) => Err(ModbusError::timeout("writing request", limit.as_millis() as u64)),
    }
}

// ============================================================================
// TCP
// ============================================================================

/// Modbus TCP transport (MBAP framing).
pub struct TcpTransport {
    /// Resolved peer address
    pub address: SocketAddr,
    stream: Option<TcpStream>,
    timeouts: TransportTimeouts,
    transaction_id: u16,
    stats: TransportStats,
    packet_logging: bool,
}

impl TcpTransport {
    /// Connect to `addr`, bounding the connect by the response timeout.
    pub async fn connect(addr: SocketAddr, timeouts: TransportTimeouts) -> ModbusResult<Self> {
        debug!("Connecting to Modbus TCP endpoint {}", addr);

        let stream = match timeout(timeouts.response, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(ModbusError::connection(format!(
                    "failed to connect to {}: {}",
                    addr, e
                )))
            }
            Err(_) => {
                return Err(ModbusError::timeout(
                    format!("connecting to {}", addr),
                    timeouts.response.as_millis() as u64,
                ))
            }
        };

        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to set TCP_NODELAY on {}: {}", addr, e);
        }

        info!("Connected to Modbus TCP endpoint {}", addr);
        Ok(Self {
            address: addr,
            stream: Some(stream),
            timeouts,
            transaction_id: 0,
            stats: TransportStats::default(),
            packet_logging: false,
        })
    }

    /// Resolve `host:port` and connect to the first address that accepts.
    pub async fn connect_host(host: &str, port: u16, timeouts: TransportTimeouts) -> ModbusResult<Self> {
        let addrs = tokio::net::lookup_host((host, port))
            .await
            .map_err(|e| ModbusError::configuration(format!("cannot resolve {}:{}: {}", host, port, e)))?;

        let mut last_error = ModbusError::configuration(format!("{}:{} resolved to no address", host, port));
        for addr in addrs {
            match Self::connect(addr, timeouts).await {
                Ok(transport) => return Ok(transport),
                Err(e) => last_error = e,
            }
        }
        Err(last_error)
    }

    /// Log every frame as hex at debug level.
    pub fn set_packet_logging(&mut self, enabled: bool) {
        self.packet_logging = enabled;
    }

    fn next_transaction_id(&mut self) -> u16 {
        self.transaction_id = self.transaction_id.wrapping_add(1);
        self.transaction_id
    }
}

/// One MBAP exchange; returns the response PDU.
async fn tcp_exchange<S>(
    stream: &mut S,
    frame: &[u8],
    transaction_id: u16,
    timeouts: TransportTimeouts,
    packet_logging: bool,
) -> ModbusResult<Vec<u8>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if packet_logging {
        debug!(direction = "send", frame = %format_hex(frame), "[Modbus TCP] packet");
    }
    write_all_within(stream, frame, timeouts.response).await?;

    let mut header = [0u8; MBAP_HEADER_LEN];
    read_exact_within(stream, &mut header, timeouts.response, "MBAP header").await?;

    let rx_transaction = u16::from_be_bytes([header[0], header[1]]);
    let protocol_id = u16::from_be_bytes([header[2], header[3]]);
    let length = u16::from_be_bytes([header[4], header[5]]) as usize;

    if rx_transaction != transaction_id {
        return Err(ModbusError::protocol(format!(
            "transaction id mismatch: sent {}, received {}",
            transaction_id, rx_transaction
        )));
    }
    if protocol_id != MBAP_PROTOCOL_ID {
        return Err(ModbusError::protocol(format!("invalid protocol id {}", protocol_id)));
    }
    if !(2..=MAX_MBAP_LENGTH).contains(&length) {
        return Err(ModbusError::protocol(format!("invalid MBAP length {}", length)));
    }

    // length counts the unit id, which is already in the header
    let mut pdu = vec![0u8; length - 1];
    read_exact_within(stream, &mut pdu, timeouts.byte, "response PDU").await?;

    if packet_logging {
        let mut raw = header.to_vec();
        raw.extend_from_slice(&pdu);
        debug!(direction = "recv", frame = %format_hex(&raw), "[Modbus TCP] packet");
    }
    Ok(pdu)
}

impl ModbusTransport for TcpTransport {
    async fn request(&mut self, request: &ModbusRequest) -> ModbusResult<ModbusResponse> {
        let transaction_id = self.next_transaction_id();

        let mut frame = BytesMut::with_capacity(MBAP_HEADER_LEN + 8 + request.data.len());
        frame.put_u16(transaction_id);
        frame.put_u16(MBAP_PROTOCOL_ID);
        frame.put_u16(0); // length, patched below
        frame.put_u8(request.slave_id);
        request.encode_pdu(&mut frame)?;
        let length = (frame.len() - 6) as u16;
        frame[4..6].copy_from_slice(&length.to_be_bytes());

        let Some(stream) = self.stream.as_mut() else {
            return Err(ModbusError::connection("not connected"));
        };

        self.stats.requests_sent += 1;
        self.stats.bytes_sent += frame.len() as u64;

        let result = tcp_exchange(stream, &frame, transaction_id, self.timeouts, self.packet_logging)
            .await
            .and_then(|pdu| {
                self.stats.bytes_received += (MBAP_HEADER_LEN + pdu.len()) as u64;
                ModbusResponse::from_pdu(request.slave_id, &pdu, request.function)
            });

        match result {
            Ok(response) => {
                self.stats.responses_received += 1;
                Ok(response)
            }
            Err(e) => {
                self.stats.record_failure(&e);
                if e.is_link_failure() {
                    warn!("Dropping Modbus TCP link to {}: {}", self.address, e);
                    self.stream = None;
                }
                Err(e)
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    async fn close(&mut self) -> ModbusResult<()> {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                debug!("TCP shutdown of {} reported: {}", self.address, e);
            }
            info!("Closed Modbus TCP link to {}", self.address);
        }
        Ok(())
    }

    fn get_stats(&self) -> TransportStats {
        self.stats
    }
}

// ============================================================================
// RTU
// ============================================================================

#[cfg(feature = "rtu")]
const MODBUS_CRC: crc::Crc<u16> = crc::Crc::<u16>::new(&crc::CRC_16_MODBUS);

/// CRC-16/MODBUS of `data`, in transmission order (low byte first).
#[cfg(feature = "rtu")]
pub fn rtu_crc(data: &[u8]) -> [u8; 2] {
    MODBUS_CRC.checksum(data).to_le_bytes()
}

/// Serial line settings for [`RtuTransport`].
#[cfg(feature = "rtu")]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialSettings {
    pub path: String,
    pub baud_rate: u32,
    pub data_bits: tokio_serial::DataBits,
    pub stop_bits: tokio_serial::StopBits,
    pub parity: tokio_serial::Parity,
}

/// Modbus RTU transport over a serial line.
#[cfg(feature = "rtu")]
pub struct RtuTransport {
    settings: SerialSettings,
    stream: Option<tokio_serial::SerialStream>,
    timeouts: TransportTimeouts,
    stats: TransportStats,
    packet_logging: bool,
}

#[cfg(feature = "rtu")]
impl RtuTransport {
    /// Open and configure the serial port. Must run inside a Tokio runtime.
    pub fn open(settings: SerialSettings, timeouts: TransportTimeouts) -> ModbusResult<Self> {
        use tokio_serial::SerialPortBuilderExt;

        let stream = tokio_serial::new(settings.path.as_str(), settings.baud_rate)
            .data_bits(settings.data_bits)
            .stop_bits(settings.stop_bits)
            .parity(settings.parity)
            .timeout(timeouts.response)
            .open_native_async()
            .map_err(|e| {
                ModbusError::connection(format!("failed to open serial port {}: {}", settings.path, e))
            })?;

        info!(
            "Opened serial port {} at {} baud ({:?}, {:?}, {:?})",
            settings.path, settings.baud_rate, settings.data_bits, settings.parity, settings.stop_bits
        );
        Ok(Self {
            settings,
            stream: Some(stream),
            timeouts,
            stats: TransportStats::default(),
            packet_logging: false,
        })
    }

    pub fn settings(&self) -> &SerialSettings {
        &self.settings
    }

    pub fn set_packet_logging(&mut self, enabled: bool) {
        self.packet_logging = enabled;
    }
}

/// Number of bytes still to read after slave id + function code.
#[cfg(feature = "rtu")]
fn rtu_remaining_len(function_code: u8, first_data_byte: u8) -> usize {
    if function_code & EXCEPTION_FLAG != 0 {
        // exception code already read, CRC left
        return 2;
    }
    match function_code {
        // byte count already read: data + CRC
        0x01..=0x04 => first_data_byte as usize + 2,
        // address(2) + value/quantity(2) + CRC(2), first byte already read
        _ => 5,
    }
}

/// One RTU exchange; returns the response PDU with CRC verified.
#[cfg(feature = "rtu")]
async fn rtu_exchange(
    stream: &mut tokio_serial::SerialStream,
    frame: &[u8],
    slave_id: u8,
    timeouts: TransportTimeouts,
    packet_logging: bool,
) -> ModbusResult<Vec<u8>> {
    if packet_logging {
        debug!(direction = "send", frame = %format_hex(frame), "[Modbus RTU] packet");
    }
    write_all_within(stream, frame, timeouts.response).await?;

    let mut adu = Vec::with_capacity(MAX_RTU_FRAME_SIZE);
    let mut head = [0u8; 3];
    read_exact_within(stream, &mut head[..1], timeouts.response, "slave id").await?;
    read_exact_within(stream, &mut head[1..], timeouts.byte, "function code").await?;
    adu.extend_from_slice(&head);

    let remaining = rtu_remaining_len(head[1], head[2]);
    if adu.len() + remaining > MAX_RTU_FRAME_SIZE {
        return Err(ModbusError::protocol(format!("RTU frame too long: {} bytes", adu.len() + remaining)));
    }
    let mut tail = vec![0u8; remaining];
    read_exact_within(stream, &mut tail, timeouts.byte, "RTU frame").await?;
    adu.extend_from_slice(&tail);

    if packet_logging {
        debug!(direction = "recv", frame = %format_hex(&adu), "[Modbus RTU] packet");
    }

    let (body, crc) = adu.split_at(adu.len() - 2);
    if rtu_crc(body) != [crc[0], crc[1]] {
        return Err(ModbusError::protocol("RTU CRC mismatch"));
    }
    if body[0] != slave_id {
        return Err(ModbusError::protocol(format!(
            "response from slave {}, expected {}",
            body[0], slave_id
        )));
    }
    Ok(body[1..].to_vec())
}

#[cfg(feature = "rtu")]
impl ModbusTransport for RtuTransport {
    async fn request(&mut self, request: &ModbusRequest) -> ModbusResult<ModbusResponse> {
        let mut frame = BytesMut::with_capacity(MAX_RTU_FRAME_SIZE);
        frame.put_u8(request.slave_id);
        request.encode_pdu(&mut frame)?;
        let crc = rtu_crc(&frame);
        frame.put_slice(&crc);

        let Some(stream) = self.stream.as_mut() else {
            return Err(ModbusError::connection("serial port is closed"));
        };

        self.stats.requests_sent += 1;
        self.stats.bytes_sent += frame.len() as u64;

        let result = rtu_exchange(stream, &frame, request.slave_id, self.timeouts, self.packet_logging)
            .await
            .and_then(|pdu| {
                self.stats.bytes_received += (pdu.len() + 3) as u64;
                ModbusResponse::from_pdu(request.slave_id, &pdu, request.function)
            });

        match result {
            Ok(response) => {
                self.stats.responses_received += 1;
                Ok(response)
            }
            Err(e) => {
                self.stats.record_failure(&e);
                if e.is_link_failure() {
                    warn!("Dropping serial link {}: {}", self.settings.path, e);
                    self.stream = None;
                }
                Err(e)
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    async fn close(&mut self) -> ModbusResult<()> {
        if self.stream.take().is_some() {
            info!("Closed serial port {}", self.settings.path);
        }
        Ok(())
    }

    fn get_stats(&self) -> TransportStats {
        self.stats
    }
}

// ============================================================================
// Mock transport (tests only)
// ============================================================================
