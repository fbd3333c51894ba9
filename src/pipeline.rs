//! Read and write pipelines.
//!
//! A point read goes through these steps, each with its own failure:
//!
//! 1. channel lookup → not found
//! 2. point descriptor parsing → parse / range / unsupported
//! 3. device limit check → range
//! 4. connection check, one reconnect attempt if disconnected → I/O
//! 5. dispatch to the read primitive of the function code → I/O, with one
//!    reconnect attempt on a broken link unless step 4 already made one
//! 6. decode by value type → decode
//! 7. timestamp with the decode completion time

use serde::Serialize;
use tracing::{debug, warn};

use crate::bytes::ByteOrder;
use crate::codec::decode_point_value;
use crate::connection::Connection;
use crate::device_limits::DeviceLimits;
use crate::error::{BridgeError, BridgeResult, ModbusResult};
use crate::params::{parse_point_descriptor, PointDescriptor, ReadFunction};
use crate::registry::{ChannelHandle, ChannelRegistry};
use crate::value::PointValue;

/// Timestamped result of a point read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointReading {
    /// Unix seconds at decode completion
    pub ts: i64,
    pub value: PointValue,
}

impl PointReading {
    pub fn to_json(&self) -> String {
        serde_json::json!({ "ts": self.ts, "value": self.value }).to_string()
    }
}

async fn dispatch(connection: &mut Connection, point: &PointDescriptor) -> ModbusResult<Vec<u8>> {
    match point.function {
        ReadFunction::Coils => connection.read_bits(point.address, point.quantity).await,
        ReadFunction::DiscreteInputs => connection.read_input_bits(point.address, point.quantity).await,
        ReadFunction::HoldingRegisters => connection.read_registers(point.address, point.quantity).await,
        ReadFunction::InputRegisters => {
            connection
                .read_input_registers(point.address, point.quantity)
                .await
        }
    }
}

/// Read one point from channel `channel_id`.
pub async fn read_point(
    registry: &ChannelRegistry,
    limits: &DeviceLimits,
    channel_id: &str,
    params: &str,
) -> BridgeResult<PointReading> {
    let handle = registry.lookup(channel_id).await?;
    let point = parse_point_descriptor(params)?;
    limits.check_read(point.function, point.quantity)?;

    let (buf, byte_order) = read_raw(&handle, channel_id, &point).await?;

    let value = decode_point_value(&buf, point.value_type, byte_order)?;
    let reading = PointReading {
        ts: chrono::Utc::now().timestamp(),
        value,
    };
    debug!(
        channel_id,
        function_code = point.function.code(),
        address = point.address,
        quantity = point.quantity,
        value = %reading.value,
        "Point read"
    );
    Ok(reading)
}

/// One transaction on a locked channel, with at most one reconnect attempt.
async fn read_raw(
    handle: &ChannelHandle,
    channel_id: &str,
    point: &PointDescriptor,
) -> BridgeResult<(Vec<u8>, ByteOrder)> {
    let mut guard = handle.lock().await;
    let channel = &mut *guard;

    // deleted between lookup and lock
    if channel.is_deleted() {
        return Err(BridgeError::NotFound(channel_id.to_string()));
    }

    let reconnected = channel.policy.ensure_connected(&mut channel.connection).await?;

    match dispatch(&mut channel.connection, point).await {
        Ok(buf) => {
            channel.policy.record_success();
            Ok((buf, channel.config().byte_order))
        }
        Err(e) => {
            warn!(
                channel_id,
                function_code = point.function.code(),
                address = point.address,
                "Point read failed: {}",
                e
            );
            Err(channel
                .policy
                .on_failure(&mut channel.connection, e, !reconnected)
                .await)
        }
    }
}

/// Acknowledge a write to channel `channel_id`.
///
/// Nothing is sent to the device; the result is the payload length.
pub async fn write_point(
    registry: &ChannelRegistry,
    channel_id: &str,
    params: &str,
    payload: &[u8],
) -> BridgeResult<usize> {
    registry.lookup(channel_id).await?;
    debug!(channel_id, params, bytes = payload.len(), "Point write acknowledged");
    Ok(payload.len())
}
