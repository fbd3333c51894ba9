//! Modbus Bridge Demo
//!
//! Walks through the host operations against a Modbus TCP server:
//! - describe the parameter schema
//! - create a channel, read points with each value type, acknowledge a write
//! - run the housekeeping loop for a few ticks, then shut down
//!
//! Usage: cargo run --bin demo [server_address]
//! Example: cargo run --bin demo 127.0.0.1:502

use std::sync::Arc;
use std::time::Duration;

use modbus_bridge::{
    init_logging, BridgeConfig, BridgeOperations, BridgeRuntime, LoggingMode, ModbusBridge,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mode = std::env::var("LOG_FORMAT")
        .ok()
        .and_then(|s| LoggingMode::from_str(&s))
        .unwrap_or_default();
    init_logging("info", mode)?;

    println!("Modbus Bridge v{} Demo", modbus_bridge::VERSION);
    println!("========================\n");

    // =========================================================================
    // Part 1: Parameter schema (no connection required)
    // =========================================================================
    let bridge = Arc::new(ModbusBridge::new(
        BridgeConfig::new().with_tick_interval_ms(500),
    ));

    println!("Part 1: Parameter schema");
    println!("------------------------");
    for desc in &bridge.describe().channel {
        println!("  channel.{:<16} {:?}", desc.key, desc.kind);
    }
    for desc in &bridge.describe().point {
        println!("  point.{:<18} {:?}", desc.key, desc.kind);
    }

    // =========================================================================
    // Part 2: Channel lifecycle
    // =========================================================================
    let server_address = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:502".to_string());
    let (host, port) = server_address
        .rsplit_once(':')
        .ok_or("server address must be host:port")?;
    let port: u16 = port.parse()?;

    println!("\nPart 2: Channel on {}", server_address);
    println!("---------------------------------");

    let channel = serde_json::json!({
        "type": "tcp",
        "ipaddr": host,
        "port": port,
        "modbus_slave_id": 1,
        "timeout": 1000,
    })
    .to_string();

    if let Err(e) = bridge.create_channel("demo", &channel).await {
        println!("  Create failed ({}): {}", e.code(), e);
        println!("  (This is expected if no Modbus server is running)");
        return Ok(());
    }
    println!("  Channel `demo` created");

    let points = [
        ("i32 @ 0", 0, 2, "3(read holding registers)", "1(signed integer)"),
        ("u16 @ 0", 0, 1, "3(read holding registers)", "2(unsigned integer)"),
        ("f32 @ 2", 2, 2, "3(read holding registers)", "4(floating point)"),
        ("text @ 4", 4, 4, "4(read input registers)", "3(string)"),
        ("coils @ 0", 0, 2, "1(read coils)", "2(unsigned integer)"),
    ];
    for (label, address, quantity, function_code, value_type) in points {
        let point = serde_json::json!({
            "address": address,
            "quantity": quantity,
            "function_code": function_code,
            "value_type": value_type,
        })
        .to_string();
        match bridge.read_point("demo", &point).await {
            Ok(json) => println!("  {:<10} -> {}", label, json),
            Err(e) => println!("  {:<10} -> error {}: {}", label, e.code(), e),
        }
    }

    let written = bridge.write_point("demo", "{}", &[0x12, 0x34]).await?;
    println!("  Write acknowledged: {} bytes", written);

    // =========================================================================
    // Part 3: Runtime loop
    // =========================================================================
    println!("\nPart 3: Runtime");
    println!("---------------");

    let runtime = Arc::new(BridgeRuntime::new(
        Arc::clone(&bridge),
        bridge.config().tick_interval(),
    ));
    let shutdown = runtime.shutdown_handle();
    let task = tokio::spawn({
        let runtime = Arc::clone(&runtime);
        async move { runtime.run().await }
    });

    tokio::time::sleep(Duration::from_secs(2)).await;
    for status in bridge.registry().snapshot().await {
        println!("  {}", serde_json::to_string(&status)?);
    }

    shutdown.shutdown();
    task.await?;
    println!("  Channels left after shutdown: {}", bridge.registry().len().await);

    println!("\nDemo completed!");
    Ok(())
}
