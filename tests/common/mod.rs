//! In-process Modbus TCP server for integration tests.
//!
//! Serves FC01, FC03, FC04 and FC06 over in-memory banks; anything else
//! gets an illegal-function exception.
//! `stop` drops the listener and every open connection; `restart` binds the
//! same port again.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::{JoinHandle, JoinSet};

#[derive(Default)]
struct Banks {
    holding: Vec<u16>,
    input: Vec<u16>,
    coils: Vec<bool>,
    requests: usize,
}

pub struct TestServer {
    addr: SocketAddr,
    banks: Arc<Mutex<Banks>>,
    task: Option<JoinHandle<()>>,
}

impl TestServer {
    /// Bind an ephemeral port on localhost and start serving.
    pub async fn start(holding: &[u16]) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let banks = Arc::new(Mutex::new(Banks {
            holding: holding.to_vec(),
            ..Banks::default()
        }));
        let task = Some(tokio::spawn(serve(listener, Arc::clone(&banks))));
        Self { addr, banks, task }
    }

    pub fn set_input(&self, registers: &[u16]) {
        self.banks.lock().unwrap().input = registers.to_vec();
    }

    pub fn set_coils(&self, coils: &[bool]) {
        self.banks.lock().unwrap().coils = coils.to_vec();
    }

    pub fn requests(&self) -> usize {
        self.banks.lock().unwrap().requests
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Channel parameters pointing at this server.
    pub fn channel_params(&self, timeout_ms: u64) -> String {
        serde_json::json!({
            "type": "tcp",
            "ipaddr": "127.0.0.1",
            "port": self.addr.port(),
            "modbus_slave_id": 1,
            "timeout": timeout_ms,
        })
        .to_string()
    }

    /// Close the listener and all client connections.
    pub async fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
    }

    /// Serve again on the same port.
    pub async fn restart(&mut self) {
        self.stop().await;
        let listener = TcpListener::bind(self.addr).await.unwrap();
        self.task = Some(tokio::spawn(serve(listener, Arc::clone(&self.banks))));
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// A localhost port with nothing listening on it.
pub async fn unused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

pub fn point(address: u16, quantity: u16, function_code: &str, value_type: &str) -> String {
    serde_json::json!({
        "address": address,
        "quantity": quantity,
        "function_code": function_code,
        "value_type": value_type,
    })
    .to_string()
}

async fn serve(listener: TcpListener, banks: Arc<Mutex<Banks>>) {
    // dropping the set aborts every connection task
    let mut connections = JoinSet::new();
    while let Ok((stream, _)) = listener.accept().await {
        connections.spawn(handle_connection(stream, Arc::clone(&banks)));
    }
}

async fn handle_connection(mut stream: TcpStream, banks: Arc<Mutex<Banks>>) {
    loop {
        let mut header = [0u8; 7];
        if stream.read_exact(&mut header).await.is_err() {
            return;
        }
        let length = u16::from_be_bytes([header[4], header[5]]) as usize;
        if length < 2 {
            return;
        }
        let mut pdu = vec![0u8; length - 1];
        if stream.read_exact(&mut pdu).await.is_err() {
            return;
        }

        let response = respond(&banks, &pdu);
        let mut frame = Vec::with_capacity(7 + response.len());
        frame.extend_from_slice(&header[0..4]);
        frame.extend_from_slice(&((response.len() + 1) as u16).to_be_bytes());
        frame.push(header[6]);
        frame.extend_from_slice(&response);
        if stream.write_all(&frame).await.is_err() {
            return;
        }
    }
}

fn exception(function: u8, code: u8) -> Vec<u8> {
    vec![function | 0x80, code]
}

fn respond(banks: &Mutex<Banks>, pdu: &[u8]) -> Vec<u8> {
    let mut banks = banks.lock().unwrap();
    banks.requests += 1;

    let function = pdu[0];
    if pdu.len() < 5 {
        return exception(function, 0x03);
    }
    let address = u16::from_be_bytes([pdu[1], pdu[2]]) as usize;
    let value = u16::from_be_bytes([pdu[3], pdu[4]]);

    match function {
        0x01 => {
            let end = address + value as usize;
            match banks.coils.get(address..end) {
                Some(bits) => {
                    let mut out = vec![function, bits.len().div_ceil(8) as u8];
                    out.resize(2 + bits.len().div_ceil(8), 0);
                    for (i, bit) in bits.iter().enumerate() {
                        if *bit {
                            out[2 + i / 8] |= 1 << (i % 8);
                        }
                    }
                    out
                }
                None => exception(function, 0x02),
            }
        }
        0x03 | 0x04 => {
            let end = address + value as usize;
            let bank = if function == 0x03 { &banks.holding } else { &banks.input };
            match bank.get(address..end) {
                Some(regs) => {
                    let mut out = vec![function, (regs.len() * 2) as u8];
                    for reg in regs {
                        out.extend_from_slice(&reg.to_be_bytes());
                    }
                    out
                }
                None => exception(function, 0x02),
            }
        }
        0x06 => match banks.holding.get_mut(address) {
            Some(reg) => {
                *reg = value;
                pdu[..5].to_vec()
            }
            None => exception(function, 0x02),
        },
        _ => exception(function, 0x01),
    }
}
