// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shared helpers for integration tests.

#![allow(dead_code)]

use mqtt_writer::{ChannelSource, InboundMessage, IngestionPipeline, StopHandle};
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// One HTTP request seen by [`HttpStub`].
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: String,
    pub target: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Minimal HTTP/1.1 server standing in for InfluxDB.
///
/// `/ping` always answers 204; every other request gets `write_status`.
pub struct HttpStub {
    port: u16,
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
}

impl HttpStub {
    pub fn start(write_status: u16) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let requests = Arc::new(Mutex::new(Vec::new()));

        let captured = requests.clone();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                // Recorded before the response goes out.
                let _ = serve(stream, write_status, &captured);
            }
        });

        Self { port, requests }
    }

    pub fn url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Requests other than `/ping`, in arrival order.
    pub fn writes(&self) -> Vec<CapturedRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| !r.target.starts_with("/ping"))
            .cloned()
            .collect()
    }
}

fn serve(
    stream: TcpStream,
    write_status: u16,
    captured: &Mutex<Vec<CapturedRequest>>,
) -> Option<()> {
    stream.set_read_timeout(Some(Duration::from_secs(5))).ok()?;
    let mut reader = BufReader::new(stream.try_clone().ok()?);

    let mut line = String::new();
    reader.read_line(&mut line).ok()?;
    let mut parts = line.split_whitespace();
    let method = parts.next()?.to_string();
    let target = parts.next()?.to_string();

    let mut headers = Vec::new();
    loop {
        let mut header = String::new();
        reader.read_line(&mut header).ok()?;
        let header = header.trim_end();
        if header.is_empty() {
            break;
        }
        if let Some((k, v)) = header.split_once(':') {
            headers.push((k.trim().to_string(), v.trim().to_string()));
        }
    }

    let length = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).ok()?;

    let status = if target.starts_with("/ping") {
        204
    } else {
        write_status
    };
    captured.lock().ok()?.push(CapturedRequest {
        method,
        target,
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    });

    let reason = if status < 300 { "OK" } else { "Error" };
    let mut stream = stream;
    write!(
        stream,
        "HTTP/1.1 {} {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        status, reason
    )
    .ok()?;
    stream.flush().ok()
}

/// Feed `messages` through `pipeline` and run until all are consumed.
pub fn run_messages(pipeline: &mut IngestionPipeline, messages: Vec<InboundMessage>) {
    let (mut source, tx) = ChannelSource::new();
    for message in messages {
        tx.send(message).unwrap();
    }
    drop(tx);
    pipeline.run(&mut source, &StopHandle::new());
}
