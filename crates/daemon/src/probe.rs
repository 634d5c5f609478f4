// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Wharf Contributors

//! HTTP health probe.
//!
//! One plain `GET` over TCP per cycle, bounded by the policy timeout. The
//! probe and the served process share nothing but the socket; a timed-out
//! probe is a failure for that cycle and is not retried until the next
//! scheduled interval.

use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use wharf_core::{ProbeFailure, ProbeOutcome, SupervisorContract};

/// Seam between the probe loop and the network, so loop behavior can be
/// tested with scripted outcomes.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Run one probe cycle to completion (success, failure, or timeout).
    async fn probe(&self) -> ProbeOutcome;
}

/// Probes `http://{addr}{path}` with a raw GET.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    addr: String,
    path: String,
    timeout: Duration,
}

impl HttpProbe {
    pub fn new(addr: impl Into<String>, path: impl Into<String>, timeout: Duration) -> Self {
        Self { addr: addr.into(), path: path.into(), timeout }
    }

    /// Probe the contract's health endpoint on localhost.
    pub fn from_contract(contract: &SupervisorContract) -> Self {
        Self::new(
            format!("127.0.0.1:{}", contract.exposed_port()),
            contract.health_path.clone(),
            contract.health.timeout(),
        )
    }

    async fn get_status(&self) -> Result<u16, ProbeFailure> {
        let mut stream = TcpStream::connect(&self.addr)
            .await
            .map_err(|e| ProbeFailure::Connection(e.to_string()))?;
        let request = format!(
            "GET {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
            self.path
        );
        stream
            .write_all(request.as_bytes())
            .await
            .map_err(|e| ProbeFailure::Connection(e.to_string()))?;

        let mut reader = BufReader::new(&mut stream);
        let mut status_line = String::new();
        reader
            .read_line(&mut status_line)
            .await
            .map_err(|e| ProbeFailure::Connection(e.to_string()))?;
        parse_status(&status_line)
    }
}

#[async_trait]
impl HealthProbe for HttpProbe {
    async fn probe(&self) -> ProbeOutcome {
        match tokio::time::timeout(self.timeout, self.get_status()).await {
            Err(_) => ProbeOutcome::Failed(ProbeFailure::Timeout),
            Ok(Err(failure)) => ProbeOutcome::Failed(failure),
            Ok(Ok(code)) if (200..300).contains(&code) => ProbeOutcome::Success,
            Ok(Ok(code)) => ProbeOutcome::Failed(ProbeFailure::Status(code)),
        }
    }
}

/// Parse `HTTP/1.1 200 OK` into the status code.
fn parse_status(line: &str) -> Result<u16, ProbeFailure> {
    line.split_whitespace()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| ProbeFailure::Connection(format!("malformed status line '{}'", line.trim())))
}

#[cfg(test)]
#[path = "probe_tests.rs"]
mod tests;
