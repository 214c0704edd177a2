/*
 * This file is part of Valvemon.
 *
 * Copyright (C) 2025 Valvemon contributors
 *
 * Valvemon is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Valvemon is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Valvemon. If not, see <https://www.gnu.org/licenses/>.
 */

//! Alert delivery
//!
//! Alerts either go to the monitoring station as UDP datagrams or are echoed to
//! a writer (stdout in practice).

use std::io::Write;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};

use tracing::{debug, warn};
use vm_protocol::{AlertMessage, MAX_MSG_STR_LENGTH};

use crate::error::{Result, ValvemonError};
use crate::model::TestPoint;

/// A failed valve, as reported for one test point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub tp_index: usize,
    pub tp_name: String,
    pub valve: u32,
    pub message: String,
}

impl Alert {
    pub fn for_test_point(tp_index: usize, tp: &TestPoint) -> Self {
        let mut message = format!("Valve {} failed, registered on tp {}", tp.valve, tp.name);
        truncate_on_char_boundary(&mut message, MAX_MSG_STR_LENGTH - 1);
        Self {
            tp_index,
            tp_name: tp.name.clone(),
            valve: tp.valve,
            message,
        }
    }
}

fn truncate_on_char_boundary(text: &mut String, max_len: usize) {
    if text.len() <= max_len {
        return;
    }
    let mut end = max_len;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text.truncate(end);
}

pub trait Alerter {
    /// Called once before the alerts raised by one vector
    fn begin_batch(&mut self, _vector: &[u8], _count: usize) {}

    fn send(&mut self, alert: &Alert) -> Result<()>;
}

/// Prints alerts instead of transmitting them
pub struct EchoAlerter<W: Write> {
    out: W,
    index: usize,
}

impl<W: Write> EchoAlerter<W> {
    pub fn new(out: W) -> Self {
        Self { out, index: 0 }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Alerter for EchoAlerter<W> {
    fn begin_batch(&mut self, vector: &[u8], count: usize) {
        self.index = 0;
        let bits: String = vector.iter().map(|b| format!(" {}", b)).collect();
        if let Err(e) = writeln!(self.out, "Data:{}", bits)
            .and_then(|_| writeln!(self.out, "{} errors:", count))
        {
            warn!("Failed to echo alert header: {}", e);
        }
    }

    fn send(&mut self, alert: &Alert) -> Result<()> {
        writeln!(self.out, "Error[{}] {}", self.index, alert.message)
            .and_then(|_| self.out.flush())
            .map_err(|e| ValvemonError::alert_dispatch(format!("echo failed: {}", e)))?;
        self.index += 1;
        Ok(())
    }
}

fn resolve(addr: &str, port: u16) -> std::io::Result<SocketAddr> {
    (addr, port).to_socket_addrs()?.next().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses found")
    })
}

/// Sends each alert as one JSON datagram to the monitoring station
pub struct NetworkAlerter {
    socket: UdpSocket,
    target: String,
}

impl NetworkAlerter {
    pub fn connect(addr: &str, port: u16) -> Result<Self> {
        let target = match addr.parse::<Ipv6Addr>() {
            Ok(_) => format!("[{}]:{}", addr, port),
            Err(_) => format!("{}:{}", addr, port),
        };
        let remote = resolve(addr, port).map_err(|e| {
            ValvemonError::alert_dispatch(format!("cannot resolve {}: {}", target, e))
        })?;
        let local: SocketAddr = match remote {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        let socket = UdpSocket::bind(local)
            .and_then(|s| s.connect(remote).map(|_| s))
            .map_err(|e| {
                ValvemonError::alert_dispatch(format!("cannot open sender to {}: {}", target, e))
            })?;
        debug!("Alert sender connected to {}", target);
        Ok(Self { socket, target })
    }

    pub fn target(&self) -> &str {
        &self.target
    }
}

impl Alerter for NetworkAlerter {
    fn send(&mut self, alert: &Alert) -> Result<()> {
        let payload = AlertMessage::hardware_error_valve(alert.valve, alert.message.as_str())
            .encode()
            .map_err(ValvemonError::alert_dispatch)?;
        let sent = self.socket.send(&payload).map_err(|e| {
            ValvemonError::alert_dispatch(format!("send to {} failed: {}", self.target, e))
        })?;
        if sent != payload.len() {
            return Err(ValvemonError::alert_dispatch(format!(
                "short send to {}: {} of {} bytes",
                self.target,
                sent,
                payload.len()
            )));
        }
        Ok(())
    }
}
