//! InfluxDB line-protocol exporter for raw sensor debugging.
//!
//! Implements [`DebugTelemetry`]: one UDP datagram per fast tick,
//!
//! ```text
//! ferraris_meter,device=EFCAFE counter=1234,threshold=712,pulse=688
//! ```
//!
//! Fire-and-forget.  Send errors are counted and logged at `debug` so a
//! missing collector never disturbs sampling.

use core::fmt::Write;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

use log::{debug, info};

use crate::adapters::device_id::SystemId;
use crate::app::ports::DebugTelemetry;

pub const MEASUREMENT: &str = "ferraris_meter";

pub type Line = heapless::String<96>;

/// Render one line-protocol record, newline terminated.
pub fn format_line(tag: &str, counter: u32, threshold: i32, sample: u16) -> Line {
    let mut line = Line::new();
    let _ = writeln!(
        line,
        "{MEASUREMENT},device={tag} counter={counter},threshold={threshold},pulse={sample}"
    );
    line
}

pub struct InfluxExporter {
    socket: UdpSocket,
    target: SocketAddr,
    tag: SystemId,
    send_errors: u32,
}

impl InfluxExporter {
    /// Resolve the collector once and bind an ephemeral local port.
    pub fn new(host: &str, port: u16, tag: SystemId) -> std::io::Result<Self> {
        let target = (host, port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "no address"))?;
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.set_nonblocking(true)?;
        info!("Influx: exporting to {}", target);
        Ok(Self {
            socket,
            target,
            tag,
            send_errors: 0,
        })
    }

    pub fn send_errors(&self) -> u32 {
        self.send_errors
    }
}

impl DebugTelemetry for InfluxExporter {
    fn emit(&mut self, counter: u32, threshold: i32, sample: u16) {
        let line = format_line(&self.tag, counter, threshold, sample);
        if let Err(e) = self.socket.send_to(line.as_bytes(), self.target) {
            self.send_errors = self.send_errors.wrapping_add(1);
            debug!("Influx: send failed ({}): {}", self.send_errors, e);
        }
    }
}
