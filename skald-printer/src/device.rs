//! Device transports for sending ESC/POS data
//!
//! A print transaction holds one exclusive [`DeviceSession`] from open to
//! close, so callers can interleave writes with settle delays (raster output
//! corrupts on some devices without a pause before further writes).
//!
//! Supported transports:
//! - Raw TCP (port 9100), which most thermal printers speak

use crate::error::{DeviceError, DeviceResult};
use async_trait::async_trait;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{info, instrument, warn};

/// Trait for printer devices
///
/// `open` yields an exclusive session; every write inside a transaction goes
/// through that session until `close`.
#[async_trait]
pub trait ReceiptDevice: Send + Sync {
    /// Open the device for a single print transaction
    async fn open(&self) -> DeviceResult<Box<dyn DeviceSession>>;

    /// Check if the printer is online/reachable
    async fn is_online(&self) -> bool;
}

/// An open connection to the printer
#[async_trait]
pub trait DeviceSession: Send {
    /// Send raw ESC/POS data to the printer
    async fn write(&mut self, data: &[u8]) -> DeviceResult<()>;

    /// Flush and release the device
    async fn close(self: Box<Self>) -> DeviceResult<()>;
}

/// Network printer (TCP port 9100)
#[derive(Debug, Clone)]
pub struct TcpDevice {
    addr: SocketAddr,
    timeout: Duration,
}

impl TcpDevice {
    /// Create a new network device
    pub fn new(host: &str, port: u16) -> DeviceResult<Self> {
        let addr_str = format!("{}:{}", host, port);
        let addr = addr_str
            .parse()
            .map_err(|_| DeviceError::InvalidConfig(format!("Invalid address: {}", addr_str)))?;

        Ok(Self {
            addr,
            timeout: Duration::from_secs(5),
        })
    }

    /// Create from a socket address string (e.g., "192.168.1.100:9100")
    pub fn from_addr(addr: &str) -> DeviceResult<Self> {
        let addr: SocketAddr = addr
            .parse()
            .map_err(|_| DeviceError::InvalidConfig(format!("Invalid address: {}", addr)))?;

        Ok(Self {
            addr,
            timeout: Duration::from_secs(5),
        })
    }

    /// Set connection/write timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get the printer address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

#[async_trait]
impl ReceiptDevice for TcpDevice {
    #[instrument(fields(addr = %self.addr))]
    async fn open(&self) -> DeviceResult<Box<dyn DeviceSession>> {
        info!("Connecting to printer");

        let stream = tokio::time::timeout(self.timeout, TcpStream::connect(self.addr))
            .await
            .map_err(|_| DeviceError::Timeout(format!("Connection timeout: {}", self.addr)))?
            .map_err(|e| DeviceError::Connection(format!("{}: {}", self.addr, e)))?;

        Ok(Box::new(TcpSession {
            stream,
            addr: self.addr,
            timeout: self.timeout,
        }))
    }

    #[instrument(fields(addr = %self.addr))]
    async fn is_online(&self) -> bool {
        let check_timeout = Duration::from_millis(500);

        match tokio::time::timeout(check_timeout, TcpStream::connect(self.addr)).await {
            Ok(Ok(_)) => {
                info!("Printer online");
                true
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Printer offline");
                false
            }
            Err(_) => {
                warn!("Printer check timeout");
                false
            }
        }
    }
}

/// Open TCP connection to a network printer
struct TcpSession {
    stream: TcpStream,
    addr: SocketAddr,
    timeout: Duration,
}

#[async_trait]
impl DeviceSession for TcpSession {
    async fn write(&mut self, data: &[u8]) -> DeviceResult<()> {
        let io = async {
            self.stream.write_all(data).await?;
            self.stream.flush().await
        };

        tokio::time::timeout(self.timeout, io)
            .await
            .map_err(|_| DeviceError::Timeout(format!("Write timeout: {}", self.addr)))?
            .map_err(|e| {
                DeviceError::Io(std::io::Error::new(
                    e.kind(),
                    format!("Write failed: {}", e),
                ))
            })?;

        Ok(())
    }

    async fn close(mut self: Box<Self>) -> DeviceResult<()> {
        tokio::time::timeout(self.timeout, self.stream.shutdown())
            .await
            .map_err(|_| DeviceError::Timeout(format!("Close timeout: {}", self.addr)))?
            .map_err(DeviceError::Io)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tcp_device_new() {
        let device = TcpDevice::new("192.168.1.100", 9100).unwrap();
        assert_eq!(device.addr().port(), 9100);
    }

    #[test]
    fn test_tcp_device_from_addr() {
        let device = TcpDevice::from_addr("192.168.1.100:9100").unwrap();
        assert_eq!(device.addr().port(), 9100);
    }

    #[test]
    fn test_invalid_addr() {
        let result = TcpDevice::from_addr("invalid");
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_session_roundtrip_against_listener() {
        use tokio::io::AsyncReadExt;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let accept = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            sock.read_to_end(&mut buf).await.unwrap();
            buf
        });

        let device = TcpDevice::from_addr(&addr.to_string()).unwrap();
        let mut session = device.open().await.unwrap();
        session.write(b"hello printer").await.unwrap();
        session.close().await.unwrap();

        let received = accept.await.unwrap();
        assert_eq!(received, b"hello printer");
    }
}
