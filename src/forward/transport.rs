use crate::config::types::{ForwardConfig, ForwardProtocol};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpStream, UdpSocket};

use super::ForwardError;

/// Where forwarded messages go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub host: String,
    pub port: u16,
    pub protocol: ForwardProtocol,
    pub connect_timeout: Duration,
}

impl Destination {
    pub fn from_config(config: &ForwardConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            protocol: config.protocol,
            connect_timeout: config.connect_timeout,
        }
    }
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, Port {} ({})", self.host, self.port, self.protocol)
    }
}

/// Wire policy for one forward pass.
pub enum Transport {
    /// A fresh connection for every message.
    ConnectionPerMessage {
        host: String,
        port: u16,
        connect_timeout: Duration,
    },
    /// One datagram per message from a single local socket.
    Datagram { socket: UdpSocket, target: SocketAddr },
}

impl Transport {
    pub async fn connect(destination: &Destination) -> Result<Self, ForwardError> {
        match destination.protocol {
            ForwardProtocol::Tcp => Ok(Transport::ConnectionPerMessage {
                host: destination.host.clone(),
                port: destination.port,
                connect_timeout: destination.connect_timeout,
            }),
            ForwardProtocol::Udp => {
                let target = tokio::net::lookup_host((destination.host.as_str(), destination.port))
                    .await
                    .map_err(|source| ForwardError::Resolve {
                        host: destination.host.clone(),
                        source,
                    })?
                    .next()
                    .ok_or_else(|| ForwardError::Resolve {
                        host: destination.host.clone(),
                        source: std::io::Error::new(
                            std::io::ErrorKind::NotFound,
                            "no addresses found",
                        ),
                    })?;

                let bind_addr: SocketAddr = if target.is_ipv4() {
                    ([0, 0, 0, 0], 0).into()
                } else {
                    (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
                };
                let socket = UdpSocket::bind(bind_addr).await.map_err(ForwardError::Send)?;
                Ok(Transport::Datagram { socket, target })
            }
        }
    }

    pub async fn send(&self, payload: &[u8]) -> Result<(), ForwardError> {
        match self {
            Transport::ConnectionPerMessage {
                host,
                port,
                connect_timeout,
            } => {
                let mut stream = tokio::time::timeout(
                    *connect_timeout,
                    TcpStream::connect((host.as_str(), *port)),
                )
                .await
                .map_err(|_| ForwardError::ConnectTimeout(*connect_timeout))?
                .map_err(|source| ForwardError::Connect {
                    addr: format!("{}:{}", host, port),
                    source,
                })?;

                stream.write_all(payload).await.map_err(ForwardError::Send)?;
                stream.shutdown().await.map_err(ForwardError::Send)?;
                Ok(())
            }
            Transport::Datagram { socket, target } => {
                socket
                    .send_to(payload, *target)
                    .await
                    .map_err(ForwardError::Send)?;
                Ok(())
            }
        }
    }
}
