//! Radio over UDP
//!
//! Carries raw PHY payloads to and from a gateway bridge, one datagram per
//! LoRa packet. Useful on hosts without a radio front-end: the bridge (or a
//! network simulator) sits behind the configured address. The socket is
//! non-blocking, so `receive` maps "nothing yet" to `WouldBlock`.

use std::io;
use std::net::UdpSocket;

use log::debug;

use super::traits::{Radio, RxConfig, TxConfig};

/// UDP transport error
#[derive(Debug)]
pub enum UdpRadioError {
    /// Socket error
    Io(io::Error),
    /// Transmit attempted before `configure_tx`
    NotConfigured,
}

impl From<io::Error> for UdpRadioError {
    fn from(error: io::Error) -> Self {
        UdpRadioError::Io(error)
    }
}

impl std::fmt::Display for UdpRadioError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UdpRadioError::Io(e) => write!(f, "socket error: {}", e),
            UdpRadioError::NotConfigured => f.write_str("radio not configured for TX"),
        }
    }
}

impl std::error::Error for UdpRadioError {}

/// Radio backed by a connected, non-blocking UDP socket
pub struct UdpRadio {
    socket: UdpSocket,
    tx: Option<TxConfig>,
    rx: Option<RxConfig>,
}

impl UdpRadio {
    /// Bind `local` and connect to the gateway bridge at `gateway`
    pub fn bind(local: &str, gateway: &str) -> Result<Self, UdpRadioError> {
        let socket = UdpSocket::bind(local)?;
        socket.connect(gateway)?;
        socket.set_nonblocking(true)?;
        Ok(Self {
            socket,
            tx: None,
            rx: None,
        })
    }

    /// Local socket address
    pub fn local_addr(&self) -> Result<std::net::SocketAddr, UdpRadioError> {
        Ok(self.socket.local_addr()?)
    }
}

impl Radio for UdpRadio {
    type Error = UdpRadioError;

    fn init(&mut self) -> Result<(), Self::Error> {
        let peer = self.socket.peer_addr()?;
        debug!("udp radio bridged to {}", peer);
        Ok(())
    }

    fn configure_tx(&mut self, config: TxConfig) -> Result<(), Self::Error> {
        self.rx = None;
        self.tx = Some(config);
        Ok(())
    }

    fn configure_rx(&mut self, config: RxConfig) -> Result<(), Self::Error> {
        debug!(
            "rx {} Hz SF{} for {} ms",
            config.frequency, config.modulation.spreading_factor, config.timeout_ms
        );
        self.rx = Some(config);
        Ok(())
    }

    fn transmit(&mut self, buffer: &[u8]) -> Result<(), Self::Error> {
        let tx = self.tx.ok_or(UdpRadioError::NotConfigured)?;
        debug!(
            "tx {} bytes on {} Hz SF{}",
            buffer.len(),
            tx.frequency,
            tx.modulation.spreading_factor
        );
        self.socket.send(buffer)?;
        Ok(())
    }

    fn receive(&mut self, buffer: &mut [u8]) -> nb::Result<usize, Self::Error> {
        if self.rx.is_none() {
            return Err(nb::Error::WouldBlock);
        }
        match self.socket.recv(buffer) {
            Ok(n) => Ok(n),
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => Err(nb::Error::WouldBlock),
            // ICMP unreachable from an absent bridge: nothing to receive
            Err(ref e) if e.kind() == io::ErrorKind::ConnectionRefused => Err(nb::Error::WouldBlock),
            Err(e) => Err(nb::Error::Other(UdpRadioError::Io(e))),
        }
    }

    fn sleep(&mut self) -> Result<(), Self::Error> {
        self.rx = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radio::traits::ModulationParams;

    const MODULATION: ModulationParams = ModulationParams {
        spreading_factor: 7,
        bandwidth: 125_000,
        coding_rate: 5,
    };

    #[test]
    fn test_datagrams_reach_the_bridge_and_back() {
        let bridge = UdpSocket::bind("127.0.0.1:0").unwrap();
        let bridge_addr = bridge.local_addr().unwrap().to_string();

        let mut radio = UdpRadio::bind("127.0.0.1:0", &bridge_addr).unwrap();
        radio.init().unwrap();

        assert!(matches!(
            radio.transmit(&[1, 2, 3]),
            Err(UdpRadioError::NotConfigured)
        ));

        radio
            .configure_tx(TxConfig {
                power: 14,
                frequency: 868_100_000,
                modulation: MODULATION,
            })
            .unwrap();
        radio.transmit(&[1, 2, 3]).unwrap();

        let mut buf = [0u8; 16];
        let (n, from) = bridge.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..n], &[1, 2, 3]);
        assert_eq!(from, radio.local_addr().unwrap());

        let mut rx = [0u8; 16];
        // not listening yet
        assert!(matches!(radio.receive(&mut rx), Err(nb::Error::WouldBlock)));

        radio
            .configure_rx(RxConfig {
                frequency: 868_100_000,
                modulation: MODULATION,
                timeout_ms: 1000,
            })
            .unwrap();
        bridge.send_to(&[9, 8], from).unwrap();

        let mut received = None;
        for _ in 0..200 {
            match radio.receive(&mut rx) {
                Ok(n) => {
                    received = Some(n);
                    break;
                }
                Err(nb::Error::WouldBlock) => std::thread::sleep(std::time::Duration::from_millis(5)),
                Err(nb::Error::Other(e)) => panic!("receive failed: {}", e),
            }
        }
        assert_eq!(received, Some(2));
        assert_eq!(&rx[..2], &[9, 8]);
    }
}
