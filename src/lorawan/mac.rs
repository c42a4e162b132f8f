//! OTAA class A engine
//!
//! One exchange at a time: a join (request, then RX1/RX2 for the accept) or a
//! data uplink (frame, then RX1/RX2 for a downlink). Every transmission waits
//! for the duty-cycle band. Work happens inside [`MacEngine::poll`]; nothing
//! blocks.

use core::time::Duration;

use heapless::Vec;
use log::{debug, info, warn};

use super::airtime::{self, DutyCycle};
use super::frame::{self, Frame, JoinAccept, LINK_CHECK_REQ, MAX_FRAME_SIZE};
use super::phy::{self, DataRate, TimingParams, DEFAULT_CHANNELS, RX2_FREQUENCY};
use super::{Events, MacEngine, MacError};
use crate::config::device::{DeviceConfig, SessionKeys};
use crate::crypto;
use crate::radio::Radio;
use crate::session::{Event, UplinkRequest};

/// Maximum number of configured channels
pub const MAX_CHANNELS: usize = 8;

// FHDR with one FOpt, plus FPort
const DATA_OVERHEAD: usize = 7 + 1 + 1;

/// Engine configuration
#[derive(Debug, Clone)]
pub struct MacConfig {
    /// Uplink channels, used round-robin
    pub channels: Vec<u32, MAX_CHANNELS>,
    /// RX2 frequency in Hz
    pub rx2_frequency: u32,
    /// RX2 data rate
    pub rx2_data_rate: DataRate,
    /// Uplink and RX1 data rate
    pub data_rate: DataRate,
    /// Transmit power in dBm
    pub tx_power: i8,
    /// Receive window delays
    pub timing: TimingParams,
    /// How long each receive window stays open
    pub rx_window: Duration,
    /// Unanswered join requests before `JoinFailed`
    pub max_join_attempts: u8,
    /// Duty-cycle divisor (100 is 1 %)
    pub duty_cycle_divisor: u32,
    /// DevNonce of the first join request
    pub dev_nonce: u16,
}

impl Default for MacConfig {
    fn default() -> Self {
        Self {
            channels: Vec::from_slice(&DEFAULT_CHANNELS).unwrap_or_default(),
            rx2_frequency: RX2_FREQUENCY,
            rx2_data_rate: DataRate::SF9BW125,
            data_rate: DataRate::SF7BW125,
            tx_power: 14,
            timing: TimingParams::default(),
            rx_window: Duration::from_millis(500),
            max_join_attempts: 3,
            duty_cycle_divisor: 100,
            dev_nonce: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exchange {
    Join,
    Data,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Window {
    Rx1,
    Rx2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Idle,
    /// Frame waiting for the band
    Tx(Exchange),
    /// Uplink ended at `tx_end`; waiting for or inside a receive window
    Rx {
        exchange: Exchange,
        tx_end: Duration,
        window: Window,
        listening: bool,
    },
}

/// Class A engine over a [`Radio`]
pub struct RadioMac<R: Radio> {
    radio: R,
    device: DeviceConfig,
    config: MacConfig,
    timing: TimingParams,
    keys: Option<SessionKeys>,
    op: Op,
    uplink: Option<UplinkRequest>,
    events: Events,
    duty_cycle: DutyCycle,
    channel: usize,
    tx_frequency: u32,
    dev_nonce: u16,
    join_attempts: u8,
    link_check: bool,
}

impl<R: Radio> RadioMac<R> {
    /// Create an engine; call [`init`](Self::init) before use
    pub fn new(radio: R, device: DeviceConfig, config: MacConfig) -> Self {
        Self {
            radio,
            device,
            timing: config.timing,
            keys: None,
            op: Op::Idle,
            uplink: None,
            events: Events::new(),
            duty_cycle: DutyCycle::new(config.duty_cycle_divisor),
            channel: 0,
            tx_frequency: DEFAULT_CHANNELS[0],
            dev_nonce: config.dev_nonce,
            join_attempts: 0,
            link_check: true,
            config,
        }
    }

    /// Initialize the radio
    pub fn init(&mut self) -> Result<(), R::Error> {
        self.radio.init()
    }

    /// Underlying radio
    pub fn radio(&self) -> &R {
        &self.radio
    }

    /// Underlying radio, mutably
    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    /// Session keys, once joined
    pub fn keys(&self) -> Option<&SessionKeys> {
        self.keys.as_ref()
    }

    /// Whether uplinks carry a LinkCheckReq
    pub fn link_check(&self) -> bool {
        self.link_check
    }

    /// DevNonce of the next or current join request
    pub fn dev_nonce(&self) -> u16 {
        self.dev_nonce
    }

    /// Give back the radio
    pub fn free(self) -> R {
        self.radio
    }

    fn emit(&mut self, event: Event) {
        if self.events.push(event).is_err() {
            warn!("event queue full, dropping {}", event);
        }
    }

    fn next_channel(&mut self) -> u32 {
        let channels = &self.config.channels;
        let frequency = if channels.is_empty() {
            DEFAULT_CHANNELS[0]
        } else {
            channels[self.channel % channels.len()]
        };
        self.channel = self.channel.wrapping_add(1);
        frequency
    }

    fn send(&mut self, now: Duration, frame: &[u8]) -> Result<Duration, MacError<R::Error>> {
        let frequency = self.next_channel();
        let data_rate = self.config.data_rate;
        self.radio
            .configure_tx(phy::tx_config(frequency, data_rate, self.config.tx_power))
            .map_err(MacError::Radio)?;
        self.radio.transmit(frame).map_err(MacError::Radio)?;

        let airtime = airtime::time_on_air(data_rate, frame.len());
        self.duty_cycle.record(now, airtime);
        self.tx_frequency = frequency;
        debug!(
            "TX {} bytes on {} Hz SF{}, {} ms on air",
            frame.len(),
            frequency,
            data_rate.spreading_factor(),
            airtime.as_millis()
        );
        Ok(now + airtime)
    }

    fn transmit(&mut self, exchange: Exchange, now: Duration) -> Result<(), MacError<R::Error>> {
        if !self.duty_cycle.is_available(now) {
            return Ok(());
        }

        let frame: Frame = match exchange {
            Exchange::Join => frame::build_join_request(&self.device, self.dev_nonce)?,
            Exchange::Data => {
                let keys = self.keys.as_ref().ok_or(MacError::NotJoined)?;
                let Some(request) = self.uplink.as_ref() else {
                    self.op = Op::Idle;
                    return Ok(());
                };
                let fopts: &[u8] = if self.link_check { &[LINK_CHECK_REQ] } else { &[] };
                frame::build_data_uplink(
                    keys,
                    request.confirmed,
                    request.port,
                    fopts,
                    &request.payload,
                )?
            }
        };

        let tx_end = self.send(now, &frame)?;
        if exchange == Exchange::Data {
            if let Some(keys) = self.keys.as_mut() {
                keys.increment_fcnt_up();
            }
        }
        self.op = Op::Rx {
            exchange,
            tx_end,
            window: Window::Rx1,
            listening: false,
        };
        Ok(())
    }

    fn listen(
        &mut self,
        now: Duration,
        exchange: Exchange,
        tx_end: Duration,
        window: Window,
        listening: bool,
    ) -> Result<(), MacError<R::Error>> {
        let (delay, frequency, data_rate) = match (exchange, window) {
            (Exchange::Join, Window::Rx1) => {
                (self.timing.join_accept_delay1, self.tx_frequency, self.config.data_rate)
            }
            (Exchange::Join, Window::Rx2) => (
                self.timing.join_accept_delay2,
                self.config.rx2_frequency,
                self.config.rx2_data_rate,
            ),
            (Exchange::Data, Window::Rx1) => {
                (self.timing.rx1_delay, self.tx_frequency, self.config.data_rate)
            }
            (Exchange::Data, Window::Rx2) => (
                self.timing.rx2_delay,
                self.config.rx2_frequency,
                self.config.rx2_data_rate,
            ),
        };

        let opens = tx_end + delay;
        if now < opens {
            return Ok(());
        }

        if !listening {
            self.radio
                .configure_rx(phy::rx_config(frequency, data_rate, self.config.rx_window))
                .map_err(MacError::Radio)?;
            self.op = Op::Rx {
                exchange,
                tx_end,
                window,
                listening: true,
            };
        }

        let mut buffer = [0u8; MAX_FRAME_SIZE];
        loop {
            match self.radio.receive(&mut buffer) {
                Ok(len) => {
                    let len = len.min(MAX_FRAME_SIZE);
                    if self.accept(exchange, &mut buffer[..len]) {
                        return self.radio.sleep().map_err(MacError::Radio);
                    }
                }
                Err(nb::Error::WouldBlock) => break,
                Err(nb::Error::Other(e)) => return Err(MacError::Radio(e)),
            }
        }

        if now >= opens + self.config.rx_window {
            self.radio.sleep().map_err(MacError::Radio)?;
            match window {
                Window::Rx1 => {
                    self.op = Op::Rx {
                        exchange,
                        tx_end,
                        window: Window::Rx2,
                        listening: false,
                    }
                }
                Window::Rx2 => self.windows_closed(exchange),
            }
        }
        Ok(())
    }

    /// Handle a frame heard in a window; `true` ends the exchange
    fn accept(&mut self, exchange: Exchange, buffer: &mut [u8]) -> bool {
        match exchange {
            Exchange::Join => match frame::parse_join_accept(&self.device.app_key, buffer) {
                Ok(accept) => {
                    self.joined(&accept);
                    true
                }
                Err(e) => {
                    debug!("ignoring frame in join window: {}", e);
                    false
                }
            },
            Exchange::Data => {
                let Some(keys) = self.keys.as_mut() else {
                    return false;
                };
                match frame::parse_downlink(keys, buffer) {
                    Ok(downlink) => {
                        keys.observe_fcnt_down(downlink.fcnt);
                        if let Some((margin, gateways)) = downlink.link_check {
                            info!("link check: margin {} dB, {} gateway(s)", margin, gateways);
                        }
                        self.complete(downlink.ack, downlink.payload_len);
                        true
                    }
                    Err(e) => {
                        debug!("ignoring frame in RX window: {}", e);
                        false
                    }
                }
            }
        }
    }

    fn joined(&mut self, accept: &JoinAccept) {
        let (nwk_skey, app_skey) = crypto::derive_session_keys(
            &self.device.app_key,
            &accept.app_nonce,
            &accept.net_id,
            self.dev_nonce,
        );
        self.keys = Some(SessionKeys::new(accept.dev_addr, nwk_skey, app_skey));

        let rx1 = Duration::from_secs(u64::from((accept.rx_delay & 0x0F).max(1)));
        self.timing.rx1_delay = rx1;
        self.timing.rx2_delay = rx1 + Duration::from_secs(1);

        info!("joined as {:02x?}", accept.dev_addr);
        self.join_attempts = 0;
        self.dev_nonce = self.dev_nonce.wrapping_add(1);
        self.op = if self.uplink.is_some() {
            Op::Tx(Exchange::Data)
        } else {
            Op::Idle
        };
        self.emit(Event::JoinSucceeded);
    }

    fn complete(&mut self, ack: bool, rx_bytes: usize) {
        self.uplink = None;
        self.op = Op::Idle;
        self.emit(Event::TransmissionComplete {
            ack,
            rx_bytes: rx_bytes.min(u8::MAX as usize) as u8,
        });
    }

    fn windows_closed(&mut self, exchange: Exchange) {
        match exchange {
            Exchange::Join => {
                self.join_attempts = self.join_attempts.saturating_add(1);
                self.dev_nonce = self.dev_nonce.wrapping_add(1);
                if self.join_attempts >= self.config.max_join_attempts {
                    warn!("no join accept after {} attempt(s)", self.join_attempts);
                    self.uplink = None;
                    self.op = Op::Idle;
                    self.emit(Event::JoinFailed);
                } else {
                    debug!("join attempt {} unanswered", self.join_attempts);
                    self.op = Op::Tx(Exchange::Join);
                }
            }
            Exchange::Data => self.complete(false, 0),
        }
    }
}

impl<R: Radio> MacEngine for RadioMac<R> {
    type Error = R::Error;

    fn reset(&mut self) {
        self.keys = None;
        self.op = Op::Idle;
        self.uplink = None;
        self.events.clear();
        self.timing = self.config.timing;
        self.duty_cycle = DutyCycle::new(self.config.duty_cycle_divisor);
        self.channel = 0;
        self.dev_nonce = self.config.dev_nonce;
        self.join_attempts = 0;
        self.link_check = true;
        if let Err(e) = self.radio.sleep() {
            warn!("radio sleep failed: {:?}", e);
        }
    }

    fn is_busy(&self) -> bool {
        self.uplink.is_some() || self.op != Op::Idle
    }

    fn queue_uplink(&mut self, request: &UplinkRequest) -> Result<(), MacError<Self::Error>> {
        if self.is_busy() {
            return Err(MacError::Busy);
        }
        if DATA_OVERHEAD + request.payload.len() > self.config.data_rate.max_payload_size() {
            return Err(MacError::PayloadTooLarge);
        }

        self.uplink = Some(*request);
        if self.keys.is_some() {
            self.op = Op::Tx(Exchange::Data);
        } else {
            self.op = Op::Tx(Exchange::Join);
            self.emit(Event::JoinStarted);
        }
        Ok(())
    }

    fn set_link_check(&mut self, enabled: bool) {
        debug!("link check {}", if enabled { "on" } else { "off" });
        self.link_check = enabled;
    }

    fn poll(&mut self, now: Duration) -> Result<Events, MacError<Self::Error>> {
        match self.op {
            Op::Idle => {}
            Op::Tx(exchange) => self.transmit(exchange, now)?,
            Op::Rx {
                exchange,
                tx_end,
                window,
                listening,
            } => self.listen(now, exchange, tx_end, window, listening)?,
        }
        Ok(core::mem::take(&mut self.events))
    }

    fn release(&mut self) {
        self.op = Op::Idle;
        self.uplink = None;
        if let Err(e) = self.radio.sleep() {
            warn!("radio sleep failed: {:?}", e);
        }
    }
}
