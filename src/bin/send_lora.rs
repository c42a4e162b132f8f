//! Join a LoRaWAN network, send one 15 byte uplink, exit
//!
//! Exit status: 0 completed, 1 hardware/transport setup failed, 2 payload
//! rejected (`--strict`), -1 session failed.

use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use log::{error, info};

use lorawan_uplink::{
    clock::StdClock,
    config::{DeviceConfig, SessionConfig, AESKey, EUI64},
    hardware::{PinBoard, TracePin},
    lorawan::{MacConfig, RadioMac},
    payload::{self, Hex, PayloadError},
    radio::UdpRadio,
    session::controller::SessionController,
    shutdown::{self, ProcessShutdown},
    ExitCode, UPLINK_LEN,
};

#[derive(Parser)]
#[command(name = "send_lora", about = "Send one LoRaWAN uplink over OTAA")]
struct Cli {
    /// Payload: 15 bytes as 30 hex characters
    payload: String,

    /// Gateway bridge address
    #[arg(long, default_value = "127.0.0.1:1700")]
    gateway: String,

    /// Local address for the radio transport
    #[arg(long, default_value = "0.0.0.0:0")]
    bind: String,

    /// Device EUI, 16 hex characters, LSB first
    #[arg(long, value_parser = parse_eui)]
    dev_eui: Option<EUI64>,

    /// Application EUI, 16 hex characters, LSB first
    #[arg(long, value_parser = parse_eui)]
    app_eui: Option<EUI64>,

    /// Application key, 32 hex characters, MSB first
    #[arg(long, value_parser = parse_key)]
    app_key: Option<AESKey>,

    /// Seconds allowed for joining, counted from loop start
    #[arg(long, default_value_t = 15)]
    join_timeout: u64,

    /// Sleep between engine polls, in milliseconds
    #[arg(long, default_value_t = 1)]
    poll_interval_ms: u64,

    /// Unanswered join requests before the engine gives up
    #[arg(long, default_value_t = 3)]
    max_join_attempts: u8,

    /// Reject payloads that are not exactly 30 hex characters
    #[arg(long)]
    strict: bool,
}

fn parse_eui(s: &str) -> Result<EUI64, PayloadError> {
    payload::decode_exact(s)
}

fn parse_key(s: &str) -> Result<AESKey, PayloadError> {
    payload::decode_exact(s)
}

impl Cli {
    fn device(&self) -> DeviceConfig {
        let defaults = DeviceConfig::default();
        DeviceConfig::new_otaa(
            self.dev_eui.unwrap_or(defaults.dev_eui),
            self.app_eui.unwrap_or(defaults.app_eui),
            self.app_key.unwrap_or(defaults.app_key),
        )
    }

    fn session(&self) -> SessionConfig {
        SessionConfig {
            join_timeout: Duration::from_secs(self.join_timeout),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            ..SessionConfig::default()
        }
    }

    fn mac(&self) -> MacConfig {
        MacConfig {
            max_join_attempts: self.max_join_attempts,
            ..MacConfig::default()
        }
    }

    fn payload(&self) -> Result<[u8; UPLINK_LEN], PayloadError> {
        if self.strict {
            payload::decode_strict(&self.payload)
        } else {
            Ok(payload::decode_lenient(&self.payload))
        }
    }
}

fn send(cli: &Cli, payload: [u8; UPLINK_LEN]) -> anyhow::Result<ExitCode> {
    shutdown::install().context("installing interrupt handler")?;

    let device = cli.device();
    info!(
        "DevEUI {} AppEUI {}",
        Hex(&device.dev_eui),
        Hex(&device.app_eui)
    );

    let radio = UdpRadio::bind(&cli.bind, &cli.gateway)
        .with_context(|| format!("opening radio transport to {}", cli.gateway))?;
    info!(
        "radio transport {} -> {}",
        radio.local_addr().context("reading local address")?,
        cli.gateway
    );
    let mut mac = RadioMac::new(radio, device, cli.mac());
    mac.init().context("initialising radio")?;

    let board = PinBoard::new(TracePin::new("led"), TracePin::new("nss"));
    let mut controller =
        SessionController::new(mac, StdClock::new(), ProcessShutdown, board, cli.session());
    controller.start(payload);

    let report = controller.run();
    info!(
        "session ended in {:?} after {} iterations, exit {}",
        report.state,
        report.iterations,
        report.exit_code.as_i32()
    );
    Ok(report.exit_code)
}

fn main() {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    info!("send_lora Starting");

    let payload = match cli.payload() {
        Ok(payload) => payload,
        Err(e) => {
            error!("invalid payload: {}", e);
            std::process::exit(ExitCode::InvalidPayload.as_i32());
        }
    };
    info!("Payload {}", Hex(&payload));

    let code = match send(&cli, payload) {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::HardwareInit
        }
    };
    std::process::exit(code.as_i32());
}
