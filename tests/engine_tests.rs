use std::sync::atomic::AtomicBool;
use std::time::Duration;

use lorawan_uplink::{
    config::{device::DEFAULT_APP_KEY, DeviceConfig, SessionConfig},
    lorawan::{frame::LINK_CHECK_REQ, MacConfig, MacEngine, MacError, RadioMac},
    session::{controller::SessionController, Event},
    ExitCode, FailReason, State, UplinkRequest, UPLINK_LEN,
};

use mock::{ManualClock, MockError, MockNetwork, MockRadio, RecordingBoard};

const PAYLOAD: [u8; UPLINK_LEN] = [0x42; UPLINK_LEN];

fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

fn engine(network: MockNetwork, config: MacConfig) -> RadioMac<MockRadio> {
    let mut mac = RadioMac::new(
        MockRadio::with_network(network),
        DeviceConfig::default(),
        config,
    );
    mac.init().unwrap();
    mac.reset();
    mac
}

/// Poll every 100 ms up to `until`, collecting events
fn drive(mac: &mut RadioMac<MockRadio>, from: u64, until: u64) -> Vec<Event> {
    let mut events = Vec::new();
    for t in (from..=until).step_by(100) {
        events.extend(mac.poll(ms(t)).unwrap().iter().copied());
    }
    events
}

#[test]
fn test_join_then_unconfirmed_uplink() {
    let mut mac = engine(MockNetwork::new(DEFAULT_APP_KEY), MacConfig::default());
    assert!(mac.radio().initialized);
    assert!(!mac.is_busy());

    mac.queue_uplink(&UplinkRequest::unconfirmed(1, PAYLOAD)).unwrap();
    assert!(mac.is_busy());

    // join request goes out on the first poll
    assert_eq!(mac.poll(ms(0)).unwrap().as_slice(), &[Event::JoinStarted]);
    let join = mac.radio().last_tx().unwrap();
    assert_eq!(join.len(), 23);
    assert_eq!(join[0], 0x00);
    assert_eq!(&join[17..19], &[0x00, 0x00]);
    assert_eq!(mac.radio().tx_configs[0].frequency, 868_100_000);

    // nothing until RX1, five seconds after the uplink
    assert!(mac.poll(ms(4_000)).unwrap().is_empty());
    assert!(!mac.radio().listening);

    assert_eq!(mac.poll(ms(5_100)).unwrap().as_slice(), &[Event::JoinSucceeded]);
    assert_eq!(mac.radio().rx_configs[0].frequency, 868_100_000);
    assert_eq!(mac.radio().rx_configs[0].modulation.spreading_factor, 7);

    let keys = mac.keys().unwrap();
    let network_keys = mac.radio().network.as_ref().unwrap().keys.clone().unwrap();
    assert_eq!(keys.dev_addr, [0x26, 0x01, 0x1b, 0xda]);
    assert_eq!(keys.nwk_skey, network_keys.nwk_skey);
    assert_eq!(keys.app_skey, network_keys.app_skey);
    // the next join would use a fresh nonce
    assert_eq!(mac.dev_nonce(), 1);

    // band still closed by the join request
    assert!(mac.poll(ms(6_000)).unwrap().is_empty());
    assert_eq!(mac.radio().transmitted.len(), 1);

    assert!(mac.poll(ms(6_200)).unwrap().is_empty());
    let uplink = mac.radio().last_tx().unwrap();
    assert_eq!(uplink.len(), 29);
    assert_eq!(uplink[0], 0x40);
    assert_eq!(uplink[5], 0x01);
    assert_eq!(uplink[8], LINK_CHECK_REQ);
    assert_eq!(uplink[9], 1);
    assert_eq!(mac.radio().tx_configs[1].frequency, 868_300_000);

    assert_eq!(
        mac.poll(ms(7_300)).unwrap().as_slice(),
        &[Event::TransmissionComplete {
            ack: false,
            rx_bytes: 0
        }]
    );
    assert!(!mac.is_busy());
    assert_eq!(mac.keys().unwrap().fcnt_up, 1);
}

#[test]
fn test_confirmed_uplink_reports_ack_and_payload() {
    let mut network = MockNetwork::new(DEFAULT_APP_KEY);
    network.ack = true;
    network.reply = b"pong".to_vec();
    let mut mac = engine(network, MacConfig::default());

    let request = UplinkRequest {
        payload: PAYLOAD,
        port: 1,
        confirmed: true,
    };
    mac.queue_uplink(&request).unwrap();
    let events = drive(&mut mac, 0, 10_000);

    assert_eq!(
        events,
        vec![
            Event::JoinStarted,
            Event::JoinSucceeded,
            Event::TransmissionComplete {
                ack: true,
                rx_bytes: 4
            }
        ]
    );
    assert_eq!(mac.radio().transmitted[1][0], 0x80);
}

#[test]
fn test_silent_network_gives_up_joining() {
    let mut network = MockNetwork::new(DEFAULT_APP_KEY);
    network.answer_joins = false;
    let config = MacConfig {
        max_join_attempts: 2,
        ..MacConfig::default()
    };
    let mut mac = engine(network, config);

    mac.queue_uplink(&UplinkRequest::unconfirmed(1, PAYLOAD)).unwrap();
    let events = drive(&mut mac, 0, 20_000);

    assert_eq!(events, vec![Event::JoinStarted, Event::JoinFailed]);
    assert!(!mac.is_busy());
    assert!(mac.keys().is_none());
    assert_eq!(mac.dev_nonce(), 2);

    let radio = mac.radio();
    assert_eq!(radio.transmitted.len(), 2);
    // a fresh DevNonce per attempt
    assert_eq!(&radio.transmitted[0][17..19], &[0x00, 0x00]);
    assert_eq!(&radio.transmitted[1][17..19], &[0x01, 0x00]);
    // RX1 and RX2 for each attempt
    assert_eq!(radio.rx_configs.len(), 4);
    assert_eq!(radio.rx_configs[1].frequency, 869_525_000);
    assert_eq!(radio.rx_configs[1].modulation.spreading_factor, 9);
}

#[test]
fn test_unanswered_uplink_completes_after_rx2() {
    let mut network = MockNetwork::new(DEFAULT_APP_KEY);
    network.answer_uplinks = false;
    let mut mac = engine(network, MacConfig::default());

    mac.queue_uplink(&UplinkRequest::unconfirmed(1, PAYLOAD)).unwrap();
    let events = drive(&mut mac, 0, 20_000);

    assert_eq!(
        events,
        vec![
            Event::JoinStarted,
            Event::JoinSucceeded,
            Event::TransmissionComplete {
                ack: false,
                rx_bytes: 0
            }
        ]
    );
}

#[test]
fn test_second_uplink_is_refused_while_busy() {
    let mut mac = engine(MockNetwork::new(DEFAULT_APP_KEY), MacConfig::default());
    let request = UplinkRequest::unconfirmed(1, PAYLOAD);

    mac.queue_uplink(&request).unwrap();
    assert_eq!(mac.queue_uplink(&request), Err(MacError::Busy));
}

#[test]
fn test_link_check_off_leaves_fopts_empty() {
    let mut mac = engine(MockNetwork::new(DEFAULT_APP_KEY), MacConfig::default());
    mac.queue_uplink(&UplinkRequest::unconfirmed(1, PAYLOAD)).unwrap();
    mac.set_link_check(false);
    assert!(!mac.link_check());

    drive(&mut mac, 0, 6_200);
    let uplink = mac.radio().last_tx().unwrap();
    assert_eq!(uplink.len(), 28);
    assert_eq!(uplink[5], 0x00);
    assert_eq!(uplink[8], 1);
}

#[test]
fn test_foreign_frames_in_join_window_are_ignored() {
    let mut mac = engine(MockNetwork::new(DEFAULT_APP_KEY), MacConfig::default());
    mac.radio_mut().push_rx(&[0x20; 17]);
    mac.queue_uplink(&UplinkRequest::unconfirmed(1, PAYLOAD)).unwrap();

    let events = drive(&mut mac, 0, 5_100);
    assert_eq!(events, vec![Event::JoinStarted, Event::JoinSucceeded]);
}

#[test]
fn test_radio_failure_surfaces_from_poll() {
    let mut mac = engine(MockNetwork::new(DEFAULT_APP_KEY), MacConfig::default());
    mac.radio_mut().fail_transmit = true;
    mac.queue_uplink(&UplinkRequest::unconfirmed(1, PAYLOAD)).unwrap();

    assert_eq!(mac.poll(ms(0)), Err(MacError::Radio(MockError)));
}

#[test]
fn test_release_puts_radio_to_sleep() {
    let mut mac = engine(MockNetwork::new(DEFAULT_APP_KEY), MacConfig::default());
    let sleeps = mac.radio().sleeps;
    mac.queue_uplink(&UplinkRequest::unconfirmed(1, PAYLOAD)).unwrap();
    mac.release();

    assert!(!mac.is_busy());
    assert_eq!(mac.radio().sleeps, sleeps + 1);
}

fn session_config() -> SessionConfig {
    SessionConfig {
        poll_interval: ms(100),
        ..SessionConfig::default()
    }
}

#[test]
fn test_session_over_radio_engine_completes() {
    let mut mac = engine(MockNetwork::new(DEFAULT_APP_KEY), MacConfig::default());
    let mut clock = ManualClock::new();
    let mut board = RecordingBoard::default();
    let flag = AtomicBool::new(false);

    let mut controller =
        SessionController::new(&mut mac, &mut clock, &flag, &mut board, session_config());
    controller.start(PAYLOAD);
    let report = controller.run();

    assert_eq!(report.state, State::Completed);
    assert_eq!(report.exit_code, ExitCode::Success);
    assert!(clock.now < Duration::from_secs(15));

    // the join switched link check off before the uplink was built
    assert!(!mac.link_check());
    let network = mac.radio().network.as_ref().unwrap();
    assert_eq!(network.uplinks.len(), 1);
    assert_eq!(network.uplinks[0][5], 0x00);
    assert!(!mac.radio().listening);
    assert_eq!(board.activity, vec![true, false, false]);
}

#[test]
fn test_session_over_silent_network_times_out() {
    let mut network = MockNetwork::new(DEFAULT_APP_KEY);
    network.answer_joins = false;
    let mut mac = engine(network, MacConfig::default());
    let mut clock = ManualClock::new();
    let mut board = RecordingBoard::default();
    let flag = AtomicBool::new(false);

    let mut controller =
        SessionController::new(&mut mac, &mut clock, &flag, &mut board, session_config());
    controller.start(PAYLOAD);
    let report = controller.run();

    assert_eq!(report.state, State::Failed);
    assert_eq!(report.failure, Some(FailReason::JoinTimeout));
    assert_eq!(report.exit_code.as_i32(), -1);
    assert_eq!(clock.now, ms(15_100));
}

#[test]
fn test_session_reports_engine_join_failure() {
    let mut network = MockNetwork::new(DEFAULT_APP_KEY);
    network.answer_joins = false;
    let config = MacConfig {
        max_join_attempts: 2,
        ..MacConfig::default()
    };
    let mut mac = engine(network, config);
    let mut clock = ManualClock::new();
    let mut board = RecordingBoard::default();
    let flag = AtomicBool::new(false);

    let mut controller =
        SessionController::new(&mut mac, &mut clock, &flag, &mut board, session_config());
    controller.start(PAYLOAD);
    let report = controller.run();

    assert_eq!(report.failure, Some(FailReason::JoinFailed));
    assert!(clock.now < Duration::from_secs(15));
}
