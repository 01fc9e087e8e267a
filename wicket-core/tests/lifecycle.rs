// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Host-side lifecycle tests for the portal controller, driven with fake
//! services and a fake connectivity signal.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use embassy_futures::block_on;
use embassy_futures::join::join;
use embassy_futures::yield_now;
use wicket_core::{
    AccessPointSettings, ApAddressing, ApAuth, ConnectivitySignal, DriverEvent, Error,
    PortalConfig, PortalController, PortalMode, PortalServices, StationCredentials,
};

const MAX_SCAN: usize = 3;

#[derive(Default)]
struct State {
    calls: Vec<&'static str>,
    ap_up: bool,
    http_up: bool,
    dns_up: bool,
    driver_started: bool,
    station_ssid: Option<String>,
    fail_http: bool,
    fail_dns: bool,
    // Simulates a driver that joins instantly after a credential write
    connect_raises: bool,
    scan_results: Vec<String>,
    grace_delays: u32,
    // When set, stop_http only acknowledges once handler_done is true,
    // mirroring the firmware's disable handshake with an in-flight
    // request handler.
    http_disable_waits: bool,
    handler_done: bool,
}

#[derive(Clone, Default)]
struct FakeSignal {
    raised: Rc<Cell<bool>>,
    raises: Rc<Cell<u32>>,
}

impl ConnectivitySignal for FakeSignal {
    fn reset(&self) {
        self.raised.set(false);
    }

    fn raise(&self) {
        self.raised.set(true);
        self.raises.set(self.raises.get() + 1);
    }

    async fn wait_raised(&self, _timeout: Duration) -> bool {
        // The fake either has the signal already or never will - an unset
        // signal is the timeout branch.
        self.raised.get()
    }
}

#[derive(Clone)]
struct FakeServices {
    state: Rc<RefCell<State>>,
    signal: FakeSignal,
}

impl PortalServices for FakeServices {
    async fn station_init(&self, creds: &StationCredentials) -> Result<(), Error> {
        let mut st = self.state.borrow_mut();
        st.calls.push("station_init");
        st.driver_started = true;
        st.station_ssid = Some(creds.ssid.clone());
        Ok(())
    }

    async fn enter_portal_mode(&self, _ap: &AccessPointSettings) -> Result<(), Error> {
        let mut st = self.state.borrow_mut();
        st.calls.push("enter_portal_mode");
        st.ap_up = true;
        Ok(())
    }

    async fn leave_portal_mode(&self) -> Result<(), Error> {
        let mut st = self.state.borrow_mut();
        st.calls.push("leave_portal_mode");
        st.ap_up = false;
        Ok(())
    }

    async fn connect_station(&self) -> Result<(), Error> {
        self.state.borrow_mut().calls.push("connect_station");
        Ok(())
    }

    async fn apply_credentials(&self, creds: &StationCredentials) -> Result<(), Error> {
        let raise = {
            let mut st = self.state.borrow_mut();
            st.calls.push("apply_credentials");
            st.station_ssid = Some(creds.ssid.clone());
            st.connect_raises
        };
        if raise {
            self.signal.raise();
        }
        Ok(())
    }

    async fn scan_ssids(&self, _max: usize) -> Result<Vec<String>, Error> {
        let mut st = self.state.borrow_mut();
        st.calls.push("scan_ssids");
        Ok(st.scan_results.clone())
    }

    async fn shutdown_driver(&self) -> Result<(), Error> {
        let mut st = self.state.borrow_mut();
        st.calls.push("shutdown_driver");
        st.driver_started = false;
        Ok(())
    }

    async fn start_http(&self) -> Result<(), Error> {
        let mut st = self.state.borrow_mut();
        st.calls.push("start_http");
        if st.fail_http {
            return Err(Error::HttpStart("refused".into()));
        }
        st.http_up = true;
        Ok(())
    }

    async fn stop_http(&self) {
        self.state.borrow_mut().calls.push("stop_http");
        if self.state.borrow().http_disable_waits {
            let mut budget = 10_000u32;
            while !self.state.borrow().handler_done {
                budget -= 1;
                assert!(
                    budget > 0,
                    "stop() wedged waiting for the in-flight request handler"
                );
                yield_now().await;
            }
        }
        self.state.borrow_mut().http_up = false;
    }

    async fn start_dns(&self) -> Result<(), Error> {
        let mut st = self.state.borrow_mut();
        st.calls.push("start_dns");
        if st.fail_dns {
            return Err(Error::DnsStart("bind failed".into()));
        }
        st.dns_up = true;
        Ok(())
    }

    async fn stop_dns(&self) {
        let mut st = self.state.borrow_mut();
        st.calls.push("stop_dns");
        st.dns_up = false;
    }

    async fn grace_delay(&self, _delay: Duration) {
        self.state.borrow_mut().calls.push("grace_delay");
        self.state.borrow_mut().grace_delays += 1;
    }
}

type Portal = PortalController<FakeServices, FakeSignal>;

fn config(station_ssid: &str, auto_start: bool) -> PortalConfig {
    PortalConfig {
        access_point: AccessPointSettings {
            ssid: "wicket".into(),
            password: String::new(),
            auth: ApAuth::Wpa2Personal,
            addressing: ApAddressing::Fixed {
                ip: [192, 168, 4, 1].into(),
                netmask: [255, 255, 255, 0].into(),
                gateway: [192, 168, 4, 1].into(),
            },
            max_clients: 1,
        },
        station: StationCredentials {
            ssid: station_ssid.into(),
            password: String::new(),
        },
        connect_timeout: Duration::from_secs(10),
        teardown_grace: Duration::from_millis(100),
        max_scan_results: MAX_SCAN,
        auto_start,
    }
}

fn portal_with(state: Rc<RefCell<State>>, cfg: PortalConfig) -> (Portal, FakeSignal) {
    let signal = FakeSignal::default();
    let services = FakeServices {
        state,
        signal: signal.clone(),
    };
    (PortalController::new(services, signal.clone(), cfg), signal)
}

fn portal(auto_start: bool) -> (Portal, Rc<RefCell<State>>, FakeSignal) {
    let state = Rc::new(RefCell::new(State::default()));
    let (portal, signal) = portal_with(state.clone(), config("HomeNet", auto_start));
    (portal, state, signal)
}

// AP interface existence, DNS-running and HTTP-running must always equal
// each other and (mode == PortalActive); they change as a unit.
fn assert_unit_consistent(portal: &Portal, state: &Rc<RefCell<State>>) {
    let st = state.borrow();
    let active = portal.mode() == PortalMode::PortalActive;
    assert_eq!(st.ap_up, active, "AP interface diverged from mode");
    assert_eq!(st.dns_up, active, "DNS diverged from mode");
    assert_eq!(st.http_up, active, "HTTP diverged from mode");
}

#[test]
fn full_lifecycle_scenario() {
    let (portal, state, _signal) = portal(false);
    block_on(async {
        portal.init().await.unwrap();
        assert_unit_consistent(&portal, &state);

        portal.start().await.unwrap();
        assert_eq!(portal.mode(), PortalMode::PortalActive);
        assert_unit_consistent(&portal, &state);

        assert_eq!(portal.start().await.unwrap_err(), Error::AlreadyRunning);
        assert_unit_consistent(&portal, &state);

        portal.stop().await.unwrap();
        assert_eq!(portal.mode(), PortalMode::StationOnly);
        assert_unit_consistent(&portal, &state);

        assert_eq!(portal.stop().await.unwrap_err(), Error::NotRunning);

        portal.deinit().await.unwrap();
        assert!(!state.borrow().driver_started);

        // Idempotent - a second deinit is a no-op, not an error
        portal.deinit().await.unwrap();
    });
}

#[test]
fn operations_require_init() {
    let (portal, _state, _signal) = portal(false);
    block_on(async {
        assert_eq!(portal.start().await.unwrap_err(), Error::NotInitialized);
        let creds =
            StationCredentials::new("net".into(), "pw".into()).unwrap();
        assert_eq!(
            portal.submit_credentials(&creds).await.unwrap_err(),
            Error::NotInitialized
        );
        assert_eq!(portal.scan().await.unwrap_err(), Error::NotInitialized);
        // deinit is always safe
        portal.deinit().await.unwrap();
    });
}

#[test]
fn empty_station_ssid_gets_placeholder() {
    let state = Rc::new(RefCell::new(State::default()));
    let (portal, _signal) = portal_with(state.clone(), config("", true));
    block_on(async {
        portal.init().await.unwrap();
    });
    assert_eq!(state.borrow().station_ssid.as_deref(), Some("ap"));
}

#[test]
fn failed_dns_start_unwinds_http_and_ap() {
    let (portal, state, _signal) = portal(false);
    state.borrow_mut().fail_dns = true;
    block_on(async {
        portal.init().await.unwrap();
        let err = portal.start().await.unwrap_err();
        assert!(matches!(err, Error::DnsStart(_)));
    });
    assert_eq!(portal.mode(), PortalMode::StationOnly);
    assert_unit_consistent(&portal, &state);
    // HTTP came up and was taken down again before the error surfaced
    let calls = state.borrow().calls.clone();
    let http_start = calls.iter().position(|c| *c == "start_http").unwrap();
    let http_stop = calls.iter().position(|c| *c == "stop_http").unwrap();
    let ap_down = calls.iter().position(|c| *c == "leave_portal_mode").unwrap();
    assert!(http_start < http_stop && http_stop < ap_down);
}

#[test]
fn failed_http_start_unwinds_ap() {
    let (portal, state, _signal) = portal(false);
    state.borrow_mut().fail_http = true;
    block_on(async {
        portal.init().await.unwrap();
        let err = portal.start().await.unwrap_err();
        assert!(matches!(err, Error::HttpStart(_)));
    });
    assert_unit_consistent(&portal, &state);
    let calls = state.borrow().calls.clone();
    assert!(!calls.contains(&"start_dns"));
    assert!(calls.contains(&"leave_portal_mode"));
}

#[test]
fn stop_order_is_dns_http_then_ap() {
    let (portal, state, _signal) = portal(false);
    block_on(async {
        portal.init().await.unwrap();
        portal.start().await.unwrap();
        portal.stop().await.unwrap();
    });
    let calls = state.borrow().calls.clone();
    let dns = calls.iter().rposition(|c| *c == "stop_dns").unwrap();
    let http = calls.iter().rposition(|c| *c == "stop_http").unwrap();
    let ap = calls.iter().rposition(|c| *c == "leave_portal_mode").unwrap();
    assert!(dns < http && http < ap, "teardown out of order: {calls:?}");
}

#[test]
fn stop_drains_an_inflight_handler_without_wedging() {
    let (portal, state, _signal) = portal(false);
    state.borrow_mut().scan_results = vec!["alpha".into()];
    block_on(async {
        portal.init().await.unwrap();
        portal.start().await.unwrap();

        // The web server cannot acknowledge a disable until the request
        // it is serving finishes, and that request needs driver access of
        // its own.
        state.borrow_mut().http_disable_waits = true;
        let (stopped, ssids) = join(portal.stop(), async {
            let ssids = portal.scan().await;
            state.borrow_mut().handler_done = true;
            ssids
        })
        .await;
        stopped.unwrap();
        assert_eq!(ssids.unwrap(), vec!["alpha"]);
    });
    assert_eq!(portal.mode(), PortalMode::StationOnly);
    assert_unit_consistent(&portal, &state);
}

#[test]
fn credential_exchange_reports_success_on_signal() {
    let (portal, state, _signal) = portal(false);
    state.borrow_mut().connect_raises = true;
    block_on(async {
        portal.init().await.unwrap();
        let creds = StationCredentials::new("HomeNet".into(), "pw".into()).unwrap();
        assert_eq!(portal.submit_credentials(&creds).await.unwrap(), true);
    });
}

#[test]
fn credential_exchange_reports_failure_on_timeout() {
    let (portal, _state, _signal) = portal(false);
    block_on(async {
        portal.init().await.unwrap();
        let creds = StationCredentials::new("HomeNet".into(), "wrong".into()).unwrap();
        assert_eq!(portal.submit_credentials(&creds).await.unwrap(), false);
    });
}

#[test]
fn stale_signal_cannot_satisfy_a_new_exchange() {
    let (portal, _state, signal) = portal(false);
    block_on(async {
        portal.init().await.unwrap();
        // Residue from an earlier episode
        signal.raise();
        let creds = StationCredentials::new("HomeNet".into(), "pw".into()).unwrap();
        // The submission resets the signal before connecting, so the
        // stale raise must not count as success.
        assert_eq!(portal.submit_credentials(&creds).await.unwrap(), false);
    });
}

#[test]
fn got_ip_in_portal_mode_auto_tears_down() {
    let (portal, state, signal) = portal(false);
    block_on(async {
        portal.init().await.unwrap();
        portal.start().await.unwrap();
        portal.handle_event(DriverEvent::StaGotIp).await.unwrap();
    });
    // Signal raised for any blocked waiter, grace observed, portal down
    assert_eq!(signal.raises.get(), 1);
    assert_eq!(state.borrow().grace_delays, 1);
    assert_eq!(portal.mode(), PortalMode::StationOnly);
    assert_unit_consistent(&portal, &state);
    // grace_delay strictly precedes the teardown calls
    let calls = state.borrow().calls.clone();
    let grace = calls.iter().position(|c| *c == "grace_delay").unwrap();
    let dns = calls.iter().rposition(|c| *c == "stop_dns").unwrap();
    assert!(grace < dns);
}

#[test]
fn got_ip_in_station_mode_is_ignored() {
    let (portal, state, signal) = portal(true);
    block_on(async {
        portal.init().await.unwrap();
        portal.handle_event(DriverEvent::StaGotIp).await.unwrap();
    });
    assert_eq!(signal.raises.get(), 0);
    assert_eq!(portal.mode(), PortalMode::StationOnly);
    assert!(!state.borrow().calls.contains(&"stop_dns"));
}

#[test]
fn sta_started_initiates_connection() {
    let (portal, state, _signal) = portal(false);
    block_on(async {
        portal.init().await.unwrap();
        portal.handle_event(DriverEvent::StaStarted).await.unwrap();
    });
    assert!(state.borrow().calls.contains(&"connect_station"));
}

#[test]
fn disconnect_auto_starts_portal_when_enabled() {
    let (portal, state, _signal) = portal(true);
    block_on(async {
        portal.init().await.unwrap();
        portal
            .handle_event(DriverEvent::StaDisconnected)
            .await
            .unwrap();
    });
    assert_eq!(portal.mode(), PortalMode::PortalActive);
    assert_unit_consistent(&portal, &state);
}

#[test]
fn disconnect_leaves_portal_down_when_disabled() {
    let (portal, state, _signal) = portal(true);
    block_on(async {
        portal.init().await.unwrap();
        portal.set_auto_start(false);
        portal
            .handle_event(DriverEvent::StaDisconnected)
            .await
            .unwrap();
    });
    assert_eq!(portal.mode(), PortalMode::StationOnly);
    assert_unit_consistent(&portal, &state);
}

#[test]
fn disconnect_while_portal_active_does_not_restart() {
    let (portal, state, _signal) = portal(true);
    block_on(async {
        portal.init().await.unwrap();
        portal.start().await.unwrap();
        let enters_before = count(&state, "enter_portal_mode");
        portal
            .handle_event(DriverEvent::StaDisconnected)
            .await
            .unwrap();
        assert_eq!(count(&state, "enter_portal_mode"), enters_before);
    });
    assert_eq!(portal.mode(), PortalMode::PortalActive);
}

#[test]
fn deinit_while_running_stops_portal_first() {
    let (portal, state, _signal) = portal(false);
    block_on(async {
        portal.init().await.unwrap();
        portal.start().await.unwrap();
        portal.deinit().await.unwrap();
    });
    assert_eq!(portal.mode(), PortalMode::StationOnly);
    assert_unit_consistent(&portal, &state);
    assert!(!state.borrow().driver_started);
    // stop effects preceded the driver shutdown
    let calls = state.borrow().calls.clone();
    let ap = calls.iter().rposition(|c| *c == "leave_portal_mode").unwrap();
    let shutdown = calls.iter().position(|c| *c == "shutdown_driver").unwrap();
    assert!(ap < shutdown);
}

#[test]
fn scan_filters_hidden_ssids_and_caps_results() {
    let (portal, state, _signal) = portal(false);
    state.borrow_mut().scan_results = vec![
        "alpha".into(),
        String::new(),
        "beta".into(),
        "gamma".into(),
        "delta".into(),
    ];
    let ssids = block_on(async {
        portal.init().await.unwrap();
        portal.scan().await.unwrap()
    });
    assert_eq!(ssids, vec!["alpha", "beta", "gamma"]);
}

#[test]
fn scan_with_no_networks_is_empty_not_an_error() {
    let (portal, _state, _signal) = portal(false);
    let ssids = block_on(async {
        portal.init().await.unwrap();
        portal.scan().await.unwrap()
    });
    assert!(ssids.is_empty());
}

fn count(state: &Rc<RefCell<State>>, call: &str) -> usize {
    state.borrow().calls.iter().filter(|c| **c == call).count()
}
