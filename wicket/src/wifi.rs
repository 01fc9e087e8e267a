// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! wicket - WiFi driver layer
//!
//! `esp-wifi`'s controller is a single-owner object, so it lives inside
//! [`wifi_task`] and nothing else touches it.  The portal layer reaches it
//! through a one-deep command channel with a reply signal; raw driver
//! events come back out on an event channel which [`router_task`] feeds to
//! the portal controller.
//!
//! Mode changes go through the stop/reconfigure/start dance - the driver
//! cannot switch between station and AP+station on the fly.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::time::Duration as CoreDuration;

use embassy_executor::Spawner;
use embassy_futures::select::{Either, select};
use embassy_net::{Runner, Stack, StackResources};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Timer, with_timeout};
use esp_hal::peripherals::{RNG, TIMG0, WIFI};
use esp_hal::rng::Rng;
use esp_hal::timer::timg::TimerGroup;
use esp_wifi::config::PowerSaveMode;
use esp_wifi::wifi::{
    AccessPointConfiguration, AuthMethod, ClientConfiguration, Configuration, WifiController,
    WifiEvent,
};
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use static_cell::make_static;

use wicket_core::{
    AccessPointSettings, ApAuth, ConnectivitySignal, DriverEvent, Error, PortalController,
    PortalServices, StationCredentials,
};

use crate::config;
use crate::{dns, http};

/// Channel the provisioning access point sits on.
const AP_CHANNEL: u8 = 1;

/// Polling interval for losing a station address.  Gaining one is
/// event-driven.
const IP_POLL_MS: u64 = 500;

/// The concrete portal controller type the rest of the firmware shares.
pub type Portal = PortalController<EspPortalServices, NetUpSignal>;

// Requests the portal layer makes of the driver task.
enum Command {
    InitStation(StationCredentials),
    EnterPortalMode(AccessPointSettings),
    LeavePortalMode,
    ConnectStation,
    ApplyCredentials(StationCredentials),
    Scan { max: usize },
    Shutdown,
}

enum Reply {
    Done(Result<(), Error>),
    Ssids(Result<Vec<String>, Error>),
}

static COMMAND: Channel<CriticalSectionRawMutex, Command, 1> = Channel::new();
static REPLY: Signal<CriticalSectionRawMutex, Reply> = Signal::new();

// Raw driver events on their way to the router.  Dropped (with a warning)
// rather than awaited on overflow, so the driver task can never deadlock
// against a portal operation that is itself waiting on a reply.
static EVENTS: Channel<CriticalSectionRawMutex, DriverEvent, 8> = Channel::new();

static NET_UP: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// "Station got an address" signal, satisfying the portal's connectivity
/// contract on top of an embassy [`Signal`].
pub struct NetUpSignal(&'static Signal<CriticalSectionRawMutex, ()>);

impl NetUpSignal {
    pub fn new() -> Self {
        Self(&NET_UP)
    }
}

impl ConnectivitySignal for NetUpSignal {
    fn reset(&self) {
        self.0.reset();
    }

    fn raise(&self) {
        self.0.signal(());
    }

    async fn wait_raised(&self, timeout: CoreDuration) -> bool {
        let timeout = Duration::from_millis(timeout.as_millis() as u64);
        with_timeout(timeout, self.0.wait()).await.is_ok()
    }
}

/// Driver/collaborator surface for the portal controller.  Driver calls
/// are marshalled to [`wifi_task`]; collaborator calls poke the control
/// signals in the `http` and `dns` modules.
pub struct EspPortalServices;

impl EspPortalServices {
    pub fn new() -> Self {
        Self
    }

    async fn command(&self, command: Command) -> Reply {
        REPLY.reset();
        COMMAND.send(command).await;
        REPLY.wait().await
    }

    async fn execute(&self, command: Command) -> Result<(), Error> {
        match self.command(command).await {
            Reply::Done(result) => result,
            Reply::Ssids(_) => Err(Error::Driver(String::from("mismatched driver reply"))),
        }
    }
}

impl PortalServices for EspPortalServices {
    async fn station_init(&self, creds: &StationCredentials) -> Result<(), Error> {
        self.execute(Command::InitStation(creds.clone())).await
    }

    async fn enter_portal_mode(&self, ap: &AccessPointSettings) -> Result<(), Error> {
        self.execute(Command::EnterPortalMode(ap.clone())).await
    }

    async fn leave_portal_mode(&self) -> Result<(), Error> {
        self.execute(Command::LeavePortalMode).await
    }

    async fn connect_station(&self) -> Result<(), Error> {
        self.execute(Command::ConnectStation).await
    }

    async fn apply_credentials(&self, creds: &StationCredentials) -> Result<(), Error> {
        self.execute(Command::ApplyCredentials(creds.clone())).await
    }

    async fn scan_ssids(&self, max: usize) -> Result<Vec<String>, Error> {
        match self.command(Command::Scan { max }).await {
            Reply::Ssids(result) => result,
            Reply::Done(_) => Err(Error::Driver(String::from("mismatched driver reply"))),
        }
    }

    async fn shutdown_driver(&self) -> Result<(), Error> {
        self.execute(Command::Shutdown).await
    }

    async fn start_http(&self) -> Result<(), Error> {
        http::enable().await
    }

    async fn stop_http(&self) {
        http::disable().await;
    }

    async fn start_dns(&self) -> Result<(), Error> {
        dns::enable().await
    }

    async fn stop_dns(&self) {
        dns::disable().await;
    }

    async fn grace_delay(&self, delay: CoreDuration) {
        Timer::after(Duration::from_millis(delay.as_millis() as u64)).await;
    }
}

/// Brings up the WiFi hardware and both network stacks, and spawns the
/// driver task plus the two stack runners.  Called once from `main`.
/// Returns the AP stack, which the portal collaborators serve on; the
/// station stack stays with the driver task.
pub fn init(
    spawner: &Spawner,
    timg0: TIMG0<'static>,
    rng: RNG<'static>,
    wifi: WIFI<'static>,
) -> Stack<'static> {
    let timg0 = TimerGroup::new(timg0);
    let mut rng = Rng::new(rng);

    // &* turns make_static!'s mutable reference into the shared one
    // esp_wifi expects.
    let esp_wifi_ctrl = &*make_static!(
        esp_wifi::init(timg0.timer0, rng).expect("Failed to initialize WiFi hardware")
    );
    let (controller, interfaces) =
        esp_wifi::wifi::new(esp_wifi_ctrl, wifi).expect("Failed to create WiFi interfaces");

    let sta_seed = (rng.random() as u64) << 32 | rng.random() as u64;
    let ap_seed = (rng.random() as u64) << 32 | rng.random() as u64;

    // Station side gets its address from the network it joins.
    let (sta_stack, sta_runner) = embassy_net::new(
        interfaces.sta,
        embassy_net::Config::dhcpv4(Default::default()),
        make_static!(StackResources::<4>::new()),
        sta_seed,
    );

    // AP side serves the portal, so it owns its addresses outright.
    let addressing = config::ap_addressing();
    let ap_config = embassy_net::Config::ipv4_static(embassy_net::StaticConfigV4 {
        address: embassy_net::Ipv4Cidr::new(addressing.ip(), addressing.prefix_len()),
        gateway: Some(addressing.gateway()),
        dns_servers: heapless::Vec::new(),
    });
    let (ap_stack, ap_runner) = embassy_net::new(
        interfaces.ap,
        ap_config,
        make_static!(StackResources::<4>::new()),
        ap_seed,
    );

    spawner.must_spawn(net_task(sta_runner));
    spawner.must_spawn(net_task(ap_runner));
    spawner.must_spawn(wifi_task(controller, sta_stack));

    ap_stack
}

#[embassy_executor::task(pool_size = 2)]
async fn net_task(mut runner: Runner<'static, esp_wifi::wifi::WifiDevice<'static>>) -> ! {
    runner.run().await
}

// Station and AP configuration the driver currently holds.  Mode changes
// re-apply both halves, so they are kept here rather than re-read from
// the driver.
struct DriverState {
    sta_config: ClientConfiguration,
    ap_config: AccessPointConfiguration,
    retries_left: u32,
}

/// Owns the `esp-wifi` controller.  Serves portal commands and forwards
/// driver events, retrying failed station connections
/// [`config::STA_RETRY_COUNT`] times before reporting a disconnect.
#[embassy_executor::task]
async fn wifi_task(mut controller: WifiController<'static>, sta_stack: Stack<'static>) -> ! {
    let mut state = DriverState {
        sta_config: ClientConfiguration::default(),
        ap_config: AccessPointConfiguration::default(),
        retries_left: config::STA_RETRY_COUNT,
    };
    let mut sta_has_ip = false;

    loop {
        let outcome = select(
            COMMAND.receive(),
            driver_events(&mut controller, sta_stack, &mut sta_has_ip),
        )
        .await;

        match outcome {
            Either::First(command) => {
                let reply = handle_command(&mut controller, &mut state, command).await;
                REPLY.signal(reply);
            }
            Either::Second(events) => {
                for event in events {
                    if let Some(event) = filter_event(&mut controller, &mut state, event) {
                        if EVENTS.try_send(event).is_err() {
                            warn!("wifi: event queue full, dropping {event:?}");
                        }
                    }
                }
            }
        }
    }
}

/// Feeds driver events to the portal controller, which routes them by
/// mode.  A dedicated task so event handling can never deadlock against a
/// portal operation mid-command.
#[embassy_executor::task]
pub async fn router_task(portal: &'static Portal) -> ! {
    loop {
        let event = EVENTS.receive().await;
        if let Err(e) = portal.handle_event(event).await {
            warn!("wifi: failed to handle {event:?}: {e}");
        }
    }
}

// The next batch of events worth routing: latched radio events or a
// station address transition.  The radio wait consumes every matched
// event when it completes, so all of them are translated in one pass.
async fn driver_events(
    controller: &mut WifiController<'static>,
    sta_stack: Stack<'static>,
    sta_has_ip: &mut bool,
) -> heapless::Vec<DriverEvent, 3> {
    let mut batch = heapless::Vec::new();
    loop {
        let radio = controller.wait_for_events(
            WifiEvent::StaStart | WifiEvent::StaDisconnected | WifiEvent::ApStart,
            false,
        );
        match select(radio, ip_transition(sta_stack, *sta_has_ip)).await {
            Either::First(events) => {
                if events.contains(WifiEvent::StaStart) {
                    let _ = batch.push(DriverEvent::StaStarted);
                }
                if events.contains(WifiEvent::StaDisconnected) {
                    let _ = batch.push(DriverEvent::StaDisconnected);
                }
                if events.contains(WifiEvent::ApStart) {
                    let _ = batch.push(DriverEvent::ApStarted);
                }
                if !batch.is_empty() {
                    return batch;
                }
            }
            Either::Second(up) => {
                *sta_has_ip = up;
                if up {
                    if let Some(net_config) = sta_stack.config_v4() {
                        info!("wifi: station address {}", net_config.address);
                    }
                    let _ = batch.push(DriverEvent::StaGotIp);
                    return batch;
                }
                debug!("wifi: station address lost");
                // Nothing to route; the disconnect event covers it.
            }
        }
    }
}

async fn ip_transition(stack: Stack<'static>, has_ip: bool) -> bool {
    if has_ip {
        loop {
            if stack.config_v4().is_none() {
                return false;
            }
            Timer::after(Duration::from_millis(IP_POLL_MS)).await;
        }
    } else {
        stack.wait_config_up().await;
        true
    }
}

// Retry layer between raw disconnect events and the portal.  Only events
// that survive it reach the router.
fn filter_event(
    controller: &mut WifiController<'static>,
    state: &mut DriverState,
    event: DriverEvent,
) -> Option<DriverEvent> {
    match event {
        DriverEvent::StaDisconnected if state.retries_left > 0 => {
            state.retries_left -= 1;
            debug!(
                "wifi: station disconnected, retrying ({} attempts left)",
                state.retries_left
            );
            if let Err(e) = controller.connect() {
                warn!("wifi: reconnect failed: {e:?}");
            }
            None
        }
        DriverEvent::StaDisconnected => {
            info!("wifi: station connection attempts exhausted");
            state.retries_left = config::STA_RETRY_COUNT;
            Some(event)
        }
        DriverEvent::StaGotIp => {
            state.retries_left = config::STA_RETRY_COUNT;
            Some(event)
        }
        _ => Some(event),
    }
}

async fn handle_command(
    controller: &mut WifiController<'static>,
    state: &mut DriverState,
    command: Command,
) -> Reply {
    match command {
        Command::InitStation(creds) => {
            Reply::Done(init_station(controller, state, &creds).await)
        }
        Command::EnterPortalMode(ap) => {
            state.ap_config = ap_configuration(&ap);
            info!("wifi: entering AP+STA mode, AP SSID '{}'", state.ap_config.ssid);
            Reply::Done(
                reconfigure(
                    controller,
                    Configuration::Mixed(state.sta_config.clone(), state.ap_config.clone()),
                )
                .await,
            )
        }
        Command::LeavePortalMode => {
            info!(
                "wifi: leaving AP+STA mode, station SSID '{}'",
                state.sta_config.ssid
            );
            Reply::Done(
                reconfigure(controller, Configuration::Client(state.sta_config.clone())).await,
            )
        }
        Command::ConnectStation => Reply::Done(connect(controller)),
        Command::ApplyCredentials(creds) => {
            Reply::Done(apply_credentials(controller, state, creds))
        }
        Command::Scan { max } => Reply::Ssids(scan(controller, max).await),
        Command::Shutdown => Reply::Done(shutdown(controller).await),
    }
}

async fn init_station(
    controller: &mut WifiController<'static>,
    state: &mut DriverState,
    creds: &StationCredentials,
) -> Result<(), Error> {
    if let Err(e) = controller.set_power_saving(PowerSaveMode::None) {
        warn!("wifi: failed to disable power saving: {e:?}");
    }

    state.sta_config = ClientConfiguration {
        ssid: creds.ssid.clone(),
        password: creds.password.clone(),
        ..Default::default()
    };
    controller
        .set_configuration(&Configuration::Client(state.sta_config.clone()))
        .map_err(|e| Error::Driver(format!("failed to set station configuration: {e:?}")))?;
    controller
        .start_async()
        .await
        .map_err(|e| Error::Driver(format!("failed to start WiFi: {e:?}")))?;
    Ok(())
}

// Stop, swap configuration, start again.  The driver applies the mode
// implied by the configuration variant.
async fn reconfigure(
    controller: &mut WifiController<'static>,
    new_config: Configuration,
) -> Result<(), Error> {
    match controller.is_started() {
        Ok(true) => {
            controller
                .stop_async()
                .await
                .map_err(|e| Error::Driver(format!("failed to stop WiFi: {e:?}")))?;
        }
        Ok(false) => trace!("wifi: already stopped ahead of reconfigure"),
        Err(e) => {
            return Err(Error::Driver(format!("failed to query WiFi state: {e:?}")));
        }
    }

    controller
        .set_configuration(&new_config)
        .map_err(|e| Error::Driver(format!("failed to apply configuration: {e:?}")))?;
    controller
        .start_async()
        .await
        .map_err(|e| Error::Driver(format!("failed to restart WiFi: {e:?}")))?;
    Ok(())
}

fn connect(controller: &mut WifiController<'static>) -> Result<(), Error> {
    controller
        .connect()
        .map_err(|e| Error::Driver(format!("failed to initiate connection: {e:?}")))
}

fn apply_credentials(
    controller: &mut WifiController<'static>,
    state: &mut DriverState,
    creds: StationCredentials,
) -> Result<(), Error> {
    // May not be associated; a failure here is uninteresting.
    let _ = controller.disconnect();

    state.sta_config = ClientConfiguration {
        ssid: creds.ssid,
        password: creds.password,
        ..Default::default()
    };

    // The portal is open while credentials arrive, so keep the AP half of
    // the configuration alive.
    controller
        .set_configuration(&Configuration::Mixed(
            state.sta_config.clone(),
            state.ap_config.clone(),
        ))
        .map_err(|e| Error::Driver(format!("failed to apply credentials: {e:?}")))?;

    state.retries_left = config::STA_RETRY_COUNT;
    connect(controller)
}

async fn scan(
    controller: &mut WifiController<'static>,
    max: usize,
) -> Result<Vec<String>, Error> {
    controller
        .scan_n_async(max)
        .await
        .map(|aps| aps.into_iter().map(|ap| ap.ssid).collect())
        .map_err(|e| Error::Driver(format!("scan failed: {e:?}")))
}

async fn shutdown(controller: &mut WifiController<'static>) -> Result<(), Error> {
    if matches!(controller.is_started(), Ok(true)) {
        controller
            .stop_async()
            .await
            .map_err(|e| Error::Driver(format!("failed to stop WiFi: {e:?}")))?;
    }
    Ok(())
}

fn ap_configuration(ap: &AccessPointSettings) -> AccessPointConfiguration {
    let auth_method = match ap.effective_auth() {
        ApAuth::Open => AuthMethod::None,
        ApAuth::Wpa2Personal => AuthMethod::WPA2Personal,
        ApAuth::Wpa3Personal => AuthMethod::WPA3Personal,
    };
    AccessPointConfiguration {
        ssid: ap.ssid.clone(),
        password: ap.password.clone(),
        auth_method,
        channel: AP_CHANNEL,
        max_connections: ap.max_clients,
        ..Default::default()
    }
}
