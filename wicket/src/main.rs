// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! wicket - Captive-portal WiFi provisioning firmware for the ESP32-C3
//!
//! Normal operation is plain station mode.  When the device cannot join a
//! network (or holds no credentials), the portal layer flips the radio to
//! AP+STA, hijacks DNS and serves a small provisioning page.  A phone
//! joins the AP, is captured, submits credentials, and the portal tears
//! itself down once the device is on the real network.
//!
//! Task layout:
//! - `wifi_task` owns the `esp-wifi` controller and serves driver
//!   commands
//! - `router_task` feeds driver events to the portal controller
//! - `http_task`, `dns_task` and `dhcp_task` are the portal
//!   collaborators, parked behind control signals while the portal is
//!   closed
//! - two `net_task` instances run the station and AP network stacks
//!
//! The lifecycle rules themselves live in the `wicket-core` crate, which
//! is hardware-free and tested on the host.

#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
#![feature(type_alias_impl_trait)]
#![feature(impl_trait_in_assoc_type)]

extern crate alloc;

use embassy_executor::Spawner;
use embassy_time::{Duration, Timer};
use esp_alloc as _;
use esp_backtrace as _;
use esp_hal::{clock::CpuClock, timer::timg::TimerGroup};
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use static_cell::make_static;

mod config;
mod dns;
mod error;
mod http;
mod wifi;

use wifi::{EspPortalServices, NetUpSignal, Portal};

// App descriptor required by the esp-idf bootloader.
esp_bootloader_esp_idf::esp_app_desc!();

// Heap size for the application.
pub const HEAP_SIZE: usize = 96 * 1024;

// How often the idle loop reports the portal mode.
const SUPERVISOR_INTERVAL: Duration = Duration::from_secs(60);

// Wicket firmware's main function:
// - Set up the HAL, heap and embassy
// - Bring up the WiFi hardware and both network stacks
// - Spawn the portal collaborator tasks (parked until the portal opens)
// - Initialize the portal layer, which starts the station connecting
// - Idle
#[esp_hal_embassy::main]
async fn main(spawner: Spawner) -> ! {
    // Set up the logger
    esp_println::logger::init_logger_from_env();

    info!("*** wicket ***");

    // Set up the HAL
    let hal_config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(hal_config);

    // Set up the heap allocator
    esp_alloc::heap_allocator!(size: HEAP_SIZE);

    // Initialize embassy
    let timg1 = TimerGroup::new(peripherals.TIMG1);
    esp_hal_embassy::init(timg1.timer0);

    // WiFi hardware, network stacks, driver task
    let ap_stack = wifi::init(&spawner, peripherals.TIMG0, peripherals.RNG, peripherals.WIFI);

    // The portal controller, shared by every task that follows
    let portal: &'static Portal = make_static!(Portal::new(
        EspPortalServices::new(),
        NetUpSignal::new(),
        config::portal_config(),
    ));

    spawner.must_spawn(wifi::router_task(portal));
    spawner.must_spawn(http::http_task(ap_stack, portal));
    spawner.must_spawn(dns::dns_task(ap_stack));
    spawner.must_spawn(dns::dhcp_task(ap_stack));

    // Starts the driver in station mode; the resulting events drive
    // everything else, including opening the portal if the configured
    // network (or the placeholder) is unreachable.
    if let Err(e) = portal.init().await {
        error!("Failed to initialize portal: {e}");
    }

    loop {
        Timer::after(SUPERVISOR_INTERVAL).await;
        debug!("wicket: mode {}", portal.mode());
    }
}
