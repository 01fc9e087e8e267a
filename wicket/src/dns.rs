// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! wicket - Captive DNS responder and DHCP server
//!
//! Both collaborators run on the access point interface and only while
//! the portal is open.  The DNS responder answers every query with the
//! portal's own address; DHCP hands that address out as resolver and
//! gateway, which is what funnels clients into the hijack.
//!
//! As with the web server, the tasks are spawned once and gated by
//! control/status signal pairs.

use core::net::{Ipv4Addr, SocketAddr};

use embassy_futures::select::{Either, select};
use embassy_net::Stack;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Timer};
use leasehund::DhcpServer;
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use wicket_core::Error;

use crate::config;
use crate::http::{Control, Status};

const DNS_PORT: u16 = 53;

static DNS_CONTROL: Signal<CriticalSectionRawMutex, Control> = Signal::new();
static DNS_STATUS: Signal<CriticalSectionRawMutex, Status> = Signal::new();
static DHCP_CONTROL: Signal<CriticalSectionRawMutex, Control> = Signal::new();
static DHCP_STATUS: Signal<CriticalSectionRawMutex, Status> = Signal::new();

/// Brings up the DNS hijack and the DHCP server, waiting for both
/// acknowledgements.
pub(crate) async fn enable() -> Result<(), Error> {
    DNS_CONTROL.signal(Control::Enable);
    DHCP_CONTROL.signal(Control::Enable);

    match (DNS_STATUS.wait().await, DHCP_STATUS.wait().await) {
        (Status::Enabled, Status::Enabled) => Ok(()),
        _ => Err(Error::DnsStart(alloc::string::String::from(
            "DNS/DHCP tasks refused to come up",
        ))),
    }
}

/// Takes both down, waiting until each has acknowledged.
pub(crate) async fn disable() {
    DNS_CONTROL.signal(Control::Disable);
    DHCP_CONTROL.signal(Control::Disable);

    loop {
        if DNS_STATUS.wait().await == Status::Disabled {
            break;
        }
    }
    loop {
        if DHCP_STATUS.wait().await == Status::Disabled {
            break;
        }
    }
}

/// Wildcard DNS responder.  Every A query gets the portal's address.
#[embassy_executor::task]
pub(crate) async fn dns_task(stack: Stack<'static>) -> ! {
    let ap_ip = config::ap_addressing().ip();

    loop {
        while DNS_CONTROL.wait().await != Control::Enable {
            DNS_STATUS.signal(Status::Disabled);
        }
        DNS_STATUS.signal(Status::Enabled);
        info!("dns: hijack up, answering everything with {ap_ip}");

        match select(wait_for_disable(&DNS_CONTROL), run_dns(stack, ap_ip)).await {
            Either::First(()) | Either::Second(()) => {}
        }

        info!("dns: hijack down");
        DNS_STATUS.signal(Status::Disabled);
    }
}

/// DHCP server for portal clients.  Hands out the portal's address as
/// router and resolver.
#[embassy_executor::task]
pub(crate) async fn dhcp_task(stack: Stack<'static>) -> ! {
    loop {
        while DHCP_CONTROL.wait().await != Control::Enable {
            DHCP_STATUS.signal(Status::Disabled);
        }
        DHCP_STATUS.signal(Status::Enabled);
        let (pool_start, pool_end) = config::dhcp_pool();
        info!("dhcp: serving pool {pool_start} to {pool_end}");

        let mut dhcp_server = create_dhcp_server();
        match select(wait_for_disable(&DHCP_CONTROL), dhcp_server.run(stack)).await {
            Either::First(()) => {}
            Either::Second(never) => never,
        }

        info!("dhcp: stopped");
        DHCP_STATUS.signal(Status::Disabled);
    }
}

async fn wait_for_disable(control: &Signal<CriticalSectionRawMutex, Control>) {
    while control.wait().await != Control::Disable {}
}

async fn run_dns(stack: Stack<'static>, ap_ip: Ipv4Addr) {
    let mut tx_buf = [0u8; 256];
    let mut rx_buf = [0u8; 256];

    // Bind to all interfaces
    let local_addr = SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), DNS_PORT);
    let ttl = Duration::from_secs(config::DNS_TTL_SECS);

    let udp_buffers = edge_nal_embassy::UdpBuffers::<1, 256, 256, 1>::new();
    let udp = edge_nal_embassy::Udp::new(stack, &udp_buffers);

    loop {
        if let Err(e) = edge_captive::io::run(
            &udp,
            local_addr,
            &mut tx_buf,
            &mut rx_buf,
            ap_ip,
            ttl.into(),
        )
        .await
        {
            warn!("dns: responder error: {e:?}");
            Timer::after(Duration::from_secs(1)).await;
        }
    }
}

fn create_dhcp_server() -> DhcpServer<32, 4> {
    let addressing = config::ap_addressing();
    let server_ip = addressing.ip();
    let subnet_mask = addressing.netmask();

    let (pool_start, pool_end) = config::dhcp_pool();

    // Portal address doubles as router and resolver
    DhcpServer::new_with_dns(
        server_ip,
        subnet_mask,
        server_ip,
        server_ip,
        pool_start,
        pool_end,
    )
}
