//! BLE peripheral: GATT service, link events and proxy traffic.
//!
//! The host stack is `trouble-host` over an external HCI controller. This
//! module adapts it to the platform-agnostic pieces in `chromatic_core`:
//!
//! - [`BleRadio`] implements [`RadioStack`] for the link state machine
//! - [`GattNotifier`] implements [`NotifyTransport`] for the proxy channel
//!
//! # Service
//!
//! | Characteristic | UUID suffix | Properties              |
//! |----------------|-------------|-------------------------|
//! | Status         | `0002`      | read, notify            |
//! | Ingest         | `0003`      | write, write w/o resp   |
//! | Proxy          | `0004`      | write, write w/o resp, notify |
//!
//! Ingest writes go to the cheat task over [`CHEAT_INPUT`]; nothing in the
//! link context touches flash.
//!
//! While connected, a ticker drives [`Telemetry`] from the mirrored work RAM
//! window and asks the co-processor for a fresh snapshot.

use core::cell::RefCell;

use chromatic_core::cheats::GameKey;
use chromatic_core::config::{BridgeConfig, STATUS_CAPACITY, WRITE_CAP};
use chromatic_core::device::TxFlags;
use chromatic_core::link::{
    Characteristic as Channel, ConnHandle, LinkEvent, LinkState, LinkStateMachine, RadioError,
    RadioStack,
};
use chromatic_core::proxy::{NotifyTransport, ProxyChannel, ProxyConsumer, TransportError};
use chromatic_core::router::ProxyRouter;
use chromatic_core::telemetry::{tick_interval_ms, Telemetry};
use chromatic_proto::advert::AdvertisingData;
use defmt::{debug, error, info, warn};
use embassy_futures::join::join;
use embassy_futures::select::{select3, Either3};
use embassy_time::{Delay, Duration, Ticker, Timer};
use heapless::Vec;
use trouble_host::prelude::*;

use crate::shared::{self, CheatInput, CHEAT_INPUT, COMMANDS, IDENTITY, STATUS, STATUS_CHANGED};

/// Simultaneous connections.
pub const CONNECTIONS_MAX: usize = 1;

/// L2CAP channels: signalling and ATT.
pub const L2CAP_CHANNELS_MAX: usize = 2;

/// Avatar buffer: up to 64x64 RGBA.
pub const AVATAR_CAPACITY: usize = 64 * 64 * 4;

/// Pause before retrying a failed advertising start.
const ADVERTISE_RETRY: Duration = Duration::from_millis(500);

/// CCCD bit enabling notifications.
const CCCD_NOTIFY: u8 = 0x01;

type Payload = Vec<u8, STATUS_CAPACITY>;

#[gatt_server]
struct Server {
    bridge: BridgeService,
}

#[gatt_service(uuid = "e1f40400-78fc-4c5f-9aee-9f4d6a1d0001")]
struct BridgeService {
    #[characteristic(uuid = "e1f40400-78fc-4c5f-9aee-9f4d6a1d0002", read, notify)]
    status: Payload,
    #[characteristic(uuid = "e1f40400-78fc-4c5f-9aee-9f4d6a1d0003", write, write_without_response)]
    ingest: Payload,
    #[characteristic(
        uuid = "e1f40400-78fc-4c5f-9aee-9f4d6a1d0004",
        write,
        write_without_response,
        notify
    )]
    proxy: Payload,
}

/// Advertising requests from the link state machine.
///
/// `trouble-host` advertises from an async loop, so starting only records
/// the request and the loop in [`run`] picks it up.
pub struct BleRadio {
    address: [u8; 6],
    advertise: bool,
}

impl BleRadio {
    #[must_use]
    pub const fn new(address: [u8; 6]) -> Self {
        Self {
            address,
            advertise: false,
        }
    }

    #[must_use]
    pub const fn wants_advertising(&self) -> bool {
        self.advertise
    }
}

impl RadioStack for BleRadio {
    fn identity_address(&mut self) -> Option<[u8; 6]> {
        Some(self.address)
    }

    fn start_advertising(&mut self, _data: &AdvertisingData) -> Result<(), RadioError> {
        if self.advertise {
            return Err(RadioError::Already);
        }
        self.advertise = true;
        Ok(())
    }

    fn stop_advertising(&mut self) {
        self.advertise = false;
    }
}

/// Notifications on one GATT connection.
pub struct GattNotifier<'a, 'v, 'c, 's, P: PacketPool> {
    server: &'a Server<'v>,
    conn: &'a GattConnection<'c, 's, P>,
}

impl<P: PacketPool> NotifyTransport for GattNotifier<'_, '_, '_, '_, P> {
    async fn notify(
        &mut self,
        _conn: ConnHandle,
        channel: Channel,
        data: &[u8],
    ) -> Result<(), TransportError> {
        let value = Payload::from_slice(data).map_err(|_| TransportError::Other)?;
        let characteristic = match channel {
            Channel::Status => &self.server.bridge.status,
            Channel::Proxy => &self.server.bridge.proxy,
        };
        characteristic
            .notify(self.conn, &value)
            .await
            .map_err(transport_error)
    }
}

fn transport_error(e: trouble_host::Error) -> TransportError {
    match e {
        trouble_host::Error::OutOfMemory => TransportError::NoMemory,
        trouble_host::Error::Busy => TransportError::Busy,
        trouble_host::Error::Disconnected => TransportError::Disconnected,
        _ => TransportError::Other,
    }
}

fn on_link_state(state: LinkState) {
    info!("ble: link {}", state);
}

/// Run the BLE host and the bridge service forever.
pub async fn run<C: Controller>(controller: C, address: [u8; 6], config: &BridgeConfig) {
    let mut resources: HostResources<DefaultPacketPool, CONNECTIONS_MAX, L2CAP_CHANNELS_MAX> =
        HostResources::new();
    let stack = trouble_host::new(controller, &mut resources)
        .set_random_address(Address::random(address));
    let Host {
        mut peripheral,
        mut runner,
        ..
    } = stack.build();

    let server = match Server::new_with_config(GapConfig::Peripheral(PeripheralConfig {
        name: config.device_name,
        appearance: &appearance::power_device::GENERIC_POWER_DEVICE,
    })) {
        Ok(server) => server,
        Err(e) => {
            error!("ble: gatt server setup failed: {}", e);
            return;
        }
    };
    let mut link = match LinkStateMachine::new(config) {
        Ok(link) => link,
        Err(e) => {
            error!("ble: advertising data: {}", e);
            return;
        }
    };
    link.set_observer(Some(on_link_state));

    let host = async {
        loop {
            if runner.run().await.is_err() {
                error!("ble: host runner stopped, restarting");
                Timer::after(ADVERTISE_RETRY).await;
            }
        }
    };
    let app = advertise_loop(&mut peripheral, &server, &mut link, address, config);
    join(host, app).await;
}

async fn advertise_loop<C: Controller>(
    peripheral: &mut Peripheral<'_, C, DefaultPacketPool>,
    server: &Server<'_>,
    link: &mut LinkStateMachine,
    address: [u8; 6],
    config: &BridgeConfig,
) {
    let mut radio = BleRadio::new(address);
    let router = RefCell::new(ProxyRouter::<AVATAR_CAPACITY>::new());

    // The host is usable as soon as the runner starts.
    link.handle_event(&mut radio, LinkEvent::Synced);
    IDENTITY.lock(|id| {
        let mut id = id.borrow_mut();
        id.clear();
        let _ = id.push_str(link.identity());
    });
    CHEAT_INPUT.send(CheatInput::Refresh).await;
    link.enable(&mut radio, true);

    loop {
        if !radio.wants_advertising() {
            Timer::after(ADVERTISE_RETRY).await;
            let _ = link.start_advertising(&mut radio);
            continue;
        }

        let data = *link.advertising_data();
        let advertisement = Advertisement::ConnectableScannableUndirected {
            adv_data: data.adv.as_bytes(),
            scan_data: data.scan_response.as_bytes(),
        };
        let advertiser = match peripheral
            .advertise(&AdvertisementParameters::default(), advertisement)
            .await
        {
            Ok(advertiser) => advertiser,
            Err(_) => {
                warn!("ble: advertising failed to start");
                radio.stop_advertising();
                Timer::after(ADVERTISE_RETRY).await;
                link.handle_event(&mut radio, LinkEvent::AdvertiseComplete);
                continue;
            }
        };

        let conn = match advertiser
            .accept()
            .await
            .and_then(|conn| conn.with_attribute_server(server))
        {
            Ok(conn) => conn,
            Err(e) => {
                warn!("ble: accept failed: {}", e);
                radio.stop_advertising();
                link.handle_event(&mut radio, LinkEvent::ConnectFailed);
                continue;
            }
        };

        radio.stop_advertising();
        link.handle_event(&mut radio, LinkEvent::Connected(conn.raw().handle().raw()));
        serve(server, &conn, link, &mut radio, &router, config).await;
        link.handle_event(&mut radio, LinkEvent::Disconnected);
    }
}

/// Serve one connection until it drops.
async fn serve<P: PacketPool>(
    server: &Server<'_>,
    conn: &GattConnection<'_, '_, P>,
    link: &mut LinkStateMachine,
    radio: &mut BleRadio,
    router: &RefCell<ProxyRouter<AVATAR_CAPACITY>>,
    config: &BridgeConfig,
) {
    let consumer = |data: &[u8]| {
        let mut router = router.borrow_mut();
        let before = router.game_id();
        router.on_message(data);
        if let Some(id) = router.game_id().filter(|&id| Some(id) != before) {
            if CHEAT_INPUT.try_send(CheatInput::GameHash(id)).is_err() {
                warn!("ble: cheat task busy, game id dropped");
            }
        }
    };
    let mut proxy = ProxyChannel::new(GattNotifier { server, conn }, Delay, config.notify_retry);
    proxy.register_consumer(consumer);
    refresh_status(server);

    let mut telemetry = Telemetry::new();
    let mut ticker = Ticker::every(Duration::from_millis(u64::from(tick_interval_ms(config))));

    loop {
        match select3(conn.next(), STATUS_CHANGED.wait(), ticker.next()).await {
            Either3::First(GattConnectionEvent::Disconnected { reason }) => {
                info!("ble: disconnected: {}", reason);
                return;
            }
            Either3::First(GattConnectionEvent::Gatt { event }) => {
                let greet = match &event {
                    GattEvent::Write(write) => {
                        on_write(server, write.handle(), write.data(), link, radio, &mut proxy)
                    }
                    _ => None,
                };
                match event.accept() {
                    Ok(reply) => reply.send().await,
                    Err(e) => warn!("ble: reply failed: {}", e),
                }
                if greet == Some(Channel::Proxy) {
                    if let Err(e) = proxy.send_ping(link).await {
                        warn!("ble: proxy ping: {}", e);
                    }
                }
            }
            Either3::First(_) => {}
            Either3::Second(()) => {
                let status = refresh_status(server);
                if link.is_subscribed(Channel::Status) {
                    if let Err(e) = proxy.notify_status(link, &status).await {
                        warn!("ble: status notify: {}", e);
                    }
                }
            }
            Either3::Third(()) => {
                COMMANDS.request(TxFlags::WRAM_SNAPSHOT);
                if let Some(hash) = shared::game_hash() {
                    telemetry.set_title(GameKey::from_hash(hash).as_str().as_bytes());
                }
                let window = shared::wram_snapshot();
                // Proxy writes are only delivered from the Gatt arm, so the
                // router is not borrowed elsewhere during the tick.
                #[allow(clippy::await_holding_refcell_ref)]
                let report = {
                    let mut router = router.borrow_mut();
                    telemetry
                        .tick(&mut proxy, link, window.as_ref(), router.watches_mut())
                        .await
                };
                if report.watch_hits > 0 {
                    debug!("ble: {} watch hits sent", report.watch_hits);
                }
            }
        }
    }
}

/// Dispatch one write. Returns a characteristic that was just subscribed.
fn on_write<T: NotifyTransport, C: ProxyConsumer>(
    server: &Server<'_>,
    handle: u16,
    data: &[u8],
    link: &mut LinkStateMachine,
    radio: &mut BleRadio,
    proxy: &mut ProxyChannel<T, Delay, C>,
) -> Option<Channel> {
    let bridge = &server.bridge;
    if handle == bridge.ingest.handle {
        let data = &data[..data.len().min(WRITE_CAP)];
        let queued = Vec::from_slice(data)
            .ok()
            .map(|chunk| CHEAT_INPUT.try_send(CheatInput::Ingest(chunk)).is_ok());
        if queued != Some(true) {
            warn!("ble: ingest of {} bytes dropped", data.len());
        }
        None
    } else if handle == bridge.proxy.handle {
        if !proxy.on_receive(data) {
            warn!("ble: proxy write without consumer");
        }
        None
    } else if Some(handle) == bridge.status.cccd_handle {
        subscribe(link, radio, Channel::Status, data)
    } else if Some(handle) == bridge.proxy.cccd_handle {
        subscribe(link, radio, Channel::Proxy, data)
    } else {
        None
    }
}

fn subscribe(
    link: &mut LinkStateMachine,
    radio: &mut BleRadio,
    characteristic: Channel,
    cccd: &[u8],
) -> Option<Channel> {
    let notify = cccd.first().is_some_and(|bits| bits & CCCD_NOTIFY != 0);
    link.handle_event(
        radio,
        LinkEvent::Subscribe {
            characteristic,
            notify,
        },
    )
}

/// Copy the published status into the characteristic value.
fn refresh_status(server: &Server<'_>) -> Payload {
    let status = STATUS.lock(|status| status.borrow().clone());
    if server.set(&server.bridge.status, &status).is_err() {
        warn!("ble: status value not updated");
    }
    status
}
