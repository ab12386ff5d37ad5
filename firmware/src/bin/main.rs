#![no_std]
#![no_main]

use bt_hci::controller::ExternalController;
use bt_hci::transport::SerialTransport;
use chromatic_core::config::{BridgeConfig, STATUS_CAPACITY};
use chromatic_core::status::{fill_status, ingest};
use chromatic_core::{CheatEngine, CommandQueue, DeviceReader, DeviceWriter};
use chromatic_firmware::flash_store::FLASH_SIZE;
use chromatic_firmware::shared::{self, CheatInput, CHEAT_INPUT, COMMANDS, SETTINGS};
use chromatic_firmware::{ble, ButtonPad, DeviceUart, DeviceUartRx, FlashCheatStore, DEVICE_BAUD};
use chromatic_proto::Reply;
use defmt::{debug, info, warn};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_rp::bind_interrupts;
use embassy_rp::flash::{Blocking, Flash};
use embassy_rp::gpio::{Input, Pull};
use embassy_rp::peripherals::{UART0, UART1};
use embassy_rp::uart::{BufferedUart, BufferedUartRx, BufferedUartTx, Config as UartConfig, Uart};
use embassy_sync::blocking_mutex::raw::{CriticalSectionRawMutex, NoopRawMutex};
use embassy_time::Delay;
use static_cell::StaticCell;

#[cfg(feature = "dev-panic")]
use panic_probe as _;
#[cfg(feature = "prod-panic")]
use panic_reset as _;

bind_interrupts!(struct Irqs {
    UART0_IRQ => embassy_rp::uart::InterruptHandler<UART0>;
    UART1_IRQ => embassy_rp::uart::BufferedInterruptHandler<UART1>;
});

/// Baud rate of the HCI controller.
const HCI_BAUD: u32 = 1_000_000;

type Controller = ExternalController<
    SerialTransport<NoopRawMutex, BufferedUartRx, BufferedUartTx>,
    10,
>;
type Engine = CheatEngine<FlashCheatStore<'static>, &'static CommandQueue<CriticalSectionRawMutex>>;

static HCI_TX_BUF: StaticCell<[u8; 256]> = StaticCell::new();
static HCI_RX_BUF: StaticCell<[u8; 256]> = StaticCell::new();

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Chromatic bridge starting...");

    let p = embassy_rp::init(embassy_rp::config::Config::default());

    // --- Flash: radio identity and cheat records ---
    let mut flash = Flash::<_, Blocking, FLASH_SIZE>::new_blocking(p.FLASH);
    let mut uid = [0u8; 8];
    if flash.blocking_unique_id(&mut uid).is_err() {
        warn!("flash: unique id unavailable");
    }
    let mut address = [0u8; 6];
    address.copy_from_slice(&uid[2..]);
    // Static random address: two top bits set.
    address[5] |= 0xC0;
    let engine: Engine = CheatEngine::new(FlashCheatStore::new(flash), &COMMANDS);

    // --- Device link ---
    let mut device_config = UartConfig::default();
    device_config.baudrate = DEVICE_BAUD;
    let device = Uart::new(
        p.UART0,
        p.PIN_0, // TX
        p.PIN_1, // RX
        Irqs,
        p.DMA_CH0,
        p.DMA_CH1,
        device_config,
    );
    let (device_tx, device_rx) = device.split();

    // --- HCI controller ---
    let mut hci_config = UartConfig::default();
    hci_config.baudrate = HCI_BAUD;
    let hci = BufferedUart::new(
        p.UART1,
        p.PIN_4, // TX
        p.PIN_5, // RX
        Irqs,
        HCI_TX_BUF.init([0; 256]),
        HCI_RX_BUF.init([0; 256]),
        hci_config,
    );
    let (hci_tx, hci_rx) = hci.split();
    let controller: Controller = ExternalController::new(SerialTransport::new(hci_rx, hci_tx));

    // --- Buttons ---
    let pad = ButtonPad::new(
        [
            Input::new(p.PIN_10, Pull::Up),
            Input::new(p.PIN_11, Pull::Up),
            Input::new(p.PIN_12, Pull::Up),
            Input::new(p.PIN_13, Pull::Up),
            Input::new(p.PIN_14, Pull::Up),
            Input::new(p.PIN_15, Pull::Up),
            Input::new(p.PIN_16, Pull::Up),
            Input::new(p.PIN_17, Pull::Up),
        ],
        Input::new(p.PIN_18, Pull::Up),
    );

    spawner.spawn(device_task(DeviceUart::new(device_tx)).unwrap());
    spawner.spawn(device_rx_task(DeviceUartRx::new(device_rx)).unwrap());
    spawner.spawn(cheat_task(engine).unwrap());
    spawner.spawn(ble_task(controller, address).unwrap());
    spawner.spawn(buttons_task(pad).unwrap());

    // The co-processor may still be booting; repeat the full state.
    COMMANDS.boot_resync(&mut Delay).await;
    info!("Chromatic bridge initialized");
}

/// Device task - drains the command queue onto UART0.
#[embassy_executor::task]
async fn device_task(uart: DeviceUart<'static>) {
    let mut writer = DeviceWriter::new(&COMMANDS, uart, &SETTINGS, Delay, &BridgeConfig::DEFAULT);
    writer.run().await
}

/// Device RX task - follows the co-processor's framing and mirrors what it
/// reports.
#[embassy_executor::task]
async fn device_rx_task(uart: DeviceUartRx<'static>) {
    let mut reader = DeviceReader::new(&COMMANDS, uart);
    loop {
        let frame = match reader.next().await {
            Ok(Some(frame)) => frame,
            Ok(None) => continue,
            Err(e) => {
                warn!("device: rx error: {}", e);
                continue;
            }
        };
        match frame.reply() {
            Reply::FirmwareVersion(version) => info!("device: co-processor firmware {=u16:#06x}", version),
            Reply::GameHash(hash) => {
                if shared::publish_game_hash(hash) {
                    CHEAT_INPUT.send(CheatInput::GameHash(hash)).await;
                }
            }
            Reply::WramChunk { address, data } => {
                shared::store_wram(address, data);
            }
            Reply::FramebufferChunk { offset, .. } => debug!("device: preview chunk at {}", offset),
            Reply::Other(id) => debug!("device: reply {=u8:#04x} ignored", id),
        }
    }
}

/// Cheat task - owns the engine and flash, renders the status payload.
#[embassy_executor::task]
async fn cheat_task(mut engine: Engine) {
    let mut status = [0u8; STATUS_CAPACITY];
    loop {
        let input = CHEAT_INPUT.receive().await;
        debug!("cheat: {}", input);
        match input {
            CheatInput::Ingest(data) => {
                let applied = ingest(&mut engine, &data);
                info!("cheat: imported {} codes", applied);
            }
            CheatInput::Button(button) => engine.on_button(button),
            CheatInput::Menu(true) => engine.open(),
            CheatInput::Menu(false) => engine.close(),
            CheatInput::GameHash(hash) => engine.set_game_hash(hash),
            CheatInput::Refresh => {}
        }

        let identity = shared::identity();
        let len = fill_status(&identity, &mut engine, &mut status);
        shared::publish_status(&status[..len]);
    }
}

/// BLE task - host stack, GATT service and proxy.
#[embassy_executor::task]
async fn ble_task(controller: Controller, address: [u8; 6]) {
    ble::run(controller, address, &BridgeConfig::DEFAULT).await;
}

/// Buttons task - menu navigation and backlight.
#[embassy_executor::task]
async fn buttons_task(mut pad: ButtonPad<'static>) {
    pad.run().await
}
