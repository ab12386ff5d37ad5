//! Byte stream to the co-processor.
//!
//! # Pins
//!
//! Uses UART0:
//! - GPIO 0: TX, commands
//! - GPIO 1: RX, replies
//!
//! 115200 baud, 8N1.

use embassy_rp::uart::{Async, Error as UartError, UartRx, UartTx};
use embedded_io_async::{ErrorKind, ErrorType, Read, Write};

/// Device link baud rate.
pub const DEVICE_BAUD: u32 = 115_200;

/// UART transfer failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub struct DeviceUartError(pub UartError);

impl embedded_io_async::Error for DeviceUartError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// [`Write`] over the DMA-driven UART transmitter.
pub struct DeviceUart<'d> {
    tx: UartTx<'d, Async>,
}

impl<'d> DeviceUart<'d> {
    #[must_use]
    pub fn new(tx: UartTx<'d, Async>) -> Self {
        Self { tx }
    }
}

impl ErrorType for DeviceUart<'_> {
    type Error = DeviceUartError;
}

impl Write for DeviceUart<'_> {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.tx.write(buf).await.map_err(DeviceUartError)?;
        Ok(buf.len())
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        self.tx.blocking_flush().map_err(DeviceUartError)
    }
}

/// [`Read`] over the DMA-driven UART receiver.
///
/// Replies are short and irregular, so each read waits for one byte.
pub struct DeviceUartRx<'d> {
    rx: UartRx<'d, Async>,
}

impl<'d> DeviceUartRx<'d> {
    #[must_use]
    pub fn new(rx: UartRx<'d, Async>) -> Self {
        Self { rx }
    }
}

impl ErrorType for DeviceUartRx<'_> {
    type Error = DeviceUartError;
}

impl Read for DeviceUartRx<'_> {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let Some(first) = buf.first_mut() else {
            return Ok(0);
        };
        let mut byte = [0u8; 1];
        self.rx.read(&mut byte).await.map_err(DeviceUartError)?;
        *first = byte[0];
        Ok(1)
    }
}
