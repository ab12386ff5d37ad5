//! Proxy channel: an opaque byte pipe to the phone application.
//!
//! Outbound sends are notifications on the proxy characteristic with a
//! bounded retry; inbound writes go to a single registered consumer.
//! The status characteristic shares the same notify path.

use core::future::Future;

use embedded_hal_async::delay::DelayNs;

use chromatic_proto::proxy::PROXY_PING;

use crate::config::{RetryPolicy, WRITE_CAP};
use crate::link::{Characteristic, ConnHandle, LinkStateMachine};

/// Transport-level notification failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError {
    /// No buffer available for the notification.
    NoMemory,
    Busy,
    Stalled,
    /// The connection went away mid-send.
    Disconnected,
    Other,
}

impl core::fmt::Display for TransportError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NoMemory => write!(f, "no memory"),
            Self::Busy => write!(f, "busy"),
            Self::Stalled => write!(f, "stalled"),
            Self::Disconnected => write!(f, "disconnected"),
            Self::Other => write!(f, "transport failure"),
        }
    }
}

/// Error type for proxy and status sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProxyError {
    /// No peer, or the peer has not subscribed.
    NotConnected,
    /// Empty or oversized payload.
    InvalidArgument,
    /// Every attempt failed; carries the last transport error.
    Transport(TransportError),
}

impl core::fmt::Display for ProxyError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotConnected => write!(f, "not connected"),
            Self::InvalidArgument => write!(f, "invalid argument"),
            Self::Transport(e) => write!(f, "transport: {}", e),
        }
    }
}

/// Sends one notification on a characteristic of a connection.
pub trait NotifyTransport {
    fn notify(
        &mut self,
        conn: ConnHandle,
        characteristic: Characteristic,
        data: &[u8],
    ) -> impl Future<Output = Result<(), TransportError>>;
}

/// Receives inbound proxy writes.
pub trait ProxyConsumer {
    fn on_message(&mut self, data: &[u8]);
}

impl<F: FnMut(&[u8])> ProxyConsumer for F {
    fn on_message(&mut self, data: &[u8]) {
        self(data)
    }
}

/// Notify with bounded retry.
///
/// Fails fast without touching the transport when the peer is absent or
/// unsubscribed, or when `data` is empty or larger than [`WRITE_CAP`].
///
/// # Errors
///
/// See [`ProxyError`].
pub async fn notify_with_retry<T: NotifyTransport, D: DelayNs>(
    transport: &mut T,
    delay: &mut D,
    policy: RetryPolicy,
    link: &LinkStateMachine,
    characteristic: Characteristic,
    data: &[u8],
) -> Result<(), ProxyError> {
    let conn = match link.connection() {
        Some(conn) if link.is_subscribed(characteristic) => conn,
        _ => return Err(ProxyError::NotConnected),
    };
    if data.is_empty() || data.len() > WRITE_CAP {
        return Err(ProxyError::InvalidArgument);
    }

    let mut last = TransportError::Other;
    for attempt in 0..policy.attempts.max(1) {
        if attempt > 0 {
            delay.delay_ms(policy.delay_ms).await;
        }
        match transport.notify(conn, characteristic, data).await {
            Ok(()) => return Ok(()),
            Err(e) => last = e,
        }
    }

    warn!(
        "proxy: {:?} notify failed after {} attempts: {:?}",
        characteristic, policy.attempts, last
    );
    Err(ProxyError::Transport(last))
}

/// Proxy and status notification endpoint plus inbound dispatch.
pub struct ProxyChannel<T, D, C> {
    transport: T,
    delay: D,
    policy: RetryPolicy,
    consumer: Option<C>,
}

impl<T: NotifyTransport, D: DelayNs, C: ProxyConsumer> ProxyChannel<T, D, C> {
    pub fn new(transport: T, delay: D, policy: RetryPolicy) -> Self {
        Self {
            transport,
            delay,
            policy,
            consumer: None,
        }
    }

    /// Register the inbound consumer, returning the one it replaces.
    pub fn register_consumer(&mut self, consumer: C) -> Option<C> {
        self.consumer.replace(consumer)
    }

    /// Remove the inbound consumer.
    pub fn take_consumer(&mut self) -> Option<C> {
        self.consumer.take()
    }

    pub fn consumer_mut(&mut self) -> Option<&mut C> {
        self.consumer.as_mut()
    }

    /// Send an application message on the proxy characteristic.
    ///
    /// # Errors
    ///
    /// See [`notify_with_retry`].
    pub async fn send(&mut self, link: &LinkStateMachine, data: &[u8]) -> Result<(), ProxyError> {
        notify_with_retry(
            &mut self.transport,
            &mut self.delay,
            self.policy,
            link,
            Characteristic::Proxy,
            data,
        )
        .await
    }

    /// Push a status payload on the status characteristic.
    ///
    /// # Errors
    ///
    /// See [`notify_with_retry`].
    pub async fn notify_status(
        &mut self,
        link: &LinkStateMachine,
        data: &[u8],
    ) -> Result<(), ProxyError> {
        notify_with_retry(
            &mut self.transport,
            &mut self.delay,
            self.policy,
            link,
            Characteristic::Status,
            data,
        )
        .await
    }

    /// Confirm a fresh proxy subscription to the peer.
    ///
    /// # Errors
    ///
    /// See [`notify_with_retry`].
    pub async fn send_ping(&mut self, link: &LinkStateMachine) -> Result<(), ProxyError> {
        self.send(link, PROXY_PING).await
    }

    /// Deliver an inbound write, truncated to [`WRITE_CAP`] bytes.
    ///
    /// Returns `false` if no consumer is registered.
    pub fn on_receive(&mut self, data: &[u8]) -> bool {
        let data = &data[..data.len().min(WRITE_CAP)];
        match self.consumer.as_mut() {
            Some(consumer) => {
                consumer.on_message(data);
                true
            }
            None => {
                debug!("proxy: dropped {} bytes, no consumer", data.len());
                false
            }
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}
