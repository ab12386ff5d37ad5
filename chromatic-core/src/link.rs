//! Wireless link state machine.
//!
//! Tracks one connectable endpoint through three states:
//!
//! ```text
//!            enable / sync          connect
//!  Stopped ───────────────▶ Advertising ──────▶ Connected
//!     ▲                         │                   │
//!     └──── adv complete ───────┘◀── disconnect ────┘
//!           (re-advertise while enabled)
//! ```
//!
//! The machine never talks to a radio on its own initiative. Events are fed
//! in from the radio context through [`LinkStateMachine::handle_event`] and
//! commands go out through the [`RadioStack`] trait, so every transition can
//! be driven from a host test.

use chromatic_proto::advert::{AdvertisingData, SERVICE_UUID};
use chromatic_proto::fmt::format_address;
use chromatic_proto::SerializeError;

use crate::config::BridgeConfig;

/// Connection handle assigned by the radio stack.
pub type ConnHandle = u16;

/// Link lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkState {
    Stopped,
    Advertising,
    Connected,
}

/// Characteristics the peer can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Characteristic {
    Status,
    Proxy,
}

/// Events delivered by the radio context, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkEvent {
    /// Host and controller finished synchronizing.
    Synced,
    /// The host stack reset; a new [`LinkEvent::Synced`] will follow.
    Reset,
    Connected(ConnHandle),
    ConnectFailed,
    Disconnected,
    AdvertiseComplete,
    Subscribe {
        characteristic: Characteristic,
        notify: bool,
    },
}

/// Advertising failures reported by the radio stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RadioError {
    /// Advertising is already running.
    Already,
    Busy,
    Invalid,
    Stalled,
    NoMemory,
    Controller,
    HciTimeout,
    Other,
}

impl RadioError {
    /// Numeric code kept for diagnostics.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Already => 1,
            Self::Busy => 2,
            Self::Invalid => 3,
            Self::Stalled => 4,
            Self::NoMemory => 5,
            Self::Controller => 6,
            Self::HciTimeout => 7,
            Self::Other => 255,
        }
    }

    /// Short reason string for status displays.
    #[must_use]
    pub const fn reason(self) -> &'static str {
        match self {
            Self::Already => "already",
            Self::Busy => "busy",
            Self::Invalid => "invalid",
            Self::Stalled => "stalled",
            Self::NoMemory => "no-mem",
            Self::Controller => "ctrl",
            Self::HciTimeout => "hci-timeout",
            Self::Other => "fail",
        }
    }
}

impl core::fmt::Display for RadioError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.reason())
    }
}

/// Commands the state machine issues to the radio.
pub trait RadioStack {
    /// Public identity address, least significant byte first.
    fn identity_address(&mut self) -> Option<[u8; 6]>;

    /// Begin connectable undirected advertising with `data`.
    fn start_advertising(&mut self, data: &AdvertisingData) -> Result<(), RadioError>;

    /// Stop advertising. Stopping while idle is not an error.
    fn stop_advertising(&mut self);
}

/// Per-characteristic notification subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Subscriptions {
    status: bool,
    proxy: bool,
}

impl Subscriptions {
    #[inline]
    #[must_use]
    pub fn is_subscribed(&self, characteristic: Characteristic) -> bool {
        match characteristic {
            Characteristic::Status => self.status,
            Characteristic::Proxy => self.proxy,
        }
    }

    fn set(&mut self, characteristic: Characteristic, notify: bool) {
        match characteristic {
            Characteristic::Status => self.status = notify,
            Characteristic::Proxy => self.proxy = notify,
        }
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Called on every actual state transition.
pub type StateObserver = fn(LinkState);

const UNKNOWN_IDENTITY: &str = "unknown";

/// Advertising and connection lifecycle for the single link.
pub struct LinkStateMachine {
    state: LinkState,
    conn: Option<ConnHandle>,
    enabled: bool,
    synced: bool,
    pending_start: bool,
    last_error: Option<RadioError>,
    identity: Option<[u8; 17]>,
    subscriptions: Subscriptions,
    adv_data: AdvertisingData,
    observer: Option<StateObserver>,
}

impl LinkStateMachine {
    /// Create a stopped, enabled link.
    ///
    /// # Errors
    ///
    /// Returns [`SerializeError::BufferTooSmall`] if the configured device
    /// name does not fit the scan response.
    pub fn new(config: &BridgeConfig) -> Result<Self, SerializeError> {
        Ok(Self {
            state: LinkState::Stopped,
            conn: None,
            enabled: true,
            synced: false,
            pending_start: false,
            last_error: None,
            identity: None,
            subscriptions: Subscriptions::default(),
            adv_data: AdvertisingData::new(config.device_name, SERVICE_UUID)?,
            observer: None,
        })
    }

    /// Register the transition observer, replacing any previous one.
    pub fn set_observer(&mut self, observer: Option<StateObserver>) {
        self.observer = observer;
    }

    #[inline]
    #[must_use]
    pub fn state(&self) -> LinkState {
        self.state
    }

    #[inline]
    #[must_use]
    pub fn connection(&self) -> Option<ConnHandle> {
        self.conn
    }

    #[inline]
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[inline]
    #[must_use]
    pub fn is_subscribed(&self, characteristic: Characteristic) -> bool {
        self.subscriptions.is_subscribed(characteristic)
    }

    #[inline]
    #[must_use]
    pub fn is_start_pending(&self) -> bool {
        self.pending_start
    }

    #[inline]
    #[must_use]
    pub fn last_error(&self) -> Option<RadioError> {
        self.last_error
    }

    /// Reason for the last advertising failure, empty after a success.
    #[must_use]
    pub fn last_error_reason(&self) -> &'static str {
        self.last_error.map_or("", RadioError::reason)
    }

    /// Identity address as `XX:XX:XX:XX:XX:XX`, or `unknown` before sync.
    #[must_use]
    pub fn identity(&self) -> &str {
        self.identity
            .as_ref()
            .and_then(|id| core::str::from_utf8(id).ok())
            .unwrap_or(UNKNOWN_IDENTITY)
    }

    #[inline]
    #[must_use]
    pub fn advertising_data(&self) -> &AdvertisingData {
        &self.adv_data
    }

    /// Turn advertising on or off.
    ///
    /// Disabling never drops an active connection; it only suppresses
    /// advertising once the peer leaves.
    pub fn enable<R: RadioStack>(&mut self, radio: &mut R, enabled: bool) {
        if enabled {
            self.enabled = true;
            let _ = self.start_advertising(radio);
        } else {
            self.stop_advertising(radio);
        }
    }

    /// Start advertising if enabled, deferring until sync if necessary.
    ///
    /// "Already advertising" counts as success.
    ///
    /// # Errors
    ///
    /// Returns the radio's error; it is also kept as [`Self::last_error`].
    pub fn start_advertising<R: RadioStack>(&mut self, radio: &mut R) -> Result<(), RadioError> {
        self.pending_start = false;

        if !self.enabled {
            self.last_error = None;
            if self.state != LinkState::Connected {
                self.set_state(LinkState::Stopped);
            }
            return Ok(());
        }

        if !self.synced {
            debug!("link: radio not synced, deferring advertising");
            self.pending_start = true;
            return Ok(());
        }

        if self.state == LinkState::Connected {
            debug!("link: connected, not advertising");
            return Ok(());
        }

        radio.stop_advertising();
        match radio.start_advertising(&self.adv_data) {
            Ok(()) | Err(RadioError::Already) => {
                info!("link: advertising");
                self.last_error = None;
                self.set_state(LinkState::Advertising);
                Ok(())
            }
            Err(e) => {
                warn!("link: advertising failed ({})", e.reason());
                self.last_error = Some(e);
                Err(e)
            }
        }
    }

    /// Disable advertising. An active connection is left intact.
    pub fn stop_advertising<R: RadioStack>(&mut self, radio: &mut R) {
        self.enabled = false;
        self.pending_start = false;
        radio.stop_advertising();

        if self.state != LinkState::Connected {
            self.conn = None;
            self.subscriptions.clear();
            self.set_state(LinkState::Stopped);
        }
        self.last_error = None;
    }

    /// Feed one radio event through the machine.
    ///
    /// Returns the characteristic that just became subscribed, if any, so
    /// the caller can greet the peer on it.
    pub fn handle_event<R: RadioStack>(
        &mut self,
        radio: &mut R,
        event: LinkEvent,
    ) -> Option<Characteristic> {
        trace!("link: event {:?}", event);
        match event {
            LinkEvent::Synced => {
                self.synced = true;
                self.identity = radio.identity_address().map(|addr| format_address(&addr));
                info!("link: synced, identity {}", self.identity());
                if self.enabled || self.pending_start {
                    let _ = self.start_advertising(radio);
                }
            }
            LinkEvent::Reset => {
                warn!("link: radio reset");
                self.synced = false;
                self.pending_start = self.enabled;
                self.drop_connection();
            }
            LinkEvent::Connected(handle) => {
                self.conn = Some(handle);
                self.pending_start = false;
                self.set_state(LinkState::Connected);
            }
            LinkEvent::ConnectFailed => {
                warn!("link: connect failed");
                self.drop_connection();
                self.restart_if_enabled(radio);
            }
            LinkEvent::Disconnected => {
                self.drop_connection();
                self.restart_if_enabled(radio);
            }
            LinkEvent::AdvertiseComplete => {
                if self.state == LinkState::Connected {
                    debug!("link: advertise complete while connected");
                } else {
                    self.set_state(LinkState::Stopped);
                    self.restart_if_enabled(radio);
                }
            }
            LinkEvent::Subscribe {
                characteristic,
                notify,
            } => {
                if self.conn.is_none() {
                    return None;
                }
                let was = self.subscriptions.is_subscribed(characteristic);
                self.subscriptions.set(characteristic, notify);
                info!("link: {:?} notify={}", characteristic, notify);
                if notify && !was {
                    return Some(characteristic);
                }
            }
        }
        None
    }

    fn drop_connection(&mut self) {
        self.conn = None;
        self.subscriptions.clear();
        self.set_state(LinkState::Stopped);
    }

    fn restart_if_enabled<R: RadioStack>(&mut self, radio: &mut R) {
        if self.enabled {
            let _ = self.start_advertising(radio);
        }
    }

    fn set_state(&mut self, state: LinkState) {
        if self.state == state {
            return;
        }
        debug!("link: {:?} -> {:?}", self.state, state);
        self.state = state;
        if let Some(observer) = self.observer {
            observer(state);
        }
    }
}
