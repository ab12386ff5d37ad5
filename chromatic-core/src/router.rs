//! Application-level handling of inbound proxy messages.
//!
//! The proxy channel itself is opaque. [`ProxyRouter`] sits behind it as the
//! registered consumer and keeps the state the phone application builds up:
//! the current game id, the memory watch table and the user profile with
//! its avatar image.
//!
//! # Avatar transfer
//!
//! ```text
//! UserProfile ──▶ AvatarChunk(0) ──▶ AvatarChunk(1) ──▶ … ──▶ AvatarDone
//! ```
//!
//! Chunks must arrive in order. A chunk with the wrong id, or one that would
//! overflow the buffer, is dropped and the transfer continues.

use heapless::{String, Vec};

use chromatic_proto::proxy::{encode_watch_hit, AvatarChunk, ProfileHeader, WatchSpec};
use chromatic_proto::{DecodeError, ProxyMessage, SerializeError};

use crate::proxy::ProxyConsumer;

/// Largest avatar edge in pixels.
pub const MAX_AVATAR_DIM: u8 = 128;

/// Bytes per avatar pixel (RGBA).
pub const AVATAR_BPP: usize = 4;

/// Longest profile name kept.
pub const MAX_NAME_LEN: usize = 31;

/// Name used when the profile carries none.
pub const DEFAULT_NAME: &str = "PLAYER";

pub const MIN_SCALE: u8 = 10;
pub const MAX_SCALE: u8 = 100;
pub const DEFAULT_SCALE: u8 = 50;

/// Watches held at once.
pub const MAX_WATCHES: usize = 8;

/// Widest span a single watch may cover.
pub const MAX_WATCH_SPAN: usize = 16;

/// Avatar assembly failures. The offending chunk is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AvatarError {
    /// No profile header has been received.
    NoHeader,
    OutOfOrder { expected: u16, got: u16 },
    /// The chunk would overflow the image buffer.
    Overflow,
    /// Done arrived before any data, or with zero dimensions.
    Incomplete,
    /// Dimensions exceed the limit or the data is short of `w * h * 4`.
    BadImage,
}

impl core::fmt::Display for AvatarError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NoHeader => write!(f, "no profile header"),
            Self::OutOfOrder { expected, got } => {
                write!(f, "chunk {got} out of order (expected {expected})")
            }
            Self::Overflow => write!(f, "avatar buffer full"),
            Self::Incomplete => write!(f, "avatar incomplete"),
            Self::BadImage => write!(f, "avatar dimensions invalid"),
        }
    }
}

/// Router failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RouterError {
    Decode(DecodeError),
    Avatar(AvatarError),
    /// The watch could not be stored.
    WatchRejected(u8),
}

impl From<DecodeError> for RouterError {
    fn from(e: DecodeError) -> Self {
        Self::Decode(e)
    }
}

impl From<AvatarError> for RouterError {
    fn from(e: AvatarError) -> Self {
        Self::Avatar(e)
    }
}

impl core::fmt::Display for RouterError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Decode(e) => write!(f, "{e}"),
            Self::Avatar(e) => write!(f, "{e}"),
            Self::WatchRejected(id) => write!(f, "watch {id} rejected"),
        }
    }
}

/// A normalized user profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub points: u32,
    /// Display scale percentage within `MIN_SCALE..=MAX_SCALE`.
    pub scale: u8,
    pub width: u8,
    pub height: u8,
    pub name: String<MAX_NAME_LEN>,
}

impl Profile {
    fn from_header(header: &ProfileHeader<'_>) -> Self {
        let scale = match header.scale {
            0 => DEFAULT_SCALE,
            s => s.clamp(MIN_SCALE, MAX_SCALE),
        };

        let mut name = String::new();
        for &b in header.name.iter().take(MAX_NAME_LEN) {
            let c = if b.is_ascii_graphic() || b == b' ' { b as char } else { '?' };
            let _ = name.push(c);
        }
        if name.trim().is_empty() {
            name.clear();
            let _ = name.push_str(DEFAULT_NAME);
        }

        Self {
            points: header.points,
            scale,
            width: header.width,
            height: header.height,
            name,
        }
    }
}

/// A finished avatar image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Avatar<'a> {
    pub profile: &'a Profile,
    /// `width * height` RGBA pixels, row-major.
    pub rgba: &'a [u8],
}

/// Collects avatar chunks into an `N` byte buffer.
pub struct ProfileAssembler<const N: usize> {
    profile: Option<Profile>,
    data: Vec<u8, N>,
    next_chunk: u16,
    complete: bool,
    header_seen: bool,
}

impl<const N: usize> ProfileAssembler<N> {
    pub const fn new() -> Self {
        Self {
            profile: None,
            data: Vec::new(),
            next_chunk: 0,
            complete: false,
            header_seen: false,
        }
    }

    /// Start a new transfer. Any partial image is discarded.
    pub fn begin(&mut self, header: &ProfileHeader<'_>) -> &Profile {
        self.data.clear();
        self.next_chunk = 0;
        self.complete = false;
        self.header_seen = true;
        self.profile.insert(Profile::from_header(header))
    }

    /// Append one chunk. Returns the bytes buffered so far.
    pub fn push_chunk(&mut self, chunk: &AvatarChunk<'_>) -> Result<usize, AvatarError> {
        if !self.header_seen {
            return Err(AvatarError::NoHeader);
        }
        if chunk.chunk_id != self.next_chunk {
            return Err(AvatarError::OutOfOrder {
                expected: self.next_chunk,
                got: chunk.chunk_id,
            });
        }
        self.data
            .extend_from_slice(chunk.data)
            .map_err(|_| AvatarError::Overflow)?;
        self.next_chunk = self.next_chunk.wrapping_add(1);
        Ok(self.data.len())
    }

    /// Validate the buffered image. Ends the transfer either way; the next
    /// one needs a fresh header.
    pub fn finish(&mut self) -> Result<Avatar<'_>, AvatarError> {
        if !self.header_seen {
            return Err(AvatarError::NoHeader);
        }
        self.header_seen = false;
        let profile = self.profile.as_ref().ok_or(AvatarError::NoHeader)?;
        let (w, h) = (profile.width, profile.height);
        if self.data.is_empty() || w == 0 || h == 0 {
            return Err(AvatarError::Incomplete);
        }
        let needed = usize::from(w) * usize::from(h) * AVATAR_BPP;
        if w > MAX_AVATAR_DIM || h > MAX_AVATAR_DIM || self.data.len() < needed {
            return Err(AvatarError::BadImage);
        }
        self.complete = true;
        Ok(Avatar {
            profile,
            rgba: &self.data[..needed],
        })
    }

    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    /// The last image accepted by [`Self::finish`].
    pub fn avatar(&self) -> Option<Avatar<'_>> {
        let profile = self.profile.as_ref().filter(|_| self.complete)?;
        let needed = usize::from(profile.width) * usize::from(profile.height) * AVATAR_BPP;
        Some(Avatar {
            profile,
            rgba: &self.data[..needed],
        })
    }

    pub fn received(&self) -> usize {
        self.data.len()
    }
}

impl<const N: usize> Default for ProfileAssembler<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// A watch that fired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchHit {
    pub id: u8,
    pub address: u16,
    pub data: Vec<u8, MAX_WATCH_SPAN>,
}

impl WatchHit {
    /// Encode as an outbound proxy message.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize, SerializeError> {
        encode_watch_hit(buf, self.id, self.address, &self.data)
    }
}

struct Watch {
    spec: WatchSpec,
    last: Option<Vec<u8, MAX_WATCH_SPAN>>,
}

impl Watch {
    /// Comparator 1 fires while any byte is at or above the threshold.
    /// Anything else fires when the bytes differ from the last evaluation.
    fn check(&mut self, bytes: &[u8]) -> bool {
        if self.spec.comparator == 1 {
            return bytes.iter().any(|&b| b >= self.spec.threshold);
        }
        let changed = self.last.as_deref().is_some_and(|last| last != bytes);
        self.last = Vec::from_slice(bytes).ok();
        changed
    }
}

/// Memory watches defined by the phone.
pub struct WatchTable {
    watches: Vec<Watch, MAX_WATCHES>,
}

impl WatchTable {
    pub const fn new() -> Self {
        Self { watches: Vec::new() }
    }

    /// Add a watch, replacing one with the same id.
    ///
    /// Returns `false` if the span is empty or too wide, or the table is
    /// full.
    pub fn set(&mut self, spec: WatchSpec) -> bool {
        if spec.span == 0 || usize::from(spec.span) > MAX_WATCH_SPAN {
            return false;
        }
        let watch = Watch { spec, last: None };
        match self.watches.iter_mut().find(|w| w.spec.id == spec.id) {
            Some(existing) => {
                *existing = watch;
                true
            }
            None => self.watches.push(watch).is_ok(),
        }
    }

    pub fn clear(&mut self) {
        self.watches.clear();
    }

    pub fn len(&self) -> usize {
        self.watches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.watches.is_empty()
    }

    pub fn get(&self, id: u8) -> Option<&WatchSpec> {
        self.watches.iter().map(|w| &w.spec).find(|s| s.id == id)
    }

    /// Check every watch fully inside `window`, which starts at `base`.
    pub fn evaluate(&mut self, base: u16, window: &[u8]) -> Vec<WatchHit, MAX_WATCHES> {
        let mut hits = Vec::new();
        for watch in self.watches.iter_mut() {
            let Some(start) = watch.spec.address.checked_sub(base) else {
                continue;
            };
            let start = usize::from(start);
            let Some(bytes) = window.get(start..start + usize::from(watch.spec.span)) else {
                continue;
            };
            if watch.check(bytes) {
                if let Ok(data) = Vec::from_slice(bytes) {
                    let _ = hits.push(WatchHit {
                        id: watch.spec.id,
                        address: watch.spec.address,
                        data,
                    });
                }
            }
        }
        hits
    }
}

impl Default for WatchTable {
    fn default() -> Self {
        Self::new()
    }
}

/// What an inbound message did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterEvent<'a> {
    Achievement(&'a [u8]),
    GameId(u32),
    WatchSet(u8),
    WatchesCleared,
    Profile(&'a Profile),
    AvatarProgress(usize),
    Avatar(Avatar<'a>),
    /// A device-originated opcode came back; nothing to do.
    Ignored,
}

/// Consumer of inbound proxy messages. `N` is the avatar buffer size.
pub struct ProxyRouter<const N: usize> {
    game_id: Option<u32>,
    watches: WatchTable,
    profile: ProfileAssembler<N>,
}

impl<const N: usize> ProxyRouter<N> {
    pub const fn new() -> Self {
        Self {
            game_id: None,
            watches: WatchTable::new(),
            profile: ProfileAssembler::new(),
        }
    }

    /// Decode and apply one message.
    pub fn handle<'a>(&'a mut self, raw: &'a [u8]) -> Result<RouterEvent<'a>, RouterError> {
        Ok(match ProxyMessage::decode(raw)? {
            ProxyMessage::AchievementUnlock(text) => RouterEvent::Achievement(text),
            ProxyMessage::GameId(id) => {
                self.game_id = Some(id);
                RouterEvent::GameId(id)
            }
            ProxyMessage::WatchSpec(spec) => {
                if !self.watches.set(spec) {
                    return Err(RouterError::WatchRejected(spec.id));
                }
                RouterEvent::WatchSet(spec.id)
            }
            ProxyMessage::WatchClear => {
                self.watches.clear();
                RouterEvent::WatchesCleared
            }
            ProxyMessage::UserProfile(header) => RouterEvent::Profile(self.profile.begin(&header)),
            ProxyMessage::AvatarChunk(chunk) => {
                RouterEvent::AvatarProgress(self.profile.push_chunk(&chunk)?)
            }
            ProxyMessage::AvatarDone => RouterEvent::Avatar(self.profile.finish()?),
            ProxyMessage::Outbound(_) => RouterEvent::Ignored,
        })
    }

    pub fn game_id(&self) -> Option<u32> {
        self.game_id
    }

    pub fn watches(&self) -> &WatchTable {
        &self.watches
    }

    pub fn watches_mut(&mut self) -> &mut WatchTable {
        &mut self.watches
    }

    pub fn profile(&self) -> &ProfileAssembler<N> {
        &self.profile
    }
}

impl<const N: usize> Default for ProxyRouter<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> ProxyConsumer for ProxyRouter<N> {
    fn on_message(&mut self, data: &[u8]) {
        match self.handle(data) {
            Ok(RouterEvent::Achievement(text)) => info!("proxy: achievement ({} bytes)", text.len()),
            Ok(RouterEvent::GameId(id)) => info!("proxy: game id {}", id),
            Ok(RouterEvent::Avatar(avatar)) => {
                info!("proxy: avatar {}x{}", avatar.profile.width, avatar.profile.height)
            }
            Ok(_) => {}
            Err(RouterError::Avatar(e)) => warn!("proxy: avatar chunk dropped: {:?}", e),
            Err(e) => debug!("proxy: {:?}", e),
        }
    }
}
