//! Application messages carried over the proxy characteristic.
//!
//! Every message starts with a one-byte opcode. Multi-byte integers are
//! big-endian.
//!
//! | Opcode | Direction      | Body                                              |
//! |--------|----------------|---------------------------------------------------|
//! | `0x01` | device → phone | game info: title bytes, flag                      |
//! | `0x02` | device → phone | memory chunk: addr:u16, len:u8, data              |
//! | `0x03` | phone → device | achievement unlock: text                          |
//! | `0x10` | phone → device | watch spec: id, addr:u16, span, cmp, [threshold]  |
//! | `0x11` | phone → device | watch clear                                       |
//! | `0x12` | phone → device | game id: up to 4 bytes                            |
//! | `0x20` | device → phone | watch hit: id, addr:u16, len:u8, data             |
//! | `0x30` | phone → device | user profile: points:u32, scale, w, h, name_len, name |
//! | `0x31` | phone → device | avatar chunk: chunk_id:u16, len:u8, data          |
//! | `0x32` | phone → device | avatar done                                       |

/// Largest proxy message in either direction.
pub const MAX_PROXY_MESSAGE: usize = 256;

/// Largest memory chunk body the phone accepts.
pub const MAX_MEM_CHUNK: usize = 180;

/// Payload pushed when the phone subscribes to the proxy characteristic.
pub const PROXY_PING: &[u8] = b"RA_PROXY_PING";

/// Proxy opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ProxyOpcode {
    GameInfo = 0x01,
    MemChunk = 0x02,
    AchievementUnlock = 0x03,
    WatchSpec = 0x10,
    WatchClear = 0x11,
    GameId = 0x12,
    WatchHit = 0x20,
    UserProfile = 0x30,
    AvatarChunk = 0x31,
    AvatarDone = 0x32,
}

impl ProxyOpcode {
    #[must_use]
    pub const fn from_u8(raw: u8) -> Option<Self> {
        Some(match raw {
            0x01 => Self::GameInfo,
            0x02 => Self::MemChunk,
            0x03 => Self::AchievementUnlock,
            0x10 => Self::WatchSpec,
            0x11 => Self::WatchClear,
            0x12 => Self::GameId,
            0x20 => Self::WatchHit,
            0x30 => Self::UserProfile,
            0x31 => Self::AvatarChunk,
            0x32 => Self::AvatarDone,
            _ => return None,
        })
    }
}

/// Error type for proxy message decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    /// Message has no opcode byte.
    Empty,
    /// Opcode is not one this device handles.
    UnknownOpcode(u8),
    /// Body is shorter than the opcode requires.
    Truncated(ProxyOpcode),
}

impl core::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Empty => write!(f, "empty message"),
            Self::UnknownOpcode(op) => write!(f, "unknown opcode {:#04x}", op),
            Self::Truncated(op) => write!(f, "truncated {:?} message", op),
        }
    }
}

/// A memory watch definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WatchSpec {
    pub id: u8,
    pub address: u16,
    pub span: u8,
    pub comparator: u8,
    pub threshold: u8,
}

/// User profile header preceding an avatar transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ProfileHeader<'a> {
    pub points: u32,
    pub scale: u8,
    pub width: u8,
    pub height: u8,
    /// Raw name bytes. Empty unless all `name_len` bytes arrived.
    pub name: &'a [u8],
}

/// One avatar chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AvatarChunk<'a> {
    pub chunk_id: u16,
    pub data: &'a [u8],
}

/// A decoded inbound proxy message, borrowing from the receive buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProxyMessage<'a> {
    AchievementUnlock(&'a [u8]),
    WatchSpec(WatchSpec),
    WatchClear,
    GameId(u32),
    UserProfile(ProfileHeader<'a>),
    AvatarChunk(AvatarChunk<'a>),
    AvatarDone,
    /// A device-originated opcode echoed back; carried for diagnostics.
    Outbound(ProxyOpcode),
}

impl<'a> ProxyMessage<'a> {
    /// Decode one message.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] for empty, unknown or truncated messages.
    pub fn decode(raw: &'a [u8]) -> Result<Self, DecodeError> {
        let (&op, body) = raw.split_first().ok_or(DecodeError::Empty)?;
        let opcode = ProxyOpcode::from_u8(op).ok_or(DecodeError::UnknownOpcode(op))?;

        Ok(match opcode {
            ProxyOpcode::AchievementUnlock => Self::AchievementUnlock(body),
            ProxyOpcode::WatchSpec => {
                if body.len() < 5 {
                    return Err(DecodeError::Truncated(opcode));
                }
                Self::WatchSpec(WatchSpec {
                    id: body[0],
                    address: u16::from_be_bytes([body[1], body[2]]),
                    span: body[3],
                    comparator: body[4],
                    threshold: body.get(5).copied().unwrap_or(0),
                })
            }
            ProxyOpcode::WatchClear => Self::WatchClear,
            ProxyOpcode::GameId => Self::GameId(
                body.iter()
                    .take(4)
                    .fold(0u32, |acc, &b| (acc << 8) | u32::from(b)),
            ),
            ProxyOpcode::UserProfile => {
                if body.len() < 8 {
                    return Err(DecodeError::Truncated(opcode));
                }
                let name_len = body[7] as usize;
                let name = body.get(8..8 + name_len).unwrap_or(&[]);
                Self::UserProfile(ProfileHeader {
                    points: u32::from_be_bytes([body[0], body[1], body[2], body[3]]),
                    scale: body[4],
                    width: body[5],
                    height: body[6],
                    name,
                })
            }
            ProxyOpcode::AvatarChunk => {
                if body.len() < 3 {
                    return Err(DecodeError::Truncated(opcode));
                }
                let data = &body[3..];
                let len = (body[2] as usize).min(data.len());
                Self::AvatarChunk(AvatarChunk {
                    chunk_id: u16::from_be_bytes([body[0], body[1]]),
                    data: &data[..len],
                })
            }
            ProxyOpcode::AvatarDone => Self::AvatarDone,
            ProxyOpcode::GameInfo | ProxyOpcode::MemChunk | ProxyOpcode::WatchHit => {
                Self::Outbound(opcode)
            }
        })
    }
}

/// Write a game info announcement. Returns the message length.
///
/// # Errors
///
/// Returns [`crate::frame::SerializeError::BufferTooSmall`] if `buf` is too short.
pub fn encode_game_info(
    buf: &mut [u8],
    title: &[u8],
    flags: u8,
) -> Result<usize, crate::frame::SerializeError> {
    let len = 2 + title.len();
    if buf.len() < len || len > MAX_PROXY_MESSAGE {
        return Err(crate::frame::SerializeError::BufferTooSmall);
    }
    buf[0] = ProxyOpcode::GameInfo as u8;
    buf[1..1 + title.len()].copy_from_slice(title);
    buf[len - 1] = flags;
    Ok(len)
}

/// Write a memory chunk push. Returns the message length.
///
/// # Errors
///
/// - [`crate::frame::SerializeError::PayloadTooLarge`] if `data` exceeds [`MAX_MEM_CHUNK`].
/// - [`crate::frame::SerializeError::BufferTooSmall`] if `buf` is too short.
pub fn encode_mem_chunk(
    buf: &mut [u8],
    address: u16,
    data: &[u8],
) -> Result<usize, crate::frame::SerializeError> {
    if data.len() > MAX_MEM_CHUNK {
        return Err(crate::frame::SerializeError::PayloadTooLarge);
    }
    encode_addressed(buf, ProxyOpcode::MemChunk, None, address, data)
}

/// Write a watch hit notice. Returns the message length.
///
/// # Errors
///
/// Same as [`encode_mem_chunk`].
pub fn encode_watch_hit(
    buf: &mut [u8],
    id: u8,
    address: u16,
    data: &[u8],
) -> Result<usize, crate::frame::SerializeError> {
    if data.len() > MAX_MEM_CHUNK {
        return Err(crate::frame::SerializeError::PayloadTooLarge);
    }
    encode_addressed(buf, ProxyOpcode::WatchHit, Some(id), address, data)
}

fn encode_addressed(
    buf: &mut [u8],
    opcode: ProxyOpcode,
    id: Option<u8>,
    address: u16,
    data: &[u8],
) -> Result<usize, crate::frame::SerializeError> {
    let head = if id.is_some() { 5 } else { 4 };
    let len = head + data.len();
    if buf.len() < len {
        return Err(crate::frame::SerializeError::BufferTooSmall);
    }
    let mut pos = 0;
    buf[pos] = opcode as u8;
    pos += 1;
    if let Some(id) = id {
        buf[pos] = id;
        pos += 1;
    }
    buf[pos..pos + 2].copy_from_slice(&address.to_be_bytes());
    buf[pos + 2] = data.len() as u8;
    buf[head..len].copy_from_slice(data);
    Ok(len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::SerializeError;

    #[test]
    fn test_decode_watch_spec_default_threshold() {
        let msg = ProxyMessage::decode(&[0x10, 3, 0xC1, 0x00, 4, 1]).unwrap();
        assert_eq!(
            msg,
            ProxyMessage::WatchSpec(WatchSpec {
                id: 3,
                address: 0xC100,
                span: 4,
                comparator: 1,
                threshold: 0,
            })
        );
        assert_eq!(
            ProxyMessage::decode(&[0x10, 3, 0xC1]),
            Err(DecodeError::Truncated(ProxyOpcode::WatchSpec))
        );
    }

    #[test]
    fn test_decode_game_id_short() {
        assert_eq!(
            ProxyMessage::decode(&[0x12, 0x01, 0x02]),
            Ok(ProxyMessage::GameId(0x0102))
        );
        assert_eq!(
            ProxyMessage::decode(&[0x12, 0xDE, 0xAD, 0xBE, 0xEF, 0x99]),
            Ok(ProxyMessage::GameId(0xDEADBEEF))
        );
    }

    #[test]
    fn test_decode_profile() {
        let raw = [0x30, 0, 0, 0x01, 0x00, 40, 2, 2, 3, b'B', b'o', b'b'];
        let Ok(ProxyMessage::UserProfile(header)) = ProxyMessage::decode(&raw) else {
            panic!("expected profile");
        };
        assert_eq!(header.points, 256);
        assert_eq!(header.scale, 40);
        assert_eq!((header.width, header.height), (2, 2));
        assert_eq!(header.name, b"Bob");

        // Missing name bytes
        let raw = [0x30, 0, 0, 0, 0, 50, 1, 1, 5];
        let Ok(ProxyMessage::UserProfile(header)) = ProxyMessage::decode(&raw) else {
            panic!("expected profile");
        };
        assert!(header.name.is_empty());

        // Partial name is not kept
        let raw = [0x30, 0, 0, 0, 0, 50, 1, 1, 10, b'A', b'n', b'n'];
        let Ok(ProxyMessage::UserProfile(header)) = ProxyMessage::decode(&raw) else {
            panic!("expected profile");
        };
        assert!(header.name.is_empty());
    }

    #[test]
    fn test_decode_avatar_chunk_clamps_length() {
        let raw = [0x31, 0x00, 0x02, 10, 0xAA, 0xBB];
        assert_eq!(
            ProxyMessage::decode(&raw),
            Ok(ProxyMessage::AvatarChunk(AvatarChunk {
                chunk_id: 2,
                data: &[0xAA, 0xBB],
            }))
        );
    }

    #[test]
    fn test_decode_unknown() {
        assert_eq!(ProxyMessage::decode(&[]), Err(DecodeError::Empty));
        assert_eq!(
            ProxyMessage::decode(&[0x7F]),
            Err(DecodeError::UnknownOpcode(0x7F))
        );
    }

    #[test]
    fn test_encode_mem_chunk() {
        let mut buf = [0u8; MAX_PROXY_MESSAGE];
        let len = encode_mem_chunk(&mut buf, 0xC000, &[1, 2, 3]).unwrap();
        assert_eq!(&buf[..len], &[0x02, 0xC0, 0x00, 3, 1, 2, 3]);

        let big = [0u8; MAX_MEM_CHUNK + 1];
        assert_eq!(
            encode_mem_chunk(&mut buf, 0, &big),
            Err(SerializeError::PayloadTooLarge)
        );
    }

    #[test]
    fn test_encode_watch_hit_and_game_info() {
        let mut buf = [0u8; 32];
        let len = encode_watch_hit(&mut buf, 7, 0xC123, &[0x42]).unwrap();
        assert_eq!(&buf[..len], &[0x20, 7, 0xC1, 0x23, 1, 0x42]);

        let len = encode_game_info(&mut buf, b"TETRIS", 0x01).unwrap();
        assert_eq!(&buf[..len], b"\x01TETRIS\x01");
    }
}
