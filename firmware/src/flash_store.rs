//! Cheat records kept in the last flash sectors.
//!
//! # Layout
//!
//! The store owns [`STORE_SECTORS`] sectors at the top of flash. Each sector
//! holds one entry:
//!
//! ```text
//! magic:u32 LE | key[16] (NUL padded) | record[132] | 0xFF…
//! ```
//!
//! A key is rewritten in place. A new key takes the first erased sector,
//! or evicts sectors round-robin once every sector is in use.

use chromatic_core::cheats::{CheatStore, MAX_KEY_LEN};
use chromatic_proto::record::RECORD_SIZE;
use embassy_rp::flash::{Blocking, Error, Flash, ERASE_SIZE};
use embassy_rp::peripherals::FLASH;

/// Total flash on the board.
pub const FLASH_SIZE: usize = 2 * 1024 * 1024;

/// Sectors reserved for cheat records. The linker script must keep them out
/// of the program image.
pub const STORE_SECTORS: usize = 8;

const STORE_OFFSET: u32 = (FLASH_SIZE - STORE_SECTORS * ERASE_SIZE) as u32;
const MAGIC: u32 = 0x4348_5231;
const KEY_OFFSET: usize = 4;
const RECORD_OFFSET: usize = KEY_OFFSET + MAX_KEY_LEN;
const ENTRY_SIZE: usize = RECORD_OFFSET + RECORD_SIZE;

/// Flash-backed [`CheatStore`].
pub struct FlashCheatStore<'d> {
    flash: Flash<'d, FLASH, Blocking, FLASH_SIZE>,
    next_victim: usize,
}

impl<'d> FlashCheatStore<'d> {
    pub fn new(flash: Flash<'d, FLASH, Blocking, FLASH_SIZE>) -> Self {
        Self {
            flash,
            next_victim: 0,
        }
    }

    #[inline]
    const fn sector_offset(sector: usize) -> u32 {
        STORE_OFFSET + (sector * ERASE_SIZE) as u32
    }

    fn read_header(&mut self, sector: usize) -> Result<[u8; RECORD_OFFSET], Error> {
        let mut header = [0u8; RECORD_OFFSET];
        self.flash
            .blocking_read(Self::sector_offset(sector), &mut header)?;
        Ok(header)
    }

    /// Sector holding `key`, and the first erased sector seen.
    fn find(&mut self, key: &[u8; MAX_KEY_LEN]) -> Result<(Option<usize>, Option<usize>), Error> {
        let mut empty = None;
        for sector in 0..STORE_SECTORS {
            let header = self.read_header(sector)?;
            let magic = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
            if magic != MAGIC {
                empty = empty.or(Some(sector));
                continue;
            }
            if &header[KEY_OFFSET..RECORD_OFFSET] == key {
                return Ok((Some(sector), empty));
            }
        }
        Ok((None, empty))
    }

    fn encode_key(key: &str) -> [u8; MAX_KEY_LEN] {
        let mut out = [0u8; MAX_KEY_LEN];
        let len = key.len().min(MAX_KEY_LEN);
        out[..len].copy_from_slice(&key.as_bytes()[..len]);
        out
    }
}

impl CheatStore for FlashCheatStore<'_> {
    type Error = Error;

    fn load(&mut self, key: &str, buf: &mut [u8; RECORD_SIZE]) -> Result<bool, Error> {
        let (found, _) = self.find(&Self::encode_key(key))?;
        let Some(sector) = found else {
            return Ok(false);
        };
        self.flash
            .blocking_read(Self::sector_offset(sector) + RECORD_OFFSET as u32, buf)?;
        Ok(true)
    }

    fn save(&mut self, key: &str, record: &[u8; RECORD_SIZE]) -> Result<(), Error> {
        let key = Self::encode_key(key);
        let sector = match self.find(&key)? {
            (Some(sector), _) | (None, Some(sector)) => sector,
            (None, None) => {
                let victim = self.next_victim;
                self.next_victim = (victim + 1) % STORE_SECTORS;
                defmt::info!("flash: evicting sector {}", victim);
                victim
            }
        };

        let mut entry = [0xFFu8; ENTRY_SIZE];
        entry[..KEY_OFFSET].copy_from_slice(&MAGIC.to_le_bytes());
        entry[KEY_OFFSET..RECORD_OFFSET].copy_from_slice(&key);
        entry[RECORD_OFFSET..].copy_from_slice(record);

        let offset = Self::sector_offset(sector);
        self.flash
            .blocking_erase(offset, offset + ERASE_SIZE as u32)?;
        self.flash.blocking_write(offset, &entry)?;
        Ok(())
    }
}
