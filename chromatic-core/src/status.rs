//! Status and ingest characteristics.
//!
//! Status reads return `ADDR:<identity>\n` followed by the exported codes,
//! NUL-terminated when room remains. Ingest writes feed the code importer.

use crate::cheats::{CheatEngine, CheatSink, CheatStore};
use crate::config::WRITE_CAP;

const ADDR_PREFIX: &[u8] = b"ADDR:";

/// Fill `out` with the status payload.
///
/// Returns the number of bytes to send. Any non-empty buffer yields at
/// least one byte.
pub fn fill_status<S: CheatStore, P: CheatSink>(
    identity: &str,
    engine: &mut CheatEngine<S, P>,
    out: &mut [u8],
) -> usize {
    if out.is_empty() {
        return 0;
    }

    let mut used = 0;
    let mut header_fits = true;
    for part in [ADDR_PREFIX, identity.as_bytes(), b"\n"] {
        let take = part.len().min(out.len() - used);
        out[used..used + take].copy_from_slice(&part[..take]);
        used += take;
        header_fits &= take == part.len();
    }
    if header_fits {
        used += engine.export_slots(&mut out[used..]);
    }
    if used < out.len() {
        out[used] = 0;
        used += 1;
    }
    used
}

/// Feed one ingest write to the importer, truncated to [`WRITE_CAP`].
///
/// Returns how many codes were added or removed.
pub fn ingest<S: CheatStore, P: CheatSink>(engine: &mut CheatEngine<S, P>, data: &[u8]) -> usize {
    let data = &data[..data.len().min(WRITE_CAP)];
    let applied = engine.import_codes(data);
    debug!("status: ingest of {} bytes applied {}", data.len(), applied);
    applied
}
