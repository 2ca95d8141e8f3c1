use byteorder::{LittleEndian, ReadBytesExt};
use crc32fast::Hasher as Crc32;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use crate::SstError;

/// Largest key we will decode (64 KiB). Caps allocations on corrupt files.
pub const MAX_KEY_BYTES: usize = 64 * 1024;
/// Largest value we will decode (10 MiB).
pub const MAX_VALUE_BYTES: usize = 10 * 1024 * 1024;

/// Encodes one record into `buf` (cleared first):
/// `[crc32][key_len][key][val_len][value]`.
pub(crate) fn encode_record(buf: &mut Vec<u8>, key: &[u8], value: &[u8]) {
    buf.clear();
    buf.extend_from_slice(&[0u8; 4]); // crc, filled below
    buf.extend_from_slice(&(key.len() as u32).to_le_bytes());
    buf.extend_from_slice(key);
    buf.extend_from_slice(&(value.len() as u32).to_le_bytes());
    buf.extend_from_slice(value);

    let mut hasher = Crc32::new();
    hasher.update(&buf[4..]);
    let crc = hasher.finalize();
    buf[0..4].copy_from_slice(&crc.to_le_bytes());
}

/// On-disk size of a record frame for the given payload.
pub(crate) fn frame_len(key: &[u8], value: &[u8]) -> u64 {
    (4 + 4 + key.len() + 4 + value.len()) as u64
}

/// Decodes the record at the reader's current position.
///
/// Returns `Ok(None)` on a clean end of file (no bytes where the next
/// frame would start). Anything else that is not a whole, checksummed
/// record (a torn frame, an impossible length, a CRC mismatch) is
/// [`SstError::Corrupt`]; the caller decides whether that means
/// "truncated tail, stop scanning" or "bad read, fail the lookup".
pub(crate) fn read_record<R: Read>(r: &mut R) -> crate::Result<Option<(Vec<u8>, Vec<u8>)>> {
    let crc = match r.read_u32::<LittleEndian>() {
        Ok(v) => v,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let mut hasher = Crc32::new();

    let key_len = read_len(r, &mut hasher)? as usize;
    if key_len > MAX_KEY_BYTES {
        return Err(SstError::Corrupt(format!("key length {} out of range", key_len)));
    }
    let key = read_bytes(r, key_len, &mut hasher)?;

    let val_len = read_len(r, &mut hasher)? as usize;
    if val_len > MAX_VALUE_BYTES {
        return Err(SstError::Corrupt(format!("value length {} out of range", val_len)));
    }
    let value = read_bytes(r, val_len, &mut hasher)?;

    if hasher.finalize() != crc {
        return Err(SstError::Corrupt("crc mismatch".into()));
    }

    Ok(Some((key, value)))
}

fn read_len<R: Read>(r: &mut R, hasher: &mut Crc32) -> crate::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf).map_err(truncated)?;
    hasher.update(&buf);
    Ok(u32::from_le_bytes(buf))
}

fn read_bytes<R: Read>(r: &mut R, len: usize, hasher: &mut Crc32) -> crate::Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf).map_err(truncated)?;
    hasher.update(&buf);
    Ok(buf)
}

/// Sidecar filter path: the data path with `.bloom` appended.
pub(crate) fn sidecar_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(".bloom");
    PathBuf::from(os)
}

/// Scratch path used while a table is being written.
pub(crate) fn tmp_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(".tmp");
    PathBuf::from(os)
}

/// EOF inside a frame is corruption (a torn record), not a clean end.
fn truncated(e: io::Error) -> SstError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        SstError::Corrupt("record truncated".into())
    } else {
        SstError::Io(e)
    }
}
