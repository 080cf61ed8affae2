//! Binary snapshot format (§3.1): `b"JSM1"` magic, a u16 format version, a
//! u64 body length, a bincode-serialized body, and a trailer the reader
//! ignores (reserved for a future checksum or signature). Written with a
//! write-to-temp-then-rename so a crash mid-write never corrupts the file
//! a restart would load (§3.1 "atomic file replace").

use std::io::{Read, Write};
use std::path::Path;

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

const MAGIC: &[u8; 4] = b"JSM1";
const FORMAT_VERSION: u16 = 1;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot body could not be (de)serialized: {0}")]
    Encoding(#[from] Box<bincode::ErrorKind>),

    #[error("not a jasmin snapshot file (bad magic)")]
    BadMagic,

    #[error("unsupported snapshot format version {found} (this binary understands {supported})")]
    UnsupportedVersion { found: u16, supported: u16 },
}

/// Serialize `state` and atomically replace the file at `path`.
pub fn write_snapshot<T: Serialize>(path: &Path, state: &T) -> Result<(), SnapshotError> {
    let body = bincode::serialize(state)?;

    let mut buf = Vec::with_capacity(4 + 2 + 8 + body.len());
    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    buf.extend_from_slice(&(body.len() as u64).to_le_bytes());
    buf.extend_from_slice(&body);

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let tmp_path = dir.join(format!(
        ".{}.tmp",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("snapshot")
    ));

    {
        let mut tmp = std::fs::File::create(&tmp_path)?;
        tmp.write_all(&buf)?;
        tmp.sync_all()?;
    }
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Read and deserialize a snapshot previously written by [`write_snapshot`].
/// Any bytes after the declared body length are a trailer and are ignored,
/// so a future format can append fields existing binaries skip over.
pub fn read_snapshot<T: DeserializeOwned>(path: &Path) -> Result<T, SnapshotError> {
    let mut file = std::fs::File::open(path)?;
    let mut header = [0u8; 4 + 2 + 8];
    file.read_exact(&mut header)?;

    if &header[0..4] != MAGIC {
        return Err(SnapshotError::BadMagic);
    }
    let version = u16::from_le_bytes([header[4], header[5]]);
    if version != FORMAT_VERSION {
        return Err(SnapshotError::UnsupportedVersion {
            found: version,
            supported: FORMAT_VERSION,
        });
    }
    let body_len = u64::from_le_bytes(header[6..14].try_into().unwrap()) as usize;

    let mut body = vec![0u8; body_len];
    file.read_exact(&mut body)?;
    // Remaining bytes (if any) are the ignored trailer.

    let state = bincode::deserialize(&body)?;
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        a: u32,
        b: String,
    }

    #[test]
    fn round_trips_through_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.bin");
        let original = Sample {
            a: 7,
            b: "hello".to_string(),
        };

        write_snapshot(&path, &original).unwrap();
        let restored: Sample = read_snapshot(&path).unwrap();
        assert_eq!(original, restored);
    }

    #[test]
    fn rejects_bad_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.bin");
        std::fs::write(&path, b"not a snapshot at all, just junk bytes").unwrap();

        let err = read_snapshot::<Sample>(&path).unwrap_err();
        assert!(matches!(err, SnapshotError::BadMagic));
    }

    #[test]
    fn ignores_trailing_bytes_after_declared_body() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.bin");
        write_snapshot(&path, &Sample { a: 1, b: "x".to_string() }).unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        bytes.extend_from_slice(b"trailer-reserved-for-future-use");
        std::fs::write(&path, &bytes).unwrap();

        let restored: Sample = read_snapshot(&path).unwrap();
        assert_eq!(restored, Sample { a: 1, b: "x".to_string() });
    }

    #[test]
    fn a_fresh_write_fully_replaces_a_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.bin");
        write_snapshot(&path, &Sample { a: 1, b: "old".to_string() }).unwrap();
        write_snapshot(&path, &Sample { a: 2, b: "new".to_string() }).unwrap();

        let restored: Sample = read_snapshot(&path).unwrap();
        assert_eq!(restored, Sample { a: 2, b: "new".to_string() });
    }
}
