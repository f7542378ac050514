// src/rl/checkpoint.rs
//
// Binary Q-table persistence.
//
// Layout (little-endian, no header tag or checksum):
//   [i32 entry_count]
//   entry_count x ([i32; 12] state key, [f64; 9] action values)
//
// Entries are written in the table's bucket-then-chain order. Readers must
// not rely on that order.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{HpaError, Result};

use super::action_encoding::ACTION_COUNT;
use super::observation::STATE_DIM;
use super::q_table::{QTable, INITIAL_CAPACITY};
use super::state_key::StateKey;

const HEADER_BYTES: usize = 4;
const ENTRY_BYTES: usize = STATE_DIM * 4 + ACTION_COUNT * 8;

/// Outcome of a load. `loaded < declared` means the file was truncated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadReport {
    pub declared: usize,
    pub loaded: usize,
}

impl LoadReport {
    pub fn is_complete(&self) -> bool {
        self.loaded == self.declared
    }
}

/// Write every entry of `table` to `path`. Returns the entry count.
pub fn write_q_table(table: &QTable, path: &Path) -> Result<usize> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| HpaError::io(parent, e))?;
        }
    }

    let count = i32::try_from(table.len()).map_err(|_| HpaError::MalformedTable {
        path: path.to_path_buf(),
        message: format!("{} entries exceed the i32 entry count", table.len()),
    })?;

    let file = File::create(path).map_err(|e| HpaError::io(path, e))?;
    let mut w = BufWriter::new(file);
    write_entries(&mut w, count, table).map_err(|e| HpaError::io(path, e))?;

    info!(path = %path.display(), entries = table.len(), "q-table saved");
    Ok(table.len())
}

fn write_entries<W: Write>(w: &mut W, count: i32, table: &QTable) -> io::Result<()> {
    w.write_all(&count.to_le_bytes())?;
    for entry in table.iter() {
        for k in entry.key.components() {
            w.write_all(&k.to_le_bytes())?;
        }
        for v in &entry.values {
            w.write_all(&v.to_le_bytes())?;
        }
    }
    w.flush()
}

/// Read a Q-table from `path` into a fresh table.
///
/// A missing or unreadable header is an error. A body that ends early
/// yields the entries read so far.
pub fn read_q_table(path: &Path) -> Result<(QTable, LoadReport)> {
    let file = File::open(path).map_err(|e| HpaError::io(path, e))?;
    let file_len = file.metadata().map(|m| m.len() as usize).unwrap_or(usize::MAX);
    let mut r = BufReader::new(file);

    let mut header = [0u8; HEADER_BYTES];
    r.read_exact(&mut header)
        .map_err(|e| HpaError::MalformedTable {
            path: path.to_path_buf(),
            message: format!("missing entry count: {e}"),
        })?;
    let declared = i32::from_le_bytes(header);
    if declared < 0 {
        return Err(HpaError::MalformedTable {
            path: path.to_path_buf(),
            message: format!("negative entry count {declared}"),
        });
    }
    let declared = declared as usize;

    // Size from the declared count, bounded by what the file can hold.
    let storable = file_len.saturating_sub(HEADER_BYTES) / ENTRY_BYTES;
    let capacity = declared.min(storable).saturating_mul(2);
    let mut table = QTable::try_with_capacity(capacity)
        .unwrap_or_else(|| QTable::with_capacity(INITIAL_CAPACITY));

    let mut buf = [0u8; ENTRY_BYTES];
    let mut loaded = 0;
    while loaded < declared {
        if let Err(e) = r.read_exact(&mut buf) {
            warn!(
                path = %path.display(),
                declared,
                loaded,
                error = %e,
                "q-table file truncated; keeping partial table"
            );
            break;
        }
        let (key, values) = decode_entry(&buf);
        *table.get_or_create(&key)? = values;
        loaded += 1;
    }

    info!(path = %path.display(), declared, loaded, "q-table loaded");
    Ok((table, LoadReport { declared, loaded }))
}

fn decode_entry(buf: &[u8; ENTRY_BYTES]) -> (StateKey, [f64; ACTION_COUNT]) {
    let mut key = [0i32; STATE_DIM];
    for (i, k) in key.iter_mut().enumerate() {
        let mut b = [0u8; 4];
        b.copy_from_slice(&buf[i * 4..i * 4 + 4]);
        *k = i32::from_le_bytes(b);
    }

    let base = STATE_DIM * 4;
    let mut values = [0.0f64; ACTION_COUNT];
    for (i, v) in values.iter_mut().enumerate() {
        let mut b = [0u8; 8];
        let at = base + i * 8;
        b.copy_from_slice(&buf[at..at + 8]);
        *v = f64::from_le_bytes(b);
    }
    (StateKey(key), values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_table(n: i32) -> QTable {
        let mut t = QTable::with_capacity(16);
        for i in 0..n {
            let mut k = [0; STATE_DIM];
            k[0] = i;
            k[11] = i * 3 - 7;
            let key = StateKey(k);
            for a in 0..ACTION_COUNT {
                t.set(&key, a, i as f64 * 0.5 - a as f64 * 0.125).unwrap();
            }
        }
        t
    }

    #[test]
    fn test_file_layout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("q.dat");
        let written = write_q_table(&sample_table(3), &path).unwrap();
        assert_eq!(written, 3);

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len(), HEADER_BYTES + 3 * ENTRY_BYTES);
        assert_eq!(&bytes[..4], &3i32.to_le_bytes());
    }

    #[test]
    fn test_truncated_file_loads_partially() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("q.dat");
        let original = sample_table(10);
        write_q_table(&original, &path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let cut = HEADER_BYTES + 4 * ENTRY_BYTES + ENTRY_BYTES / 2;
        std::fs::write(&path, &bytes[..cut]).unwrap();

        let (table, report) = read_q_table(&path).unwrap();
        assert_eq!(report, LoadReport { declared: 10, loaded: 4 });
        assert!(!report.is_complete());
        assert_eq!(table.len(), 4);
        for e in table.iter() {
            assert_eq!(original.get(&e.key), Some(&e.values));
        }
    }

    #[test]
    fn test_empty_and_malformed_headers() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.dat");

        std::fs::write(&path, [1u8, 2]).unwrap();
        assert!(matches!(
            read_q_table(&path),
            Err(HpaError::MalformedTable { .. })
        ));

        std::fs::write(&path, (-5i32).to_le_bytes()).unwrap();
        assert!(matches!(
            read_q_table(&path),
            Err(HpaError::MalformedTable { .. })
        ));

        std::fs::write(&path, 0i32.to_le_bytes()).unwrap();
        let (table, report) = read_q_table(&path).unwrap();
        assert!(table.is_empty());
        assert!(report.is_complete());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let err = read_q_table(&dir.path().join("nope.dat")).unwrap_err();
        assert!(matches!(err, HpaError::Io { .. }));
    }

    #[test]
    fn test_huge_declared_count_does_not_preallocate() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("liar.dat");
        std::fs::write(&path, i32::MAX.to_le_bytes()).unwrap();
        let (table, report) = read_q_table(&path).unwrap();
        assert_eq!(report.loaded, 0);
        assert!(table.capacity() <= INITIAL_CAPACITY);
    }
}
