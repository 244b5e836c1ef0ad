//! Append-structured binary store for evicted page contents.
//!
//! One file per run. Each record is
//! `{name_length: u32, name_bytes, page_index: i32, entry_count: u32,
//! (address: u32, value: u16) * entry_count}`, all little-endian. Reads scan
//! the file sequentially and the last matching record wins, so a later
//! page-out supersedes an earlier one. Simplicity over performance: files in
//! this simulator stay small and the linear scan keeps the semantics obvious.

use core_types::PageIndex;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("backing store i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("truncated record at byte {0}")]
    Truncated(u64),
}

/// One decoded record, as laid out on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreRecord {
    pub name: String,
    pub page: i32,
    pub entries: Vec<(u32, u16)>,
}

/// Handle on the store file. Internally synchronized so the dump command may
/// race the tick loop.
pub struct BackingStore {
    path: PathBuf,
    file: Mutex<File>,
}

impl BackingStore {
    /// Creates (truncating) the store file for this run.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one record.
    pub fn write(
        &self,
        name: &str,
        page: PageIndex,
        entries: &[(u32, u16)],
    ) -> Result<(), StoreError> {
        let mut file = self.file.lock().expect("store lock");
        file.seek(SeekFrom::End(0))?;
        let mut writer = BufWriter::new(&mut *file);
        writer.write_all(&(name.len() as u32).to_le_bytes())?;
        writer.write_all(name.as_bytes())?;
        writer.write_all(&(page.0 as i32).to_le_bytes())?;
        writer.write_all(&(entries.len() as u32).to_le_bytes())?;
        for (address, value) in entries {
            writer.write_all(&address.to_le_bytes())?;
            writer.write_all(&value.to_le_bytes())?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Contents of the last record for `(name, page)`, if any.
    pub fn read(&self, name: &str, page: PageIndex) -> Result<Option<Vec<(u32, u16)>>, StoreError> {
        let mut latest = None;
        for record in self.records()? {
            if record.name == name && record.page == page.0 as i32 {
                latest = Some(record.entries);
            }
        }
        Ok(latest)
    }

    /// Sequential scan of every record in append order.
    pub fn records(&self) -> Result<Vec<StoreRecord>, StoreError> {
        let mut file = self.file.lock().expect("store lock");
        let len = file.seek(SeekFrom::End(0))?;
        file.seek(SeekFrom::Start(0))?;
        let mut reader = BufReader::new(&mut *file);

        let mut records = Vec::new();
        let mut offset = 0u64;
        while offset < len {
            let record = read_record(&mut reader, &mut offset, len)?;
            records.push(record);
        }
        Ok(records)
    }
}

fn read_record(
    reader: &mut impl Read,
    offset: &mut u64,
    len: u64,
) -> Result<StoreRecord, StoreError> {
    let start = *offset;
    let name_len = read_u32(reader, offset, len, start)? as usize;
    let mut name_bytes = vec![0u8; name_len];
    read_exact(reader, &mut name_bytes, offset, len, start)?;
    let name = String::from_utf8_lossy(&name_bytes).into_owned();
    let page = read_u32(reader, offset, len, start)? as i32;
    let entry_count = read_u32(reader, offset, len, start)? as usize;
    let mut entries = Vec::with_capacity(entry_count);
    for _ in 0..entry_count {
        let address = read_u32(reader, offset, len, start)?;
        let mut value_bytes = [0u8; 2];
        read_exact(reader, &mut value_bytes, offset, len, start)?;
        entries.push((address, u16::from_le_bytes(value_bytes)));
    }
    Ok(StoreRecord {
        name,
        page,
        entries,
    })
}

fn read_u32(
    reader: &mut impl Read,
    offset: &mut u64,
    len: u64,
    record_start: u64,
) -> Result<u32, StoreError> {
    let mut bytes = [0u8; 4];
    read_exact(reader, &mut bytes, offset, len, record_start)?;
    Ok(u32::from_le_bytes(bytes))
}

fn read_exact(
    reader: &mut impl Read,
    buf: &mut [u8],
    offset: &mut u64,
    len: u64,
    record_start: u64,
) -> Result<(), StoreError> {
    if *offset + buf.len() as u64 > len {
        return Err(StoreError::Truncated(record_start));
    }
    reader.read_exact(buf)?;
    *offset += buf.len() as u64;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store() -> (tempfile::TempDir, BackingStore) {
        let dir = tempdir().unwrap();
        let store = BackingStore::create(dir.path().join("store.bin")).unwrap();
        (dir, store)
    }

    #[test]
    fn test_write_then_read() {
        let (_dir, store) = store();
        store
            .write("p01", PageIndex(2), &[(0x200, 42), (0x202, 7)])
            .unwrap();
        let entries = store.read("p01", PageIndex(2)).unwrap().unwrap();
        assert_eq!(entries, vec![(0x200, 42), (0x202, 7)]);
    }

    #[test]
    fn test_last_write_wins() {
        let (_dir, store) = store();
        store.write("p01", PageIndex(0), &[(0, 1)]).unwrap();
        store.write("p02", PageIndex(0), &[(0, 9)]).unwrap();
        store.write("p01", PageIndex(0), &[(0, 2)]).unwrap();
        assert_eq!(
            store.read("p01", PageIndex(0)).unwrap().unwrap(),
            vec![(0, 2)]
        );
        assert_eq!(
            store.read("p02", PageIndex(0)).unwrap().unwrap(),
            vec![(0, 9)]
        );
    }

    #[test]
    fn test_missing_record() {
        let (_dir, store) = store();
        store.write("p01", PageIndex(0), &[(0, 1)]).unwrap();
        assert!(store.read("p01", PageIndex(1)).unwrap().is_none());
        assert!(store.read("p09", PageIndex(0)).unwrap().is_none());
    }

    #[test]
    fn test_records_preserve_append_order() {
        let (_dir, store) = store();
        store.write("p01", PageIndex(0), &[]).unwrap();
        store.write("p02", PageIndex(3), &[(64, 5)]).unwrap();
        let records = store.records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "p01");
        assert_eq!(records[0].entries, Vec::new());
        assert_eq!(records[1].page, 3);
    }

    #[test]
    fn test_binary_layout() {
        let (dir, store) = store();
        store.write("ab", PageIndex(1), &[(0x40, 0x0102)]).unwrap();
        drop(store);
        let bytes = std::fs::read(dir.path().join("store.bin")).unwrap();
        // name_len(4) + name(2) + page(4) + count(4) + entry(6)
        assert_eq!(bytes.len(), 20);
        assert_eq!(&bytes[0..4], &2u32.to_le_bytes());
        assert_eq!(&bytes[4..6], b"ab");
        assert_eq!(&bytes[6..10], &1i32.to_le_bytes());
        assert_eq!(&bytes[10..14], &1u32.to_le_bytes());
        assert_eq!(&bytes[14..18], &0x40u32.to_le_bytes());
        assert_eq!(&bytes[18..20], &0x0102u16.to_le_bytes());
    }
}
