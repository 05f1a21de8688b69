use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

const LEN_BYTES: usize = 4;
const CRC_BYTES: usize = 4;

/// Encode a single record as `[len][bincode][crc32]`.
fn encode_record<T: Serialize>(writer: &mut impl Write, record: &T) -> io::Result<()> {
    let payload =
        bincode::serialize(record).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let len = u32::try_from(payload.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "record too large"))?;
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(&payload)?;
    writer.write_all(&crc32fast::hash(&payload).to_le_bytes())?;
    Ok(())
}

/// Decode the record starting at `offset`. Returns the record and the offset
/// just past it, or `None` if the bytes there are short, corrupt or undecodable.
fn decode_record<T: DeserializeOwned>(bytes: &[u8], offset: usize) -> Option<(T, usize)> {
    let len_end = offset.checked_add(LEN_BYTES)?;
    let len = u32::from_le_bytes(bytes.get(offset..len_end)?.try_into().ok()?) as usize;
    let payload_end = len_end.checked_add(len)?;
    let payload = bytes.get(len_end..payload_end)?;
    let crc_end = payload_end.checked_add(CRC_BYTES)?;
    let stored_crc = u32::from_le_bytes(bytes.get(payload_end..crc_end)?.try_into().ok()?);
    if stored_crc != crc32fast::hash(payload) {
        return None;
    }
    let record = bincode::deserialize(payload).ok()?;
    Some((record, crc_end))
}

/// Append-only journal of length-prefixed, checksummed bincode records.
///
/// Format per entry: `[u32 LE: len][bincode payload][u32 LE: crc32 of payload]`.
/// A torn or corrupt tail is cut off during [`Journal::replay`], so records
/// appended afterwards are never stranded behind garbage.
pub struct Journal {
    writer: BufWriter<File>,
    path: PathBuf,
    appends_since_compact: u64,
}

impl Journal {
    /// Open (or create) the journal at `path` for appending.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
            appends_since_compact: 0,
        })
    }

    /// Append and fsync one record. Production code batches through
    /// `append_buffered` + `flush_sync` instead.
    #[cfg(test)]
    pub fn append<T: Serialize>(&mut self, record: &T) -> io::Result<()> {
        self.append_buffered(record)?;
        self.flush_sync()
    }

    /// Buffer a record without flushing. Durable only after `flush_sync`.
    pub fn append_buffered<T: Serialize>(&mut self, record: &T) -> io::Result<()> {
        encode_record(&mut self.writer, record)?;
        self.appends_since_compact += 1;
        Ok(())
    }

    pub fn flush_sync(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn appends_since_compact(&self) -> u64 {
        self.appends_since_compact
    }

    /// Write a full replacement journal next to `path` and fsync it.
    pub fn write_compact_file<T: Serialize>(path: &Path, records: &[T]) -> io::Result<()> {
        let tmp_path = path.with_extension("journal.tmp");
        let mut writer = BufWriter::new(File::create(&tmp_path)?);
        for record in records {
            encode_record(&mut writer, record)?;
        }
        writer.flush()?;
        writer.get_ref().sync_all()
    }

    /// Rename the replacement written by `write_compact_file` over the journal
    /// and reopen it for appending.
    pub fn swap_compact_file(&mut self) -> io::Result<()> {
        let tmp_path = self.path.with_extension("journal.tmp");
        fs::rename(&tmp_path, &self.path)?;
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        self.writer = BufWriter::new(file);
        self.appends_since_compact = 0;
        Ok(())
    }

    /// Read every valid record. Stops at the first short or corrupt entry and
    /// truncates the file there.
    pub fn replay<T: DeserializeOwned>(path: &Path) -> io::Result<Vec<T>> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut records = Vec::new();
        let mut offset = 0usize;
        while let Some((record, next)) = decode_record(&bytes, offset) {
            records.push(record);
            offset = next;
        }

        if offset < bytes.len() {
            tracing::warn!(
                path = %path.display(),
                kept = records.len(),
                discarded_bytes = bytes.len() - offset,
                "journal tail is torn or corrupt; truncating"
            );
            OpenOptions::new()
                .write(true)
                .open(path)?
                .set_len(offset as u64)?;
        }

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;

    fn tmp_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("tablebook_test_journal");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = fs::remove_file(&path);
        path
    }

    fn restaurant(id: RestaurantId) -> Event {
        Event::RestaurantRegistered {
            restaurant: Restaurant {
                id,
                name: "La Mesa".into(),
                address: "Calle 1".into(),
            },
        }
    }

    fn table(id: TableId) -> Event {
        Event::TableAdded {
            table: Table {
                id,
                number: id as u32,
                capacity: 4,
                restaurant_id: 1,
            },
        }
    }

    #[test]
    fn append_and_replay() {
        let path = tmp_path("append_and_replay.journal");
        let events = vec![restaurant(1), table(1), table(2)];
        {
            let mut journal = Journal::open(&path).unwrap();
            for e in &events {
                journal.append(e).unwrap();
            }
        }
        let replayed: Vec<Event> = Journal::replay(&path).unwrap();
        assert_eq!(replayed, events);
    }

    #[test]
    fn replay_missing_file_is_empty() {
        let path = tmp_path("missing.journal");
        let replayed: Vec<Event> = Journal::replay(&path).unwrap();
        assert!(replayed.is_empty());
    }

    #[test]
    fn torn_tail_is_truncated_and_later_appends_survive() {
        let path = tmp_path("torn_tail.journal");
        {
            let mut journal = Journal::open(&path).unwrap();
            journal.append(&restaurant(1)).unwrap();
        }
        let good_len = fs::metadata(&path).unwrap().len();
        {
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(&[9u8, 0, 0, 0, 1, 2]).unwrap();
        }

        let replayed: Vec<Event> = Journal::replay(&path).unwrap();
        assert_eq!(replayed, vec![restaurant(1)]);
        assert_eq!(fs::metadata(&path).unwrap().len(), good_len);

        {
            let mut journal = Journal::open(&path).unwrap();
            journal.append(&table(5)).unwrap();
        }
        let replayed: Vec<Event> = Journal::replay(&path).unwrap();
        assert_eq!(replayed, vec![restaurant(1), table(5)]);
    }

    #[test]
    fn corrupt_crc_stops_replay() {
        let path = tmp_path("corrupt_crc.journal");
        {
            let payload = bincode::serialize(&restaurant(1)).unwrap();
            let mut f = File::create(&path).unwrap();
            f.write_all(&(payload.len() as u32).to_le_bytes()).unwrap();
            f.write_all(&payload).unwrap();
            f.write_all(&0xDEAD_BEEFu32.to_le_bytes()).unwrap();
        }
        let replayed: Vec<Event> = Journal::replay(&path).unwrap();
        assert!(replayed.is_empty());
        assert_eq!(fs::metadata(&path).unwrap().len(), 0);
    }

    #[test]
    fn compact_replaces_history() {
        let path = tmp_path("compact.journal");
        {
            let mut journal = Journal::open(&path).unwrap();
            journal.append(&restaurant(1)).unwrap();
            for id in 0..20 {
                journal.append(&Event::ReservationDeleted { id }).unwrap();
            }
            assert_eq!(journal.appends_since_compact(), 21);

            let before = fs::metadata(&path).unwrap().len();
            Journal::write_compact_file(journal.path(), &[restaurant(1)]).unwrap();
            journal.swap_compact_file().unwrap();
            assert_eq!(journal.appends_since_compact(), 0);
            assert!(fs::metadata(&path).unwrap().len() < before);

            journal.append_buffered(&table(3)).unwrap();
            journal.flush_sync().unwrap();
        }
        let replayed: Vec<Event> = Journal::replay(&path).unwrap();
        assert_eq!(replayed, vec![restaurant(1), table(3)]);
    }
}
