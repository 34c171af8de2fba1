use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::model::Event;

/// Largest payload a record may carry. A length prefix above this is
/// treated as corruption, not as a request to allocate.
pub const MAX_RECORD_LEN: usize = 1 << 20;

const HEADER_LEN: usize = 4;
const TRAILER_LEN: usize = 4;

/// Frame one event as `[u32 len][bincode payload][u32 crc32 of payload]`.
fn frame(event: &Event) -> io::Result<Vec<u8>> {
    let payload =
        bincode::serialize(event).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    if payload.len() > MAX_RECORD_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("journal record of {} bytes exceeds {MAX_RECORD_LEN}", payload.len()),
        ));
    }
    let mut record = Vec::with_capacity(HEADER_LEN + payload.len() + TRAILER_LEN);
    record.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    record.extend_from_slice(&payload);
    record.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    Ok(record)
}

/// Decode the record at the head of `buf`. `None` when the bytes do not
/// hold a whole, intact record.
fn unframe(buf: &[u8]) -> Option<(Event, usize)> {
    let len = u32::from_le_bytes(buf.get(..HEADER_LEN)?.try_into().ok()?) as usize;
    if len > MAX_RECORD_LEN {
        return None;
    }
    let payload = buf.get(HEADER_LEN..HEADER_LEN + len)?;
    let end = HEADER_LEN + len + TRAILER_LEN;
    let crc = u32::from_le_bytes(buf.get(HEADER_LEN + len..end)?.try_into().ok()?);
    if crc != crc32fast::hash(payload) {
        return None;
    }
    let event = bincode::deserialize(payload).ok()?;
    Some((event, end))
}

/// What a journal file holds: the intact records, where they end, and how
/// many trailing bytes follow that are not a record.
#[derive(Debug, Default, PartialEq)]
pub struct Replay {
    pub events: Vec<Event>,
    pub valid_len: u64,
    pub torn_len: u64,
}

/// Append-only company journal.
///
/// Records are only acknowledged after `flush_sync`. A flush that fails
/// rolls the file back to the last synced length, so a half-written record
/// never sits in front of later ones.
pub struct Wal {
    writer: BufWriter<File>,
    path: PathBuf,
    /// File length covered by fsynced records.
    synced_len: u64,
    pending_len: u64,
    pending_records: u64,
    appends_since_compact: u64,
}

impl Wal {
    /// Open an existing journal, cutting off any torn tail left by a crash.
    /// Returns the writer and the intact records.
    pub fn recover(path: &Path) -> io::Result<(Self, Vec<Event>)> {
        let replay = Self::replay(path)?;
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        if replay.torn_len > 0 {
            warn!(
                "{}: dropping {} bytes after the last intact record",
                path.display(),
                replay.torn_len
            );
            file.set_len(replay.valid_len)?;
            file.sync_all()?;
        }
        Ok((Self::from_file(file, path, replay.valid_len), replay.events))
    }

    /// Start a brand-new journal. Fails with `AlreadyExists` if the file is there.
    pub fn create_new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create_new(true).append(true).open(path)?;
        Ok(Self::from_file(file, path, 0))
    }

    fn from_file(file: File, path: &Path, synced_len: u64) -> Self {
        Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
            synced_len,
            pending_len: 0,
            pending_records: 0,
            appends_since_compact: 0,
        }
    }

    /// Append one record and make it durable.
    pub fn append(&mut self, event: &Event) -> io::Result<()> {
        self.append_buffered(event)?;
        self.flush_sync()
    }

    /// Stage a record. Nothing is durable until `flush_sync` succeeds.
    pub fn append_buffered(&mut self, event: &Event) -> io::Result<()> {
        let record = frame(event)?;
        self.writer.write_all(&record)?;
        self.pending_len += record.len() as u64;
        self.pending_records += 1;
        Ok(())
    }

    /// Write out and fsync everything staged. On failure the staged records
    /// are discarded and the file is cut back to its last synced length.
    pub fn flush_sync(&mut self) -> io::Result<()> {
        let result = self
            .writer
            .flush()
            .and_then(|()| self.writer.get_ref().sync_all());
        match result {
            Ok(()) => {
                self.synced_len += self.pending_len;
                self.appends_since_compact += self.pending_records;
                self.pending_len = 0;
                self.pending_records = 0;
                Ok(())
            }
            Err(e) => {
                self.discard_pending();
                Err(e)
            }
        }
    }

    /// Drop everything staged since the last sync.
    pub fn discard_pending(&mut self) {
        if let Err(e) = self.rollback() {
            warn!("{}: discarding staged records failed: {e}", self.path.display());
        }
    }

    fn rollback(&mut self) -> io::Result<()> {
        self.pending_len = 0;
        self.pending_records = 0;
        let file = OpenOptions::new().append(true).open(&self.path)?;
        file.set_len(self.synced_len)?;
        // into_parts hands back the unflushed buffer instead of writing it.
        let stale = std::mem::replace(&mut self.writer, BufWriter::new(file));
        let _ = stale.into_parts();
        Ok(())
    }

    fn compact_path(&self) -> PathBuf {
        self.path.with_extension("wal.tmp")
    }

    /// Write `events` as a complete journal to the sibling temp file and
    /// fsync it. Returns the byte length written.
    pub fn write_compact_file(&self, events: &[Event]) -> io::Result<u64> {
        let mut writer = BufWriter::new(File::create(self.compact_path())?);
        let mut len = 0u64;
        for event in events {
            let record = frame(event)?;
            writer.write_all(&record)?;
            len += record.len() as u64;
        }
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(len)
    }

    /// Move the temp file over the journal and continue appending to it.
    pub fn swap_compact_file(&mut self, compacted_len: u64) -> io::Result<()> {
        fs::rename(self.compact_path(), &self.path)?;
        if let Some(dir) = self.path.parent()
            && let Ok(dir) = File::open(dir)
        {
            // Persist the rename itself.
            dir.sync_all()?;
        }
        let file = OpenOptions::new().append(true).open(&self.path)?;
        self.writer = BufWriter::new(file);
        self.synced_len = compacted_len;
        self.appends_since_compact = 0;
        Ok(())
    }

    #[cfg(test)]
    pub fn compact(&mut self, events: &[Event]) -> io::Result<()> {
        let len = self.write_compact_file(events)?;
        self.swap_compact_file(len)
    }

    pub fn appends_since_compact(&self) -> u64 {
        self.appends_since_compact
    }

    /// Decode every intact record from the start of the file. A missing file
    /// is an empty journal.
    pub fn replay(path: &Path) -> io::Result<Replay> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Replay::default()),
            Err(e) => return Err(e),
        };
        let mut events = Vec::new();
        let mut offset = 0;
        while let Some((event, used)) = unframe(&bytes[offset..]) {
            events.push(event);
            offset += used;
        }
        Ok(Replay {
            events,
            valid_len: offset as u64,
            torn_len: (bytes.len() - offset) as u64,
        })
    }
}
