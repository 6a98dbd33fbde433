use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::state::Mutation;

/// Flush/sync strategy for the WAL.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SyncMode {
    /// `fsync` after every write (safest, highest latency).
    EveryWrite,
    /// Rely on OS page-cache buffering (fastest, least durable).
    #[default]
    OsDefault,
}

/// Header size: 4 bytes length + 4 bytes CRC.
const HEADER_SIZE: usize = 8;

/// Entries recovered from a log segment.
#[derive(Debug, Default)]
pub struct Recovery {
    /// Valid mutations in log order.
    pub mutations: Vec<Mutation>,
    /// Complete entries dropped because their checksum or payload was bad.
    pub skipped: usize,
    /// Whether the log ended in a partially written entry.
    pub torn_tail: bool,
}

struct WalWriter {
    writer: BufWriter<File>,
    /// Current write offset in the segment file.
    offset: u64,
    /// Bytes of the next frame to write before failing it.
    #[cfg(test)]
    fail_next_after: Option<usize>,
}

impl WalWriter {
    fn new(file: File, offset: u64) -> Self {
        Self {
            writer: BufWriter::new(file),
            offset,
            #[cfg(test)]
            fail_next_after: None,
        }
    }

    fn write_frame(&mut self, frame: &[u8], sync_mode: SyncMode) -> io::Result<()> {
        #[cfg(test)]
        if let Some(written) = self.fail_next_after.take() {
            self.writer.write_all(&frame[..written.min(frame.len())])?;
            self.writer.flush()?;
            return Err(io::Error::other("injected write failure"));
        }

        self.writer.write_all(frame)?;
        self.writer.flush()?;
        if sync_mode == SyncMode::EveryWrite {
            self.writer.get_ref().sync_all()?;
        }
        Ok(())
    }

    /// Cut the segment back to `offset`, dropping whatever part of a failed
    /// frame reached the file or still sits in the buffer.
    fn truncate_to(&mut self, path: &Path, offset: u64) -> io::Result<()> {
        let reopened = OpenOptions::new().read(true).append(true).open(path)?;
        let failed = std::mem::replace(&mut self.writer, BufWriter::new(reopened));
        // Discard the buffer instead of letting drop flush it.
        let (file, _unflushed) = failed.into_parts();
        file.set_len(offset)?;
        self.offset = offset;
        Ok(())
    }
}

/// Crash-recoverable log of record mutations.
///
/// On-disk format, one frame per mutation:
/// ```text
/// [4 bytes: payload length (little-endian u32)]
/// [4 bytes: CRC32 of payload (little-endian u32)]
/// [N bytes: payload (bincode-serialized Mutation)]
/// ```
pub struct WriteAheadLog {
    path: PathBuf,
    writer: Mutex<WalWriter>,
    sync_mode: SyncMode,
}

impl WriteAheadLog {
    /// Open (or create) a log segment at the given path.
    pub fn open(path: &Path, sync_mode: SyncMode) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;

        let offset = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(WalWriter::new(file, offset)),
            sync_mode,
        })
    }

    /// Append one mutation. Returns the byte offset of its frame.
    ///
    /// A failed write is rolled back to the previous frame boundary, so the
    /// next append never lands behind a partial frame.
    pub fn append(&self, mutation: &Mutation) -> StoreResult<u64> {
        let frame = encode_frame(mutation)?;

        let mut w = self.lock()?;
        let entry_offset = w.offset;
        if let Err(e) = w.write_frame(&frame, self.sync_mode) {
            warn!(offset = entry_offset, error = %e, "WAL append failed; rolling back");
            if let Err(rollback) = w.truncate_to(&self.path, entry_offset) {
                return Err(StoreError::Corrupt(format!(
                    "WAL append failed ({e}) and rollback to {entry_offset} failed: {rollback}"
                )));
            }
            return Err(e.into());
        }
        w.offset += frame.len() as u64;

        debug!(offset = entry_offset, len = frame.len(), "WAL append");
        Ok(entry_offset)
    }

    /// Read every valid mutation from the segment, front to back.
    ///
    /// A frame whose checksum or payload is bad is skipped. A frame that runs
    /// past the end of the file is a torn write and ends recovery.
    pub fn recover(&self) -> StoreResult<Recovery> {
        let mut file = BufReader::new(File::open(&self.path)?);
        let file_len = file.get_ref().metadata()?.len();
        let mut recovery = Recovery::default();
        let mut offset: u64 = 0;

        while offset < file_len {
            if offset + HEADER_SIZE as u64 > file_len {
                recovery.torn_tail = true;
                break;
            }
            file.seek(SeekFrom::Start(offset))?;

            let mut header = [0u8; HEADER_SIZE];
            match file.read_exact(&mut header) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    recovery.torn_tail = true;
                    break;
                }
                Err(e) => return Err(e.into()),
            }

            let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
            let expected_crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

            if length == 0 || offset + HEADER_SIZE as u64 + u64::from(length) > file_len {
                warn!(offset, length, file_len, "torn WAL entry; stopping recovery");
                recovery.torn_tail = true;
                break;
            }

            let mut payload = vec![0u8; length as usize];
            file.read_exact(&mut payload)?;
            offset += HEADER_SIZE as u64 + u64::from(length);

            let actual_crc = crc32fast::hash(&payload);
            if actual_crc != expected_crc {
                warn!(
                    offset,
                    expected = expected_crc,
                    actual = actual_crc,
                    "CRC mismatch; skipping WAL entry"
                );
                recovery.skipped += 1;
                continue;
            }

            match bincode::deserialize::<Mutation>(&payload) {
                Ok(mutation) => recovery.mutations.push(mutation),
                Err(e) => {
                    warn!(offset, error = %e, "undecodable WAL entry; skipping");
                    recovery.skipped += 1;
                }
            }
        }

        debug!(
            recovered = recovery.mutations.len(),
            skipped = recovery.skipped,
            torn_tail = recovery.torn_tail,
            "WAL recovery complete"
        );
        Ok(recovery)
    }

    /// Atomically replace the whole segment with `mutations`.
    ///
    /// The new segment is written to a temporary file next to the log and
    /// renamed over it, so a crash leaves either the old or the new log.
    pub fn rewrite(&self, mutations: &[Mutation]) -> StoreResult<()> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let mut w = self.lock()?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        let mut written = 0u64;
        {
            let mut out = BufWriter::new(tmp.as_file_mut());
            for mutation in mutations {
                let frame = encode_frame(mutation)?;
                out.write_all(&frame)?;
                written += frame.len() as u64;
            }
            out.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| StoreError::Io(e.error))?;

        let file = OpenOptions::new().read(true).append(true).open(&self.path)?;
        w.writer = BufWriter::new(file);
        w.offset = written;

        debug!(entries = mutations.len(), bytes = written, "WAL rewritten");
        Ok(())
    }

    /// Current write offset.
    pub fn offset(&self) -> u64 {
        self.lock().map(|w| w.offset).unwrap_or(0)
    }

    /// Path to the segment file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, WalWriter>> {
        self.writer
            .lock()
            .map_err(|e| StoreError::Unavailable(format!("WAL mutex poisoned: {e}")))
    }
}

fn encode_frame(mutation: &Mutation) -> StoreResult<Vec<u8>> {
    let payload =
        bincode::serialize(mutation).map_err(|e| StoreError::Serialization(e.to_string()))?;
    let length = u32::try_from(payload.len())
        .map_err(|_| StoreError::Serialization("WAL entry exceeds 4 GiB".into()))?;
    let crc = crc32fast::hash(&payload);

    let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
    frame.extend_from_slice(&length.to_le_bytes());
    frame.extend_from_slice(&crc.to_le_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Versioned;
    use canopy_types::{Comment, CommentId};

    fn make_entry(text: &str) -> Mutation {
        Mutation::PutComment(Versioned::initial(Comment::new(text, None)))
    }

    #[test]
    fn append_and_recover_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let wal = WriteAheadLog::open(&dir.path().join("records.wal"), SyncMode::default()).unwrap();

        let entries = vec![
            make_entry("one"),
            make_entry("two"),
            Mutation::DeleteComment(CommentId::new()),
        ];
        for e in &entries {
            wal.append(e).unwrap();
        }

        let recovery = wal.recover().unwrap();
        assert_eq!(recovery.mutations, entries);
        assert_eq!(recovery.skipped, 0);
        assert!(!recovery.torn_tail);
    }

    #[test]
    fn recover_empty_log() {
        let dir = tempfile::tempdir().unwrap();
        let wal = WriteAheadLog::open(&dir.path().join("empty.wal"), SyncMode::default()).unwrap();
        let recovery = wal.recover().unwrap();
        assert!(recovery.mutations.is_empty());
        assert!(!recovery.torn_tail);
    }

    #[test]
    fn crc_mismatch_skips_only_the_damaged_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrupt.wal");
        let wal = WriteAheadLog::open(&path, SyncMode::default()).unwrap();
        let second = make_entry("second");
        wal.append(&make_entry("first")).unwrap();
        wal.append(&second).unwrap();
        drop(wal);

        {
            let mut file = OpenOptions::new().read(true).write(true).open(&path).unwrap();
            file.seek(SeekFrom::Start(HEADER_SIZE as u64)).unwrap();
            let mut buf = [0u8; 1];
            file.read_exact(&mut buf).unwrap();
            buf[0] ^= 0xFF;
            file.seek(SeekFrom::Start(HEADER_SIZE as u64)).unwrap();
            file.write_all(&buf).unwrap();
            file.sync_all().unwrap();
        }

        let wal = WriteAheadLog::open(&path, SyncMode::default()).unwrap();
        let recovery = wal.recover().unwrap();
        assert_eq!(recovery.skipped, 1);
        assert_eq!(recovery.mutations, vec![second]);
    }

    #[test]
    fn torn_tail_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tail.wal");
        let wal = WriteAheadLog::open(&path, SyncMode::default()).unwrap();
        let first = make_entry("kept");
        wal.append(&first).unwrap();
        wal.append(&make_entry("torn")).unwrap();
        let total_len = wal.offset();
        drop(wal);

        {
            let file = OpenOptions::new().write(true).open(&path).unwrap();
            file.set_len(total_len - 4).unwrap();
        }

        let wal = WriteAheadLog::open(&path, SyncMode::default()).unwrap();
        let recovery = wal.recover().unwrap();
        assert_eq!(recovery.mutations, vec![first]);
        assert!(recovery.torn_tail);
    }

    #[test]
    fn append_returns_increasing_offsets() {
        let dir = tempfile::tempdir().unwrap();
        let wal = WriteAheadLog::open(&dir.path().join("offsets.wal"), SyncMode::default()).unwrap();
        let off1 = wal.append(&make_entry("a")).unwrap();
        let off2 = wal.append(&make_entry("b")).unwrap();
        assert_eq!(off1, 0);
        assert!(off2 > off1);
        assert_eq!(wal.offset(), std::fs::metadata(wal.path()).unwrap().len());
    }

    #[test]
    fn failed_append_does_not_poison_later_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("failing.wal");
        let wal = WriteAheadLog::open(&path, SyncMode::default()).unwrap();

        let before = make_entry("before");
        wal.append(&before).unwrap();
        let boundary = wal.offset();

        wal.lock().unwrap().fail_next_after = Some(HEADER_SIZE + 3);
        assert!(wal.append(&make_entry("lost")).is_err());
        assert_eq!(wal.offset(), boundary);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), boundary);

        let after = make_entry("after");
        let off = wal.append(&after).unwrap();
        assert_eq!(off, boundary);
        drop(wal);

        let wal = WriteAheadLog::open(&path, SyncMode::default()).unwrap();
        let recovery = wal.recover().unwrap();
        assert_eq!(recovery.mutations, vec![before, after]);
        assert_eq!(recovery.skipped, 0);
        assert!(!recovery.torn_tail);
    }

    #[test]
    fn rewrite_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let wal = WriteAheadLog::open(&dir.path().join("rewrite.wal"), SyncMode::EveryWrite).unwrap();
        for i in 0..5 {
            wal.append(&make_entry(&format!("old-{i}"))).unwrap();
        }

        let kept = make_entry("kept");
        wal.rewrite(std::slice::from_ref(&kept)).unwrap();
        let after = make_entry("after");
        wal.append(&after).unwrap();

        let recovery = wal.recover().unwrap();
        assert_eq!(recovery.mutations, vec![kept, after]);
    }
}
