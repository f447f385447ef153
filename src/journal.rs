//! Durable journal of table mutations.
//!
//! Every insert, delete and clear is appended to the journal before it is
//! applied in memory. Opening the store replays the journal to rebuild the
//! table; compaction rewrites it as a checkpoint followed by one insert per
//! live row.
//!
//! File layout: `SUB\0`, one schema-version byte, then frames of
//! `u32 LE length | MessagePack entry | u32 LE crc32`.

use crate::error::{Result, StoreError};
use crate::table::SubscriptionTable;
use crate::types::{SubscriptionId, SubscriptionRequest};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Magic bytes for the journal file.
const JOURNAL_MAGIC: &[u8; 4] = b"SUB\0";

/// Current schema version. Journals written with an older version are
/// discarded on open.
pub const SCHEMA_VERSION: u8 = 1;

/// Header size (magic + version).
const HEADER_SIZE: usize = 5;

/// Frame overhead (length prefix + checksum).
const FRAME_OVERHEAD: usize = 8;

/// Upper bound on a single encoded entry.
const MAX_ENTRY_SIZE: usize = 1024 * 1024;

/// One mutation of the subscription table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum JournalEntry {
    /// A row was inserted.
    Insert {
        id: SubscriptionId,
        provider: String,
        max_delay: u64,
        min_distance: f64,
    },
    /// A row was removed by id.
    Delete { id: SubscriptionId },
    /// Every row was removed.
    Clear,
    /// Id counter at compaction time, so ids of deleted rows stay retired.
    Checkpoint { next_id: SubscriptionId },
}

impl JournalEntry {
    pub fn insert(id: SubscriptionId, request: &SubscriptionRequest) -> Self {
        JournalEntry::Insert {
            id,
            provider: request.provider.clone(),
            max_delay: request.max_delay,
            min_distance: request.min_distance,
        }
    }

    /// Replay this entry onto a table.
    pub fn apply(self, table: &mut SubscriptionTable) {
        match self {
            JournalEntry::Insert {
                id,
                provider,
                max_delay,
                min_distance,
            } => table.insert_with_id(
                id,
                SubscriptionRequest {
                    provider,
                    max_delay,
                    min_distance,
                },
            ),
            JournalEntry::Delete { id } => {
                table.remove(id);
            }
            JournalEntry::Clear => {
                table.clear();
            }
            JournalEntry::Checkpoint { next_id } => table.advance_next_id(next_id),
        }
    }
}

/// Append-only journal file.
///
/// Not synchronized; the owning store serializes access.
pub struct Journal {
    /// Path to the journal file.
    path: PathBuf,

    /// Append handle.
    file: File,

    /// Frames written since the last compaction.
    entries: u64,

    /// Current file size.
    size: u64,

    /// fsync after every append.
    sync_writes: bool,
}

impl Journal {
    /// Open or create a journal and rebuild the table it describes.
    pub fn open(
        path: impl AsRef<Path>,
        sync_writes: bool,
    ) -> Result<(Self, SubscriptionTable)> {
        let path = path.as_ref().to_path_buf();

        if !path.exists() {
            debug!(path = %path.display(), "creating subscription journal");
            return Ok((Self::create(path, sync_writes)?, SubscriptionTable::new()));
        }

        let bytes = fs::read(&path)?;

        if bytes.len() < HEADER_SIZE {
            warn!(path = %path.display(), "journal header incomplete, recreating");
            return Ok((Self::create(path, sync_writes)?, SubscriptionTable::new()));
        }

        if &bytes[0..4] != JOURNAL_MAGIC {
            return Err(StoreError::InvalidFormat("Invalid journal magic".into()));
        }

        let version = bytes[4];
        if version > SCHEMA_VERSION {
            return Err(StoreError::InvalidFormat(format!(
                "Unsupported journal version: {}",
                version
            )));
        }
        if version < SCHEMA_VERSION {
            // Older schemas are not migrated; owners re-register.
            info!(
                path = %path.display(),
                from = version,
                to = SCHEMA_VERSION,
                "journal schema is outdated, discarding subscriptions"
            );
            return Ok((Self::create(path, sync_writes)?, SubscriptionTable::new()));
        }

        let mut table = SubscriptionTable::new();
        let mut offset = HEADER_SIZE;
        let mut entries = 0u64;

        while let Some((entry, frame_len)) = Self::decode_frame(&bytes[offset..])? {
            entry.apply(&mut table);
            offset += frame_len;
            entries += 1;
        }

        let file = OpenOptions::new().append(true).open(&path)?;

        if offset < bytes.len() {
            // A crash during an append can only damage the last frame.
            if Self::intact_frame_after(&bytes[offset..]) {
                return Err(StoreError::Corruption(format!(
                    "Damaged journal frame at offset {} is followed by intact frames",
                    offset
                )));
            }
            warn!(
                path = %path.display(),
                dropped_bytes = bytes.len() - offset,
                "truncating torn journal tail"
            );
            file.set_len(offset as u64)?;
            file.sync_all()?;
        }

        info!(
            path = %path.display(),
            entries,
            active = table.len(),
            "replayed subscription journal"
        );

        Ok((
            Self {
                path,
                file,
                entries,
                size: offset as u64,
                sync_writes,
            },
            table,
        ))
    }

    /// Append one entry.
    ///
    /// On failure the file is cut back to its previous length so a later
    /// append does not land behind a partial frame.
    pub fn append(&mut self, entry: &JournalEntry) -> Result<()> {
        let frame = Self::encode_frame(entry)?;

        if let Err(e) = self.write_frame(&frame) {
            if let Err(rewind) = self.rewind() {
                warn!(
                    path = %self.path.display(),
                    error = %rewind,
                    "failed to discard partial journal frame"
                );
            }
            return Err(e);
        }

        self.entries += 1;
        self.size += frame.len() as u64;
        Ok(())
    }

    /// Rewrite the journal so it holds exactly the rows of `table`.
    pub fn compact(&mut self, table: &SubscriptionTable) -> Result<()> {
        let tmp_path = self.path.with_extension("journal.tmp");

        let mut buf = Vec::with_capacity(HEADER_SIZE);
        buf.extend_from_slice(JOURNAL_MAGIC);
        buf.push(SCHEMA_VERSION);
        buf.extend(Self::encode_frame(&JournalEntry::Checkpoint {
            next_id: table.next_id(),
        })?);
        for (id, request) in table.iter() {
            buf.extend(Self::encode_frame(&JournalEntry::insert(id, request))?);
        }

        {
            let mut tmp = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&tmp_path)?;
            tmp.write_all(&buf)?;
            tmp.sync_all()?;
        }

        // The append handle follows the inode through the rename, so the old
        // handle stays in place until the new file is live.
        let file = OpenOptions::new().append(true).open(&tmp_path)?;
        fs::rename(&tmp_path, &self.path)?;
        self.file = file;
        self.sync_dir();

        self.entries = 1 + table.len() as u64;
        self.size = buf.len() as u64;

        debug!(
            path = %self.path.display(),
            active = table.len(),
            bytes = self.size,
            "compacted subscription journal"
        );
        Ok(())
    }

    /// Force pending writes to disk.
    pub fn sync(&self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Frames written since the last compaction.
    pub fn entries(&self) -> u64 {
        self.entries
    }

    /// Journal size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn create(path: PathBuf, sync_writes: bool) -> Result<Self> {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;

        file.write_all(JOURNAL_MAGIC)?;
        file.write_all(&[SCHEMA_VERSION])?;
        file.sync_all()?;

        let file = OpenOptions::new().append(true).open(&path)?;

        Ok(Self {
            path,
            file,
            entries: 0,
            size: HEADER_SIZE as u64,
            sync_writes,
        })
    }

    fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        self.file.write_all(frame)?;
        if self.sync_writes {
            self.file.sync_data()?;
        }
        Ok(())
    }

    /// Persist the rename done by `compact`.
    fn sync_dir(&self) {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        if let Err(e) = File::open(dir).and_then(|d| d.sync_all()) {
            warn!(path = %dir.display(), error = %e, "failed to sync journal directory");
        }
    }

    #[cfg(test)]
    pub(crate) fn swap_file(&mut self, file: File) -> File {
        std::mem::replace(&mut self.file, file)
    }

    fn rewind(&mut self) -> Result<()> {
        self.file.set_len(self.size)?;
        self.file.seek(SeekFrom::End(0))?;
        Ok(())
    }

    fn encode_frame(entry: &JournalEntry) -> Result<Vec<u8>> {
        let encoded = rmp_serde::to_vec(entry)?;

        let mut frame = Vec::with_capacity(encoded.len() + FRAME_OVERHEAD);
        frame.extend_from_slice(&(encoded.len() as u32).to_le_bytes());
        frame.extend_from_slice(&encoded);
        frame.extend_from_slice(&crc32fast::hash(&encoded).to_le_bytes());
        Ok(frame)
    }

    /// Decode the frame at the start of `buf`.
    ///
    /// `Ok(None)` means there is no complete, intact frame left: either a
    /// clean end of file or a torn tail. A frame that passes its checksum but
    /// does not decode is real corruption and is reported.
    fn decode_frame(buf: &[u8]) -> Result<Option<(JournalEntry, usize)>> {
        if buf.len() < FRAME_OVERHEAD {
            return Ok(None);
        }

        let len = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
        // Every entry encodes to at least one byte; an empty frame with a
        // zero checksum is what a zero-filled tail looks like.
        if len == 0 || len > MAX_ENTRY_SIZE || buf.len() < len + FRAME_OVERHEAD {
            return Ok(None);
        }

        let encoded = &buf[4..4 + len];
        let crc = &buf[4 + len..len + FRAME_OVERHEAD];
        let stored_checksum = u32::from_le_bytes([crc[0], crc[1], crc[2], crc[3]]);
        if stored_checksum != crc32fast::hash(encoded) {
            return Ok(None);
        }

        let entry = rmp_serde::from_slice(encoded)
            .map_err(|e| StoreError::Corruption(format!("Undecodable journal entry: {}", e)))?;
        Ok(Some((entry, len + FRAME_OVERHEAD)))
    }

    /// Whether any checksummed frame starts past the first byte of `buf`.
    fn intact_frame_after(buf: &[u8]) -> bool {
        (1..buf.len()).any(|start| !matches!(Self::decode_frame(&buf[start..]), Ok(None)))
    }
}
