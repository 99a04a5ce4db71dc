use std::fs;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Result, StatoError};
use crate::model::Recording;

/// Storage for recording bytes, addressed by the key `put` hands back.
pub trait BlobStore: Send + Sync {
    fn put(&self, file_name: &str, bytes: &[u8]) -> Result<String>;
    fn delete(&self, key: &str) -> Result<()>;
    /// `None` when no blob is stored under `key`.
    fn size(&self, key: &str) -> Result<Option<u64>>;
    /// Inclusive byte range.
    fn read_range(&self, key: &str, start: u64, end: u64) -> Result<Vec<u8>>;
}

/// Blobs on local disk, named by their SHA-256 digest plus the upload's extension.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsBlobStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '.')
            && !key.starts_with('.');
        if !valid {
            return Err(StatoError::validation("Invalid recording key."));
        }
        Ok(self.root.join(key))
    }
}

pub fn blob_key(file_name: &str, bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = format!("{:x}", hasher.finalize());
    match extension(file_name) {
        Some(ext) => format!("{digest}.{ext}"),
        None => digest,
    }
}

fn extension(file_name: &str) -> Option<String> {
    let ext = Path::new(file_name).extension()?.to_str()?.to_ascii_lowercase();
    (!ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric())).then_some(ext)
}

impl BlobStore for FsBlobStore {
    fn put(&self, file_name: &str, bytes: &[u8]) -> Result<String> {
        let key = blob_key(file_name, bytes);
        let path = self.path_for(&key)?;
        if !path.exists() {
            fs::create_dir_all(&self.root)?;
            fs::write(&path, bytes)?;
            tracing::debug!(key = %key, bytes = bytes.len(), "stored recording blob");
        }
        Ok(key)
    }

    fn delete(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_for(key)?) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn size(&self, key: &str) -> Result<Option<u64>> {
        match fs::metadata(self.path_for(key)?) {
            Ok(meta) => Ok(Some(meta.len())),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn read_range(&self, key: &str, start: u64, end: u64) -> Result<Vec<u8>> {
        let mut file = fs::File::open(self.path_for(key)?)?;
        file.seek(SeekFrom::Start(start))?;
        let mut buf = Vec::new();
        file.take(end.saturating_sub(start) + 1).read_to_end(&mut buf)?;
        Ok(buf)
    }
}

pub fn content_type_for(file_name: &str) -> &'static str {
    let lower = file_name.to_ascii_lowercase();
    if lower.ends_with(".mov") {
        "video/quicktime"
    } else if lower.ends_with(".webm") {
        "video/webm"
    } else {
        "video/mp4"
    }
}

/// Resolve a `bytes=start-end` header against a blob of `size` bytes.
/// A missing start means 0, a missing end means the last byte, and the end is clamped.
pub fn parse_range(header: &str, size: u64) -> Result<(u64, u64)> {
    let unsatisfiable = || StatoError::validation("Requested range not satisfiable.");
    let spec = header.trim().strip_prefix("bytes=").ok_or_else(unsatisfiable)?;
    let (start_s, end_s) = spec.split_once('-').ok_or_else(unsatisfiable)?;
    let number = |s: &str| -> Result<Option<u64>> {
        if s.is_empty() {
            return Ok(None);
        }
        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(unsatisfiable());
        }
        s.parse().map(Some).map_err(|_| unsatisfiable())
    };
    let start = number(start_s)?.unwrap_or(0);
    if start >= size {
        return Err(unsatisfiable());
    }
    let end = number(end_s)?.unwrap_or(size - 1).min(size - 1);
    if end < start {
        return Err(unsatisfiable());
    }
    Ok((start, end))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingChunk {
    pub start: u64,
    pub end: u64,
    pub size: u64,
    pub content_type: String,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

impl RecordingChunk {
    pub fn content_range(&self) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, self.size)
    }
}

fn recording_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Recording> {
    let size: i64 = row.get(5)?;
    Ok(Recording {
        id: row.get(0)?,
        match_id: row.get(1)?,
        blob_key: row.get(2)?,
        file_name: row.get(3)?,
        content_type: row.get(4)?,
        size_bytes: u64::try_from(size).unwrap_or(0),
        duration_seconds: row.get(6)?,
        uploaded_at: row.get(7)?,
    })
}

/// Looks up by match id alone; callers scope the match to a team first.
pub fn get_recording(conn: &Connection, match_id: i64) -> Result<Option<Recording>> {
    let rec = conn
        .query_row(
            "SELECT id, match_id, blob_key, file_name, content_type, size_bytes, duration_seconds,
                    uploaded_at
             FROM recordings WHERE match_id = ?1",
            params![match_id],
            recording_from_row,
        )
        .optional()?;
    Ok(rec)
}

/// Unparseable or negative durations are dropped rather than rejected.
pub fn parse_duration(raw: Option<&str>) -> Option<u32> {
    raw.and_then(|s| s.trim().parse::<u32>().ok())
}

/// Store `bytes` as the match's recording, replacing any previous one.
pub fn attach_recording(
    conn: &Connection,
    blobs: &dyn BlobStore,
    match_id: i64,
    file_name: &str,
    bytes: &[u8],
    duration_seconds: Option<u32>,
    now: DateTime<Utc>,
) -> Result<Recording> {
    let file_name = file_name.trim();
    if bytes.is_empty() {
        return Err(StatoError::validation("No file provided."));
    }
    let previous = get_recording(conn, match_id)?;
    let key = blobs.put(file_name, bytes)?;
    let size = i64::try_from(bytes.len())
        .map_err(|_| StatoError::validation("Recording is too large."))?;
    let content_type = content_type_for(file_name);

    let rec = conn.query_row(
        "INSERT INTO recordings (match_id, blob_key, file_name, content_type, size_bytes,
             duration_seconds, uploaded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(match_id) DO UPDATE SET
             blob_key = excluded.blob_key,
             file_name = excluded.file_name,
             content_type = excluded.content_type,
             size_bytes = excluded.size_bytes,
             duration_seconds = COALESCE(excluded.duration_seconds, recordings.duration_seconds),
             uploaded_at = excluded.uploaded_at
         RETURNING id, match_id, blob_key, file_name, content_type, size_bytes, duration_seconds,
             uploaded_at",
        params![match_id, key, file_name, content_type, size, duration_seconds, now],
        recording_from_row,
    )?;

    if let Some(old) = previous.filter(|old| old.blob_key != key) {
        let still_used: i64 = conn.query_row(
            "SELECT COUNT(*) FROM recordings WHERE blob_key = ?1",
            params![old.blob_key],
            |row| row.get(0),
        )?;
        if still_used == 0 {
            if let Err(err) = blobs.delete(&old.blob_key) {
                tracing::warn!(match_id, key = %old.blob_key, error = %err, "failed to delete replaced recording");
            }
        }
    }
    tracing::info!(match_id, key = %rec.blob_key, size = rec.size_bytes, "recording attached");
    Ok(rec)
}

/// Read the match's recording, or the part a `bytes=` header asks for.
pub fn read_recording(
    conn: &Connection,
    blobs: &dyn BlobStore,
    match_id: i64,
    range: Option<&str>,
) -> Result<RecordingChunk> {
    let rec = get_recording(conn, match_id)?.ok_or(StatoError::NotFound("Recording"))?;
    let size = blobs
        .size(&rec.blob_key)?
        .ok_or(StatoError::NotFound("Recording file"))?;
    let range = range.map(str::trim).filter(|r| !r.is_empty());
    let (start, end) = match range {
        Some(header) => parse_range(header, size)?,
        None if size == 0 => {
            return Ok(RecordingChunk {
                start: 0,
                end: 0,
                size,
                content_type: rec.content_type,
                bytes: Vec::new(),
            });
        }
        None => (0, size - 1),
    };
    Ok(RecordingChunk {
        start,
        end,
        size,
        content_type: rec.content_type,
        bytes: blobs.read_range(&rec.blob_key, start, end)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_headers_clamp_and_reject() {
        assert_eq!(parse_range("bytes=0-", 100).expect("open end"), (0, 99));
        assert_eq!(parse_range("bytes=10-500", 100).expect("clamped"), (10, 99));
        assert_eq!(parse_range("bytes=-20", 100).expect("missing start"), (0, 20));
        assert!(parse_range("bytes=100-", 100).is_err());
        assert!(parse_range("items=0-1", 100).is_err());
        assert!(parse_range("bytes=5-2", 100).is_err());
    }

    #[test]
    fn content_type_follows_extension() {
        assert_eq!(content_type_for("Final.MOV"), "video/quicktime");
        assert_eq!(content_type_for("clip.webm"), "video/webm");
        assert_eq!(content_type_for("clip.avi"), "video/mp4");
        assert_eq!(content_type_for(""), "video/mp4");
    }

    #[test]
    fn keys_are_content_addressed() {
        let a = blob_key("a.MP4", b"same");
        let b = blob_key("b.mp4", b"same");
        assert_eq!(a, b);
        assert!(a.ends_with(".mp4"));
        assert_eq!(a.len(), 64 + 4);
        assert_ne!(blob_key("a.mp4", b"other"), a);
    }

    #[test]
    fn durations_are_lenient() {
        assert_eq!(parse_duration(Some(" 95 ")), Some(95));
        assert_eq!(parse_duration(Some("abc")), None);
        assert_eq!(parse_duration(Some("-3")), None);
        assert_eq!(parse_duration(None), None);
    }
}
