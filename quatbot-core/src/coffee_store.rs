// ABOUTME: Binary save file for the coffee module's per-user counters
// ABOUTME: Little-endian record stream with magic, version, trailer; loads fail closed

use anyhow::{Context, Result};
use bytes::{Buf, BufMut, BytesMut};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

pub const MAGIC: i32 = 0xcafe;
pub const VERSION: i32 = 1;
pub const TRAILER: &str = "Koffiepot";
pub const FILE_NAME: &str = "cookiejar";

/// Sanity limit on the number of records in a save file
pub const MAX_RECORDS: i32 = 1000;

/// Counters for one user
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoffeeStats {
    pub user: String,
    pub coffee: i32,
    pub cookies: i32,
    pub cookies_eaten: i32,
}

impl CoffeeStats {
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            ..Self::default()
        }
    }
}

fn put_string(buf: &mut BytesMut, s: &str) {
    buf.put_u32_le(s.len() as u32);
    buf.put_slice(s.as_bytes());
}

fn get_i32(buf: &mut &[u8]) -> Result<i32> {
    if buf.remaining() < 4 {
        anyhow::bail!("Save file truncated");
    }
    Ok(buf.get_i32_le())
}

fn get_string(buf: &mut &[u8]) -> Result<String> {
    if buf.remaining() < 4 {
        anyhow::bail!("Save file truncated");
    }
    let len = buf.get_u32_le() as usize;
    if buf.remaining() < len {
        anyhow::bail!("Save file truncated in a string of {} bytes", len);
    }
    let bytes = buf[..len].to_vec();
    buf.advance(len);
    String::from_utf8(bytes).context("Save file has a malformed string")
}

/// Serialize the records, stamped with `saved_at`
pub fn encode<'a>(
    records: impl ExactSizeIterator<Item = &'a CoffeeStats>,
    saved_at: DateTime<Utc>,
) -> BytesMut {
    let mut buf = BytesMut::with_capacity(64);
    buf.put_i32_le(MAGIC);
    buf.put_i32_le(VERSION);
    buf.put_i64_le(saved_at.timestamp_millis());
    buf.put_i32_le(records.len() as i32);
    for r in records {
        put_string(&mut buf, &r.user);
        buf.put_i32_le(r.coffee);
        buf.put_i32_le(r.cookies);
        buf.put_i32_le(r.cookies_eaten);
    }
    buf.put_i32_le(0);
    buf.put_i32_le(MAGIC);
    put_string(&mut buf, TRAILER);
    buf
}

/// Parse a whole save file. Any inconsistency rejects all of it.
pub fn decode(data: &[u8]) -> Result<Vec<CoffeeStats>> {
    let mut buf = data;

    let magic = get_i32(&mut buf)?;
    if magic != MAGIC {
        anyhow::bail!("Save file corrupt (magic {:#x})", magic);
    }
    let version = get_i32(&mut buf)?;
    if version != VERSION {
        anyhow::bail!("Save file has unknown version {}", version);
    }
    if buf.remaining() < 8 {
        anyhow::bail!("Save file truncated");
    }
    let saved_at = buf.get_i64_le();

    let count = get_i32(&mut buf)?;
    if !(1..=MAX_RECORDS).contains(&count) {
        anyhow::bail!("Unreasonable coffee-count {}", count);
    }
    let mut records = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let user = get_string(&mut buf)?;
        let coffee = get_i32(&mut buf)?;
        let cookies = get_i32(&mut buf)?;
        let cookies_eaten = get_i32(&mut buf)?;
        records.push(CoffeeStats {
            user,
            coffee,
            cookies,
            cookies_eaten,
        });
    }

    if get_i32(&mut buf)? != 0 {
        anyhow::bail!("Trailer 1 corrupt");
    }
    if get_i32(&mut buf)? != MAGIC {
        anyhow::bail!("Trailer 2 corrupt");
    }
    if get_string(&mut buf)? != TRAILER {
        anyhow::bail!("Trailer 3 corrupt");
    }

    tracing::debug!(
        records = records.len(),
        saved_at = %DateTime::from_timestamp_millis(saved_at).unwrap_or_default(),
        "Decoded cookie jar"
    );
    Ok(records)
}

/// Where the cookie jar lives on disk.
///
/// Problems with the directory itself are only warned about once per store;
/// the game goes on without persistence.
#[derive(Debug)]
pub struct CoffeeStore {
    dir: PathBuf,
    warned_dir: bool,
}

impl CoffeeStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            warned_dir: false,
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(FILE_NAME)
    }

    fn backup_path(&self) -> PathBuf {
        self.dir.join(format!("{FILE_NAME}.old"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Read the save file. `Ok(None)` when there is none yet.
    pub fn load(&self) -> Result<Option<Vec<CoffeeStats>>> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }
        let data =
            std::fs::read(&path).with_context(|| format!("Failed to read {}", path.display()))?;
        let records = decode(&data).with_context(|| format!("Rejected {}", path.display()))?;
        tracing::info!(path = %path.display(), records = records.len(), "Loaded cookie jar");
        Ok(Some(records))
    }

    /// Write all records, keeping the previous file as `cookiejar.old`
    pub fn save<'a>(
        &mut self,
        records: impl ExactSizeIterator<Item = &'a CoffeeStats>,
    ) -> Result<()> {
        if let Err(e) = std::fs::create_dir_all(&self.dir) {
            if !self.warned_dir {
                tracing::warn!(
                    dir = %self.dir.display(),
                    error = %e,
                    "Could not create data directory, cookie jar is not saved"
                );
                self.warned_dir = true;
            }
            return Ok(());
        }

        let path = self.path();
        if path.exists() {
            if let Err(e) = std::fs::rename(&path, self.backup_path()) {
                tracing::debug!(error = %e, "Could not keep previous cookie jar");
            }
        }
        let data = encode(records, Utc::now());
        std::fs::write(&path, &data)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<CoffeeStats> {
        vec![
            CoffeeStats {
                user: "@ade:kde.org".to_string(),
                coffee: 3,
                cookies: 1,
                cookies_eaten: 2,
            },
            CoffeeStats::new("@bob:example.org"),
        ]
    }

    #[test]
    fn test_layout() {
        let records = sample();
        let data = encode(records.iter().take(1), Utc::now());
        let mut buf = &data[..];
        assert_eq!(buf.get_i32_le(), 0xcafe);
        assert_eq!(buf.get_i32_le(), 1);
        buf.advance(8);
        assert_eq!(buf.get_i32_le(), 1);
        assert_eq!(buf.get_u32_le(), 12);
        assert_eq!(&buf[..12], b"@ade:kde.org");
        buf.advance(12);
        assert_eq!(buf.get_i32_le(), 3);
        assert_eq!(buf.get_i32_le(), 1);
        assert_eq!(buf.get_i32_le(), 2);
        assert_eq!(buf.get_i32_le(), 0);
        assert_eq!(buf.get_i32_le(), 0xcafe);
        assert_eq!(buf.get_u32_le(), 9);
        assert_eq!(buf, b"Koffiepot");
    }

    #[test]
    fn test_every_record_survives_a_round_trip() {
        let mut records = sample();
        records.push(CoffeeStats {
            user: "@carol:example.org".to_string(),
            coffee: 40,
            cookies: 0,
            cookies_eaten: 17,
        });
        records.push(CoffeeStats {
            user: "@dave:x.org".to_string(),
            coffee: 0,
            cookies: 5,
            cookies_eaten: 0,
        });
        let data = encode(records.iter(), Utc::now());
        assert_eq!(decode(&data).unwrap(), records);

        let dir = tempfile::tempdir().unwrap();
        let mut store = CoffeeStore::new(dir.path());
        store.save(records.iter()).unwrap();
        assert_eq!(store.load().unwrap().unwrap(), records);
    }

    fn with_count(count: i32) -> Vec<u8> {
        let mut data = encode(sample().iter(), Utc::now()).to_vec();
        data[16..20].copy_from_slice(&count.to_le_bytes());
        data
    }

    #[test]
    fn test_unreasonable_counts_are_rejected() {
        assert!(decode(&with_count(0)).is_err());
        assert!(decode(&with_count(1001)).is_err());
        assert!(decode(&with_count(-1)).is_err());
    }

    #[test]
    fn test_trailer_mismatch_is_rejected() {
        let mut data = encode(sample().iter(), Utc::now()).to_vec();
        let last = data.len() - 1;
        data[last] = b'X';
        assert!(decode(&data).is_err());
    }

    #[test]
    fn test_truncated_file_is_rejected() {
        let data = encode(sample().iter(), Utc::now());
        for len in [0, 3, 10, 20, 30, data.len() - 1] {
            assert!(decode(&data[..len]).is_err(), "length {len}");
        }
    }

    #[test]
    fn test_wrong_version_is_rejected() {
        let mut data = encode(sample().iter(), Utc::now()).to_vec();
        data[4..8].copy_from_slice(&2i32.to_le_bytes());
        assert!(decode(&data).is_err());
    }

    #[test]
    fn test_store_keeps_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = CoffeeStore::new(dir.path());
        assert!(store.load().unwrap().is_none());

        let records = sample();
        store.save(records.iter()).unwrap();
        store.save(records.iter().take(1)).unwrap();

        assert!(dir.path().join("cookiejar.old").exists());
        assert_eq!(store.load().unwrap().unwrap(), records[..1].to_vec());
    }

    #[test]
    fn test_store_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(FILE_NAME), b"not a cookie jar").unwrap();
        let store = CoffeeStore::new(dir.path());
        assert!(store.load().is_err());
    }

    #[test]
    fn test_store_without_directory_warns_and_continues() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        let mut store = CoffeeStore::new(blocker.join("jar"));
        assert!(store.save(sample().iter()).is_ok());
        assert!(store.warned_dir);
        assert!(store.save(sample().iter()).is_ok());
    }
}
