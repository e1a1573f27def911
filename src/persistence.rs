//! Durable snapshot storage for PhysicsCoin
//!
//! Whole-file save/load of serialized snapshots. A save writes the complete
//! image in one pass; a load reads the complete file into one buffer and
//! hands it to the codec. Scratch buffers live only for the duration of a
//! call and are dropped on every return path.
//!
//! By default a save truncates the target in place, so a crash mid-write can
//! leave a short file behind. Set [`StoreConfig::atomic_save`] to write a
//! sibling temporary file and rename it over the target instead.

use crate::codec::{self, StateHeader};
use crate::config::StoreConfig;
use crate::error::{Result, StateError};
use crate::snapshot::Snapshot;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Abstraction for snapshot storage backends.
pub trait Persistence: Send + Sync {
    fn save_state(&self, snapshot: &Snapshot) -> Result<()>;
    fn load_state(&self, dest: &mut Snapshot) -> Result<()>;
}

/// Saves `snapshot` to `path` with the default store configuration.
pub fn save(snapshot: &Snapshot, path: impl AsRef<Path>) -> Result<()> {
    StateStore::default().save(snapshot, path)
}

/// Loads the snapshot at `path` into `dest` with the default store configuration.
pub fn load(dest: &mut Snapshot, path: impl AsRef<Path>) -> Result<()> {
    StateStore::default().load(dest, path)
}

/// Reads and validates only the header of the state file at `path`.
pub fn read_header(path: impl AsRef<Path>) -> Result<StateHeader> {
    let path = path.as_ref();
    let mut file = File::open(path)?;
    let mut buf = [0u8; StateHeader::SIZE];
    let read = read_fully(&mut file, &mut buf)?;
    if read == 0 {
        return Err(StateError::EmptyFile {
            path: path.to_path_buf(),
        });
    }
    Ok(StateHeader::from_bytes(&buf[..read])?)
}

#[derive(Debug, Clone, Default)]
pub struct StateStore {
    config: StoreConfig,
}

impl StateStore {
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Serializes `snapshot` and writes the whole image to `path`.
    pub fn save(&self, snapshot: &Snapshot, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let required = codec::serialized_size(snapshot);
        let mut buffer = vec![0u8; required];
        let written = codec::serialize_into(snapshot, &mut buffer)?;
        if written == 0 {
            return Err(StateError::ShortWrite {
                expected: required,
                written: 0,
            });
        }
        debug!("Serialized snapshot v{} into {} bytes", snapshot.version, written);

        if self.config.atomic_save {
            let tmp_path = temp_path_for(path);
            if let Err(e) = self.write_image(&tmp_path, &buffer[..written]) {
                let _ = fs::remove_file(&tmp_path);
                return Err(e);
            }
            if let Err(e) = fs::rename(&tmp_path, path) {
                warn!(
                    "Cannot move {} over {}: {}",
                    tmp_path.display(),
                    path.display(),
                    e
                );
                let _ = fs::remove_file(&tmp_path);
                return Err(e.into());
            }
        } else {
            self.write_image(path, &buffer[..written])?;
        }

        info!(
            "Saved snapshot v{} ({} wallets, {} bytes) to {}",
            snapshot.version,
            snapshot.wallet_count(),
            written,
            path.display()
        );
        Ok(())
    }

    /// Reads the whole file at `path` and rebuilds `dest` from it.
    pub fn load(&self, dest: &mut Snapshot, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut file = File::open(path)?;

        let size = file.metadata()?.len();
        if size == 0 {
            warn!("Refusing to load empty state file {}", path.display());
            return Err(StateError::EmptyFile {
                path: path.to_path_buf(),
            });
        }
        let expected = usize::try_from(size).map_err(|_| {
            StateError::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("state file of {} bytes does not fit in memory", size),
            ))
        })?;

        let buffer = match read_image(&mut file, expected) {
            Ok(buffer) => buffer,
            Err(e) => {
                warn!("Cannot read state file {}: {}", path.display(), e);
                return Err(e);
            }
        };

        if let Err(e) = codec::deserialize_with_slack(dest, &buffer, self.config.wallet_slack) {
            warn!("Rejected state file {}: {}", path.display(), e);
            return Err(e);
        }

        info!(
            "Loaded snapshot v{} ({} wallets) from {}",
            dest.version,
            dest.wallet_count(),
            path.display()
        );
        Ok(())
    }

    /// Saves to the configured `state_path`.
    pub fn save_default(&self, snapshot: &Snapshot) -> Result<()> {
        self.save(snapshot, &self.config.state_path)
    }

    /// Loads from the configured `state_path`.
    pub fn load_default(&self, dest: &mut Snapshot) -> Result<()> {
        self.load(dest, &self.config.state_path)
    }

    fn write_image(&self, path: &Path, image: &[u8]) -> Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        write_image_to(&mut file, image)?;
        if self.config.sync_on_save {
            file.sync_all()?;
        }
        Ok(())
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Writes the whole of `image` and flushes, failing with
/// [`StateError::ShortWrite`] when the writer stops accepting bytes early.
fn write_image_to<W: Write>(writer: &mut W, image: &[u8]) -> Result<()> {
    let written = write_fully(writer, image)?;
    if written != image.len() {
        return Err(StateError::ShortWrite {
            expected: image.len(),
            written,
        });
    }
    writer.flush()?;
    Ok(())
}

/// Reads exactly `expected` bytes, failing with [`StateError::ShortRead`]
/// when the reader ends first.
fn read_image<R: Read>(reader: &mut R, expected: usize) -> Result<Vec<u8>> {
    let mut buffer = vec![0u8; expected];
    let read = read_fully(reader, &mut buffer)?;
    if read != expected {
        return Err(StateError::ShortRead { expected, read });
    }
    Ok(buffer)
}

/// Writes as much of `data` as the writer accepts, returning the byte count.
/// Stops early when the writer reports zero progress.
fn write_fully<W: Write>(writer: &mut W, data: &[u8]) -> io::Result<usize> {
    let mut written = 0;
    while written < data.len() {
        match writer.write(&data[written..]) {
            Ok(0) => break,
            Ok(n) => written += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(written)
}

/// Fills `buf` from the reader until it is full or the reader hits EOF.
fn read_fully<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut read = 0;
    while read < buf.len() {
        match reader.read(&mut buf[read..]) {
            Ok(0) => break,
            Ok(n) => read += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(read)
}

/// File-backed [`Persistence`] bound to a single path.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
    store: StateStore,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>, config: StoreConfig) -> Self {
        Self {
            path: path.into(),
            store: StateStore::new(config),
        }
    }

    /// Binds to `config.state_path`.
    pub fn from_config(config: StoreConfig) -> Self {
        let path = config.state_path.clone();
        Self::new(path, config)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Persistence for FileStore {
    fn save_state(&self, snapshot: &Snapshot) -> Result<()> {
        self.store.save(snapshot, &self.path)
    }

    fn load_state(&self, dest: &mut Snapshot) -> Result<()> {
        self.store.load(dest, &self.path)
    }
}

/// Simple in-memory persistence holding the serialized image; useful for
/// tests and ephemeral runs.
#[derive(Clone)]
pub struct InMemoryPersistence {
    pub image: Arc<Mutex<Vec<u8>>>,
    wallet_slack: usize,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self {
            image: Arc::new(Mutex::new(Vec::new())),
            wallet_slack: codec::DEFAULT_WALLET_SLACK,
        }
    }
}

impl Default for InMemoryPersistence {
    fn default() -> Self {
        Self::new()
    }
}

impl Persistence for InMemoryPersistence {
    fn save_state(&self, snapshot: &Snapshot) -> Result<()> {
        let bytes = codec::serialize(snapshot)?;
        *self.image.lock() = bytes;
        Ok(())
    }

    fn load_state(&self, dest: &mut Snapshot) -> Result<()> {
        let image = self.image.lock();
        if image.is_empty() {
            return Err(StateError::EmptyFile {
                path: PathBuf::from(":memory:"),
            });
        }
        codec::deserialize_with_slack(dest, &image, self.wallet_slack)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::DIGEST_SIZE;
    use crate::wallet::WalletRecord;
    use tempfile::TempDir;

    fn sample_snapshot() -> Snapshot {
        let mut snapshot = Snapshot::new();
        snapshot.version = 4;
        snapshot.timestamp = 77;
        snapshot.token_supply_total = 100.0;
        snapshot.state_digest = [0x09; DIGEST_SIZE];
        snapshot
            .push_wallet(WalletRecord::new([0x10; 32], 60.0))
            .unwrap();
        snapshot
            .push_wallet(WalletRecord::new([0x20; 32], 40.0))
            .unwrap();
        snapshot
    }

    /// Accepts at most `limit` bytes, then reports no progress.
    struct LimitedWriter {
        accepted: Vec<u8>,
        limit: usize,
    }

    impl Write for LimitedWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let room = self.limit - self.accepted.len();
            let n = room.min(buf.len()).min(7);
            self.accepted.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_write_fully_reports_partial_progress() {
        let mut writer = LimitedWriter {
            accepted: Vec::new(),
            limit: 20,
        };
        let written = write_fully(&mut writer, &[1u8; 50]).unwrap();
        assert_eq!(written, 20);
        assert_eq!(writer.accepted.len(), 20);
    }

    #[test]
    fn test_read_fully_stops_at_eof() {
        let data = [3u8; 10];
        let mut buf = [0u8; 16];
        let read = read_fully(&mut &data[..], &mut buf).unwrap();
        assert_eq!(read, 10);
    }

    #[test]
    fn test_short_write_is_io_error() {
        let mut writer = LimitedWriter {
            accepted: Vec::new(),
            limit: 30,
        };
        let image = codec::serialize(&sample_snapshot()).unwrap();

        let err = write_image_to(&mut writer, &image).unwrap_err();
        assert!(matches!(err, StateError::ShortWrite { written: 30, .. }));
        assert!(err.is_io());
    }

    #[test]
    fn test_short_read_is_io_error() {
        let data = [3u8; 10];
        let err = read_image(&mut &data[..], 16).unwrap_err();
        assert!(matches!(err, StateError::ShortRead { expected: 16, read: 10 }));
        assert!(err.is_io());

        let image = read_image(&mut &data[..], 10).unwrap();
        assert_eq!(image, data);
    }

    #[test]
    fn test_save_writes_exact_image() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.pcs");
        let snapshot = sample_snapshot();

        save(&snapshot, &path).unwrap();

        let on_disk = fs::read(&path).unwrap();
        assert_eq!(on_disk, codec::serialize(&snapshot).unwrap());
    }

    #[test]
    fn test_save_truncates_previous_contents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.pcs");
        fs::write(&path, vec![0xFFu8; 4096]).unwrap();

        let snapshot = sample_snapshot();
        save(&snapshot, &path).unwrap();
        assert_eq!(
            fs::metadata(&path).unwrap().len() as usize,
            codec::serialized_size(&snapshot)
        );
    }

    #[test]
    fn test_atomic_save_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.pcs");
        let store = StateStore::new(StoreConfig {
            atomic_save: true,
            sync_on_save: true,
            ..StoreConfig::default()
        });

        store.save(&sample_snapshot(), &path).unwrap();

        assert!(path.exists());
        assert!(!dir.path().join("state.pcs.tmp").exists());

        let mut loaded = Snapshot::default();
        store.load(&mut loaded, &path).unwrap();
        assert_eq!(loaded, sample_snapshot());
    }

    #[test]
    fn test_failed_atomic_rename_removes_temp_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.pcs");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("occupied"), b"x").unwrap();

        let store = StateStore::new(StoreConfig {
            atomic_save: true,
            ..StoreConfig::default()
        });
        let err = store.save(&sample_snapshot(), &path).unwrap_err();
        assert!(err.is_io());
        assert!(!dir.path().join("state.pcs.tmp").exists());
        assert!(path.join("occupied").exists());
    }

    #[test]
    fn test_unreservable_slack_fails_load_as_io() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.pcs");
        save(&sample_snapshot(), &path).unwrap();

        let store = StateStore::new(StoreConfig {
            wallet_slack: usize::MAX,
            ..StoreConfig::default()
        });
        let mut dest = Snapshot::default();
        let err = store.load(&mut dest, &path).unwrap_err();
        assert!(matches!(err, StateError::AllocationFailed { .. }));
        assert!(err.is_io());
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let mut dest = Snapshot::default();
        let err = load(&mut dest, dir.path().join("nope.pcs")).unwrap_err();
        assert!(err.is_io());
    }

    #[test]
    fn test_load_uses_configured_slack() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.pcs");
        save(&sample_snapshot(), &path).unwrap();

        let store = StateStore::new(StoreConfig {
            wallet_slack: 500,
            ..StoreConfig::default()
        });
        let mut dest = Snapshot::default();
        store.load(&mut dest, &path).unwrap();
        assert!(dest.wallets_capacity() >= 502);
    }

    #[test]
    fn test_default_path_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(StoreConfig {
            state_path: dir.path().join("ledger.pcs"),
            ..StoreConfig::default()
        });

        store.save_default(&sample_snapshot()).unwrap();
        let mut dest = Snapshot::default();
        store.load_default(&mut dest).unwrap();
        assert_eq!(dest, sample_snapshot());
    }

    #[test]
    fn test_read_header_only() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.pcs");
        save(&sample_snapshot(), &path).unwrap();

        let header = read_header(&path).unwrap();
        assert_eq!(header.version, 4);
        assert_eq!(header.wallet_count, 2);

        fs::write(&path, b"").unwrap();
        assert!(matches!(
            read_header(&path),
            Err(StateError::EmptyFile { .. })
        ));

        fs::write(&path, b"PHYS").unwrap();
        assert!(read_header(&path).unwrap_err().is_format());
    }

    #[test]
    fn test_file_store_persistence() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("state.pcs"), StoreConfig::default());

        store.save_state(&sample_snapshot()).unwrap();
        let mut dest = Snapshot::new();
        store.load_state(&mut dest).unwrap();
        assert_eq!(dest, sample_snapshot());
    }

    #[test]
    fn test_in_memory_persistence() {
        let persistence = InMemoryPersistence::new();
        let mut dest = Snapshot::default();
        assert!(persistence.load_state(&mut dest).unwrap_err().is_io());

        persistence.save_state(&sample_snapshot()).unwrap();
        persistence.load_state(&mut dest).unwrap();
        assert_eq!(dest, sample_snapshot());
        assert!(dest.wallets_capacity() >= 102);
    }
}
