use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::models::FamilyData;

/// How long to wait for another process to release the data file
const LOCK_TIMEOUT: Duration = Duration::from_secs(5);
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Handles saving and loading family data from a YAML file, with file
/// locking so two processes never interleave a read-modify-write
pub struct Storage {
    file_path: PathBuf,
    lock_file_path: PathBuf,
}

impl Storage {
    /// Creates a new Storage instance
    pub fn new<P: AsRef<Path>>(file_path: P) -> Self {
        let file_path = file_path.as_ref().to_path_buf();
        let mut lock_name = file_path.as_os_str().to_os_string();
        lock_name.push(".lock");
        Self {
            file_path,
            lock_file_path: PathBuf::from(lock_name),
        }
    }

    /// Returns the path to the storage file
    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Acquire an exclusive lock for writing.
    /// The returned handle must be held for the whole operation.
    fn acquire_write_lock(&self) -> Result<File> {
        if let Some(parent) = self.lock_file_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.lock_file_path)
            .with_context(|| format!("Failed to create lock file: {:?}", self.lock_file_path))?;

        self.wait_for_lock(&lock_file, |f| FileExt::try_lock_exclusive(f))?;

        // Lock holder info, for debugging stuck locks
        let _ = writeln!(
            lock_file,
            "Locked by PID {} at {}",
            std::process::id(),
            chrono::Utc::now().to_rfc3339()
        );

        Ok(lock_file)
    }

    /// Acquire a shared lock for reading, if a lock file exists at all
    fn acquire_read_lock(&self) -> Result<Option<File>> {
        if !self.lock_file_path.exists() {
            return Ok(None);
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .open(&self.lock_file_path)
            .with_context(|| format!("Failed to open lock file: {:?}", self.lock_file_path))?;

        self.wait_for_lock(&lock_file, |f| FileExt::try_lock_shared(f))?;
        Ok(Some(lock_file))
    }

    fn wait_for_lock<F>(&self, lock_file: &File, try_lock: F) -> Result<()>
    where
        F: Fn(&File) -> std::io::Result<()>,
    {
        let start = Instant::now();

        loop {
            match try_lock(lock_file) {
                Ok(()) => return Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    if start.elapsed() > LOCK_TIMEOUT {
                        anyhow::bail!(
                            "Timeout waiting for file lock - another process may be writing: {:?}",
                            self.file_path
                        );
                    }
                    std::thread::sleep(LOCK_POLL_INTERVAL);
                }
                Err(e) => {
                    return Err(e).with_context(|| {
                        format!("Failed to acquire lock on {:?}", self.lock_file_path)
                    })
                }
            }
        }
    }

    /// Reads the file without taking any lock; a missing file is empty data
    fn read_unlocked(&self) -> Result<FamilyData> {
        if !self.file_path.exists() {
            return Ok(FamilyData::new());
        }

        let file = File::open(&self.file_path)
            .with_context(|| format!("Failed to open file: {:?}", self.file_path))?;

        // An empty file is a valid, empty data set
        if file.metadata()?.len() == 0 {
            return Ok(FamilyData::new());
        }

        let reader = BufReader::new(file);
        serde_yaml::from_reader(reader)
            .with_context(|| format!("Failed to parse YAML from {:?}", self.file_path))
    }

    fn write_unlocked(&self, data: &FamilyData) -> Result<()> {
        if let Some(parent) = self.file_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let yaml = serde_yaml::to_string(data)?;
        fs::write(&self.file_path, yaml)
            .with_context(|| format!("Failed to write {:?}", self.file_path))
    }

    /// Loads family data from the YAML file with file locking
    pub fn load(&self) -> Result<FamilyData> {
        let _lock = self.acquire_read_lock()?;
        self.read_unlocked()
    }

    /// Saves family data to the YAML file with file locking
    pub fn save(&self, data: &FamilyData) -> Result<()> {
        let _lock = self.acquire_write_lock()?;
        self.write_unlocked(data)
    }

    /// Perform an atomic update operation with proper locking.
    /// This reloads the file, applies changes, and saves while holding the lock.
    pub fn update_atomically<F>(&self, update_fn: F) -> Result<FamilyData>
    where
        F: FnOnce(&mut FamilyData),
    {
        let _lock = self.acquire_write_lock()?;

        let mut data = self.read_unlocked()?;
        update_fn(&mut data);
        self.write_unlocked(&data)?;

        // Lock is released when _lock is dropped
        Ok(data)
    }
}
