//! Persisted transaction-id counter
//!
//! mode2 tags every transaction with an 8-bit id so stale replies can be
//! told apart from current ones. The counter lives in a dotfile (one
//! decimal integer) so ids keep advancing across invocations. There is
//! deliberately no file locking: concurrent invocations can grab the same
//! id, which only weakens reply disambiguation for those two transactions.
//! Locking would change the on-disk contract for existing setups sharing
//! the file.

use crate::error::Error;
use rand::Rng;
use std::fs;
use std::path::{Path, PathBuf};

/// File-backed transaction-id counter
#[derive(Debug, Clone)]
pub struct TidCounter {
    path: PathBuf,
}

impl TidCounter {
    /// Use the counter file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Default location: `$HOME/.tid`, falling back to the working directory
    pub fn default_path() -> PathBuf {
        match std::env::var_os("HOME") {
            Some(home) => Path::new(&home).join(".tid"),
            None => PathBuf::from(".tid"),
        }
    }

    /// Path of the counter file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Fetch the current id and advance the stored counter.
    ///
    /// A missing or unparsable file reseeds the counter at a random value
    /// instead of failing; only an unwritable file is an error. The stored
    /// integer grows without bound and wraps to 8 bits on use.
    pub fn next(&self) -> Result<u8, Error> {
        let current: i64 = fs::read_to_string(&self.path)
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or_else(|| i64::from(rand::thread_rng().gen::<u8>()));

        fs::write(&self.path, format!("{}\n", current + 1)).map_err(|source| Error::TidFile {
            path: self.path.clone(),
            source,
        })?;

        Ok((current & 0xff) as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_advances_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tid");
        fs::write(&path, "41\n").unwrap();

        let counter = TidCounter::new(&path);
        assert_eq!(counter.next().unwrap(), 41);
        assert_eq!(counter.next().unwrap(), 42);

        // A fresh instance continues from the file, not from memory
        let counter = TidCounter::new(&path);
        assert_eq!(counter.next().unwrap(), 43);
    }

    #[test]
    fn test_wraps_at_256() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tid");
        fs::write(&path, "255\n").unwrap();

        let counter = TidCounter::new(&path);
        assert_eq!(counter.next().unwrap(), 255);
        assert_eq!(counter.next().unwrap(), 0);

        // A full cycle of 256 increments lands back on 255 (8-bit truncation)
        for _ in 0..254 {
            counter.next().unwrap();
        }
        assert_eq!(counter.next().unwrap(), 255);
    }

    #[test]
    fn test_missing_file_reseeds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tid");

        let counter = TidCounter::new(&path);
        let first = counter.next().unwrap();

        // Whatever the seed was, the successor is now persisted
        let next = counter.next().unwrap();
        assert_eq!(next, first.wrapping_add(1));
    }

    #[test]
    fn test_garbage_file_reseeds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tid");
        fs::write(&path, "not a number\n").unwrap();

        let counter = TidCounter::new(&path);
        counter.next().unwrap();
        let stored: i64 = fs::read_to_string(&path).unwrap().trim().parse().unwrap();
        assert!(stored >= 1);
    }
}
