//! Key=value settings source shared with the managed services.
//!
//! The managed project keeps its runtime settings in a dotenv-style file. The
//! supervisor only reads it to learn which ports the services were told to
//! listen on; it never writes the file and never enforces the values.

use std::collections::BTreeMap;
use std::fs::File;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

/// Parsed key=value settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    values: BTreeMap<String, String>,
}

impl Settings {
    /// Reads settings from `path`; a missing file yields empty settings.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Read`] when the file exists but cannot be read.
    pub fn load(path: &Utf8Path) -> Result<Self, SettingsError> {
        let read_error = |source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        };
        let file = match File::open(path) {
            Ok(file) => file,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => return Err(read_error(source)),
        };
        Self::collect(dotenvy::from_read_iter(file)).map_err(read_error)
    }

    /// Parses settings text. Malformed lines are ignored.
    #[must_use]
    pub fn parse(content: &str) -> Self {
        Self::collect(dotenvy::from_read_iter(content.as_bytes())).unwrap_or_default()
    }

    /// Raw value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Port number stored under `key`, when present and valid.
    #[must_use]
    pub fn port(&self, key: &str) -> Option<u16> {
        self.get(key)?.parse().ok().filter(|port| *port != 0)
    }

    /// Keeps every parsed assignment, skipping lines dotenv syntax rejects.
    fn collect<I>(entries: I) -> Result<Self, io::Error>
    where
        I: IntoIterator<Item = Result<(String, String), dotenvy::Error>>,
    {
        let mut values = BTreeMap::new();
        for entry in entries {
            match entry {
                Ok((key, value)) => {
                    values.insert(key, value);
                }
                Err(dotenvy::Error::Io(error)) => return Err(error),
                Err(_) => {}
            }
        }
        Ok(Self { values })
    }
}

/// Errors raised while reading the settings source.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file exists but could not be read.
    #[error("failed to read settings file '{path}': {source}")]
    Read {
        /// Settings file path.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}
