use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use triage_client::ClientSettings;
use triage_logging::triage_info;

const CREDENTIALS_FILENAME: &str = "triage.ron";

/// Where and as whom the CLI talks to the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub root_url: String,
    pub token: String,
}

impl Credentials {
    pub fn settings(&self) -> ClientSettings {
        ClientSettings::new(self.token.clone()).with_root_url(self.root_url.clone())
    }
}

#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("no user configuration directory on this platform, pass --config")]
    NoConfigDir,
    #[error("no credentials at {0:?}, run `triage authenticate <token>` first")]
    Missing(PathBuf),
    #[error("credentials already exist at {0:?}, pass --force to replace them")]
    Exists(PathBuf),
    #[error("failed to parse credentials at {path:?}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("failed to serialize credentials: {0}")]
    Serialize(String),
    #[error("io error on {path:?}: {source}")]
    Io { path: PathBuf, source: io::Error },
}

/// `triage.ron` in the user's configuration directory.
pub fn default_path() -> Result<PathBuf, CredentialsError> {
    dirs::config_dir()
        .map(|dir| dir.join(CREDENTIALS_FILENAME))
        .ok_or(CredentialsError::NoConfigDir)
}

pub fn load(path: &Path) -> Result<Credentials, CredentialsError> {
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(CredentialsError::Missing(path.to_path_buf()));
        }
        Err(source) => {
            return Err(CredentialsError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    ron::from_str(&content).map_err(|err| CredentialsError::Parse {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}

/// Writes `credentials` through a temp file in the same directory so a
/// crash never leaves a half-written file behind.
pub fn save(path: &Path, credentials: &Credentials, force: bool) -> Result<(), CredentialsError> {
    if path.exists() && !force {
        return Err(CredentialsError::Exists(path.to_path_buf()));
    }
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let io_err = |source: io::Error| CredentialsError::Io {
        path: path.to_path_buf(),
        source,
    };
    fs::create_dir_all(&dir).map_err(io_err)?;

    let pretty = ron::ser::PrettyConfig::new();
    let content = ron::ser::to_string_pretty(credentials, pretty)
        .map_err(|err| CredentialsError::Serialize(err.to_string()))?;

    let mut tmp = NamedTempFile::new_in(&dir).map_err(io_err)?;
    tmp.write_all(content.as_bytes()).map_err(io_err)?;
    tmp.flush().map_err(io_err)?;
    tmp.as_file_mut().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|err| io_err(err.error))?;

    triage_info!("wrote credentials to {:?}", path);
    Ok(())
}
