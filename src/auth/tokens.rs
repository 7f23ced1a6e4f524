//! Access / refresh token storage.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The bearer credentials issued by `/auth/signin` and `/auth/refresh`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
}

impl std::fmt::Debug for AuthTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthTokens")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum TokenStoreError {
    #[error("token file IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("token file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

impl From<TokenStoreError> for crate::error::GovernorError {
    fn from(err: TokenStoreError) -> Self {
        crate::error::GovernorError::TokenStore(err.to_string())
    }
}

/// Where the client keeps its tokens between calls.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Option<AuthTokens>;
    fn store(&self, tokens: &AuthTokens) -> Result<(), TokenStoreError>;
    fn clear(&self) -> Result<(), TokenStoreError>;
}

/// Tokens held only for the lifetime of the process.
#[derive(Default)]
pub struct MemoryTokenStore {
    current: ArcSwapOption<AuthTokens>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(tokens: AuthTokens) -> Self {
        Self {
            current: ArcSwapOption::from_pointee(tokens),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Option<AuthTokens> {
        self.current.load_full().map(|t| (*t).clone())
    }

    fn store(&self, tokens: &AuthTokens) -> Result<(), TokenStoreError> {
        self.current.store(Some(Arc::new(tokens.clone())));
        Ok(())
    }

    fn clear(&self) -> Result<(), TokenStoreError> {
        self.current.store(None);
        Ok(())
    }
}

/// Tokens mirrored to a JSON file so they survive restarts.
pub struct FileTokenStore {
    path: PathBuf,
    current: ArcSwapOption<AuthTokens>,
}

impl FileTokenStore {
    /// Open a store at `path`, loading existing tokens if the file exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TokenStoreError> {
        let path = path.as_ref().to_path_buf();
        let store = Self {
            path,
            current: ArcSwapOption::empty(),
        };

        if store.path.exists() {
            let reader = BufReader::new(File::open(&store.path)?);
            let tokens: AuthTokens = serde_json::from_reader(reader)?;
            store.current.store(Some(Arc::new(tokens)));
            tracing::debug!(path = %store.path.display(), "Loaded stored tokens");
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Option<AuthTokens> {
        self.current.load_full().map(|t| (*t).clone())
    }

    fn store(&self, tokens: &AuthTokens) -> Result<(), TokenStoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let writer = BufWriter::new(File::create(&self.path)?);
        serde_json::to_writer_pretty(writer, tokens)?;
        self.current.store(Some(Arc::new(tokens.clone())));
        Ok(())
    }

    fn clear(&self) -> Result<(), TokenStoreError> {
        self.current.store(None);
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
