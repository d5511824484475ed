//! Persistent storage for the access/refresh token pair.
//!
//! The store has exactly two named slots. `purge` is the one compound
//! operation: after it returns, both slots read back empty - never just
//! one. Tokens are stored in the clear; the file store is a convenience,
//! not a vault.

use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Token file name in the cache directory
const TOKEN_FILE: &str = "tokens.json";

/// Application name used for cache directory paths
const APP_NAME: &str = "hiredesk";

/// The two credential slots the client persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSlot {
    Access,
    Refresh,
}

/// Durable key-value storage for the token pair, injected into the
/// session manager and the request pipeline.
pub trait TokenStore: Send + Sync {
    fn get(&self, slot: TokenSlot) -> Result<Option<String>>;

    fn set(&self, slot: TokenSlot, value: &str) -> Result<()>;

    fn remove(&self, slot: TokenSlot) -> Result<()>;

    /// Remove both tokens in one operation.
    fn purge(&self) -> Result<()>;

    /// Replace both tokens, as after a successful login.
    fn store_pair(&self, access: &str, refresh: &str) -> Result<()> {
        self.set(TokenSlot::Access, access)?;
        self.set(TokenSlot::Refresh, refresh)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct StoredTokens {
    access_token: Option<String>,
    refresh_token: Option<String>,
}

impl StoredTokens {
    fn slot(&self, slot: TokenSlot) -> &Option<String> {
        match slot {
            TokenSlot::Access => &self.access_token,
            TokenSlot::Refresh => &self.refresh_token,
        }
    }

    fn slot_mut(&mut self, slot: TokenSlot) -> &mut Option<String> {
        match slot {
            TokenSlot::Access => &mut self.access_token,
            TokenSlot::Refresh => &mut self.refresh_token,
        }
    }
}

/// Token store backed by a JSON file under the platform cache directory,
/// surviving application restarts. Every mutation rewrites the whole
/// file, so `purge` is a single file removal.
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    /// Store at the default location (`<cache>/hiredesk/tokens.json`).
    pub fn new() -> Result<Self> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(Self {
            path: cache_dir.join(APP_NAME).join(TOKEN_FILE),
        })
    }

    /// Store at an explicit path. Used by tests and embedders with their
    /// own storage layout.
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    fn read(&self) -> Result<StoredTokens> {
        if self.path.exists() {
            let contents = std::fs::read_to_string(&self.path)
                .context("Failed to read token file")?;
            serde_json::from_str(&contents).context("Failed to parse token file")
        } else {
            Ok(StoredTokens::default())
        }
    }

    fn write(&self, tokens: &StoredTokens) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create token directory")?;
        }
        let contents = serde_json::to_string_pretty(tokens)?;
        std::fs::write(&self.path, contents).context("Failed to write token file")
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self, slot: TokenSlot) -> Result<Option<String>> {
        Ok(self.read()?.slot(slot).clone())
    }

    fn set(&self, slot: TokenSlot, value: &str) -> Result<()> {
        let mut tokens = self.read()?;
        *tokens.slot_mut(slot) = Some(value.to_string());
        self.write(&tokens)
    }

    fn remove(&self, slot: TokenSlot) -> Result<()> {
        let mut tokens = self.read()?;
        if tokens.slot(slot).is_none() {
            return Ok(());
        }
        *tokens.slot_mut(slot) = None;
        self.write(&tokens)
    }

    fn purge(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path).context("Failed to remove token file")?;
            debug!(path = %self.path.display(), "Token file removed");
        }
        Ok(())
    }

    fn store_pair(&self, access: &str, refresh: &str) -> Result<()> {
        self.write(&StoredTokens {
            access_token: Some(access.to_string()),
            refresh_token: Some(refresh.to_string()),
        })
    }
}

/// In-memory token store. Backs tests, and front ends that keep tokens
/// in volatile storage for the lifetime of the process.
#[derive(Default)]
pub struct MemoryTokenStore {
    inner: Mutex<StoredTokens>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, StoredTokens>> {
        self.inner
            .lock()
            .map_err(|_| anyhow::anyhow!("Token store mutex poisoned"))
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self, slot: TokenSlot) -> Result<Option<String>> {
        Ok(self.lock()?.slot(slot).clone())
    }

    fn set(&self, slot: TokenSlot, value: &str) -> Result<()> {
        *self.lock()?.slot_mut(slot) = Some(value.to_string());
        Ok(())
    }

    fn remove(&self, slot: TokenSlot) -> Result<()> {
        *self.lock()?.slot_mut(slot) = None;
        Ok(())
    }

    fn purge(&self) -> Result<()> {
        *self.lock()? = StoredTokens::default();
        Ok(())
    }

    fn store_pair(&self, access: &str, refresh: &str) -> Result<()> {
        *self.lock()? = StoredTokens {
            access_token: Some(access.to_string()),
            refresh_token: Some(refresh.to_string()),
        };
        Ok(())
    }
}
