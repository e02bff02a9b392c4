use std::env;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use notesync_core::config::{RemoteConfig, SyncSettings};
use notesync_core::db::{LibSqlBackend, StoreHandle};
use notesync_core::diagnostics::TracingSink;
use notesync_core::history::{HistoryEntry, VersionHistory};
use notesync_core::remote::{HttpRemoteStore, Offline, PushMessage, RemoteDocument, RemoteStore};
use notesync_core::store::{DurableStore, SaveStatus};
use notesync_core::sync::{SyncCoordinator, SyncHandle};
use notesync_core::{DocumentId, SnapshotId};
use serde::Serialize;

use crate::error::CliError;

const DB_PATH_ENV: &str = "NOTESYNC_DB_PATH";
const REMOTE_URL_ENV: &str = "NOTESYNC_REMOTE_URL";
const REMOTE_TOKEN_ENV: &str = "NOTESYNC_REMOTE_TOKEN";

/// Everything a command needs to reach the store and the remote
pub struct Context {
    pub db_path: PathBuf,
    pub settings: SyncSettings,
    pub remote: Option<RemoteConfig>,
}

impl Context {
    pub fn from_env(
        cli_db_path: Option<PathBuf>,
        settings_path: Option<&Path>,
    ) -> Result<Self, CliError> {
        let settings = match settings_path {
            Some(path) => SyncSettings::load_from_path(path)
                .map_err(|error| CliError::Config(format!("{}: {error}", path.display())))?,
            None => SyncSettings::default(),
        };
        let remote = remote_config(env::var(REMOTE_URL_ENV).ok(), env::var(REMOTE_TOKEN_ENV).ok())?;

        Ok(Self {
            db_path: resolve_db_path(cli_db_path, env::var(DB_PATH_ENV).ok()),
            settings,
            remote,
        })
    }

    pub fn open_store(&self) -> Arc<DurableStore<LibSqlBackend>> {
        let handle = StoreHandle::libsql(self.db_path.clone());
        Arc::new(DurableStore::new(
            Arc::new(handle),
            self.settings.retry.clone(),
            Arc::new(TracingSink),
        ))
    }

    pub fn remote(&self) -> Result<CliRemote, CliError> {
        match &self.remote {
            Some(config) => Ok(CliRemote::Http(HttpRemoteStore::new(config.clone())?)),
            None => Ok(CliRemote::Offline(Offline)),
        }
    }

    /// Start a coordinator for one document on this context's store
    pub async fn start(&self, id: &DocumentId) -> Result<SyncHandle, CliError> {
        let coordinator = SyncCoordinator::new(id.clone(), self.open_store(), Arc::new(self.remote()?))
            .with_settings(self.settings.clone());
        Ok(coordinator.spawn().await)
    }

    pub fn history(&self, id: &DocumentId) -> VersionHistory<LibSqlBackend> {
        VersionHistory::new(self.open_store(), id.clone())
    }
}

/// Remote chosen at runtime from the environment
pub enum CliRemote {
    Http(HttpRemoteStore),
    Offline(Offline),
}

impl RemoteStore for CliRemote {
    async fn fetch(&self, id: &DocumentId) -> notesync_core::Result<Option<RemoteDocument>> {
        match self {
            Self::Http(remote) => remote.fetch(id).await,
            Self::Offline(remote) => remote.fetch(id).await,
        }
    }

    async fn push(&self, message: &PushMessage) -> notesync_core::Result<()> {
        match self {
            Self::Http(remote) => remote.push(message).await,
            Self::Offline(remote) => remote.push(message).await,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HistoryItem {
    pub id: String,
    pub preview: String,
    pub mode: String,
    pub updated_at: i64,
    pub updated_at_iso: String,
    pub checksum: String,
}

pub fn history_to_item(entry: &HistoryEntry) -> HistoryItem {
    HistoryItem {
        id: entry.snapshot.id.to_string(),
        preview: entry.preview.clone(),
        mode: entry.snapshot.mode.to_string(),
        updated_at: entry.snapshot.updated_at,
        updated_at_iso: format_timestamp(entry.snapshot.updated_at),
        checksum: entry.snapshot.checksum.to_hex(),
    }
}

pub fn format_history_lines(entries: &[HistoryEntry]) -> Vec<String> {
    entries
        .iter()
        .map(|entry| {
            let when = format_timestamp(entry.snapshot.updated_at);
            let mode = entry.snapshot.mode.as_str();
            format!("{}  {when}  {mode:<6}  {}", entry.snapshot.id, entry.preview)
        })
        .collect()
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    Utc.timestamp_millis_opt(timestamp_ms)
        .single()
        .map_or_else(|| timestamp_ms.to_string(), |time| time.format("%Y-%m-%d %H:%M:%S").to_string())
}

pub const fn describe_status(status: SaveStatus) -> &'static str {
    match status {
        SaveStatus::Idle => "idle",
        SaveStatus::Saving => "saving",
        SaveStatus::Success => "saved",
        SaveStatus::Error => "failed",
    }
}

pub fn ensure_saved(status: SaveStatus) -> Result<(), CliError> {
    if status == SaveStatus::Error {
        Err(CliError::SaveFailed)
    } else {
        Ok(())
    }
}

pub fn normalize_document_id(id: &str) -> Result<DocumentId, CliError> {
    id.parse().map_err(|_| CliError::EmptyDocumentId)
}

pub fn normalize_snapshot_id(id: &str) -> Result<SnapshotId, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptySnapshotId)
    } else {
        Ok(SnapshotId::new(trimmed))
    }
}

/// Content from arguments, falling back to piped stdin
pub fn resolve_content(content_parts: &[String]) -> Result<String, CliError> {
    if !content_parts.is_empty() {
        return normalize_content(&content_parts.join(" ")).ok_or(CliError::EmptyContent);
    }
    read_piped_stdin()?.ok_or(CliError::EmptyContent)
}

pub fn normalize_content(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    Ok(normalize_content(&buffer))
}

pub fn remote_config(
    url: Option<String>,
    token: Option<String>,
) -> Result<Option<RemoteConfig>, CliError> {
    let Some(url) = url.filter(|url| !url.trim().is_empty()) else {
        return Ok(None);
    };
    let config = RemoteConfig::new(url)
        .map_err(|error| CliError::Config(format!("{REMOTE_URL_ENV}: {error}")))?;
    Ok(Some(config.with_token(token)))
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>, env_db_path: Option<String>) -> PathBuf {
    cli_db_path
        .or_else(|| {
            env_db_path
                .filter(|path| !path.trim().is_empty())
                .map(PathBuf::from)
        })
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("notesync")
        .join("notesync.db")
}
