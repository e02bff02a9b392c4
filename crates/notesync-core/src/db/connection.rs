//! Opening and preparing libSQL databases

use std::path::PathBuf;

use libsql::{Builder, Connection};

use super::migrations;
use crate::error::Result;

/// Where a libSQL database lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    File(PathBuf),
    Memory,
}

impl Location {
    /// Path handed to libSQL; creates missing parent directories for files
    fn prepare(&self) -> Result<PathBuf> {
        match self {
            Self::File(path) => {
                if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                Ok(path.clone())
            }
            Self::Memory => Ok(PathBuf::from(":memory:")),
        }
    }
}

/// A database together with the one connection every statement goes through
pub struct Connected {
    pub database: libsql::Database,
    pub conn: Connection,
}

/// Open the database, tune it for durable writes, and bring the schema up to date
pub async fn connect(location: &Location) -> Result<Connected> {
    let database = Builder::new_local(location.prepare()?).build().await?;
    let conn = database.connect()?;

    if matches!(location, Location::File(_)) {
        // journal_mode answers with a row, so it has to go through query()
        if let Err(error) = conn.query("PRAGMA journal_mode = WAL", ()).await {
            tracing::warn!(%error, "Could not enable WAL journal");
        }
    }
    conn.execute("PRAGMA synchronous = FULL", ()).await?;

    migrations::migrate(&conn).await?;
    Ok(Connected { database, conn })
}
