use notesync_core::sync::Resolution;

use crate::commands::common::{ensure_saved, normalize_document_id, Context};
use crate::error::CliError;

pub async fn run_pull(id: &str, context: &Context) -> Result<(), CliError> {
    if context.remote.is_none() {
        return Err(CliError::RemoteNotConfigured);
    }
    let id = normalize_document_id(id)?;

    let handle = context.start(&id).await?;
    let resolution = handle.sync_now().await;
    let status = handle.flush().await;
    handle.shutdown().await;

    println!("{}", describe_resolution(resolution?));
    ensure_saved(status?)?;
    Ok(())
}

pub const fn describe_resolution(resolution: Option<Resolution>) -> &'static str {
    match resolution {
        None => "Remote has no copy of this document",
        Some(Resolution::Adopt) => "Adopted newer remote copy",
        Some(Resolution::Identical) => "Already up to date",
        Some(Resolution::Stale) => "Local copy is newer; remote copy ignored",
        Some(Resolution::EditInProgress) => "Local edit in progress; remote copy ignored",
    }
}
