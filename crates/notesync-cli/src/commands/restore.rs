use crate::commands::common::{
    ensure_saved, normalize_document_id, normalize_snapshot_id, Context,
};
use crate::error::CliError;

pub async fn run_restore(id: &str, snapshot: &str, context: &Context) -> Result<(), CliError> {
    let id = normalize_document_id(id)?;
    let snapshot_id = normalize_snapshot_id(snapshot)?;

    let handle = context.start(&id).await?;
    let restored = handle.restore(snapshot_id.clone()).await;
    // Push the restored content before tearing down
    let status = handle.flush().await;
    handle.shutdown().await;

    let document = match restored {
        Ok(document) => document,
        Err(notesync_core::Error::NotFound(_)) => {
            return Err(CliError::SnapshotNotFound(snapshot_id.to_string()))
        }
        Err(error) => return Err(error.into()),
    };
    ensure_saved(status?)?;
    println!("{} restored from {snapshot_id} at {}", document.id, document.updated_at);
    Ok(())
}
