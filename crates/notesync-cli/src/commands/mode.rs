use notesync_core::Mode;

use crate::commands::common::{ensure_saved, normalize_document_id, Context};
use crate::error::CliError;

pub async fn run_mode(id: &str, mode: Mode, context: &Context) -> Result<(), CliError> {
    let id = normalize_document_id(id)?;

    let handle = context.start(&id).await?;
    handle.set_mode(mode).await?;
    let status = handle.flush().await?;
    handle.shutdown().await;

    ensure_saved(status)?;
    println!("{id} is now {mode}");
    Ok(())
}
