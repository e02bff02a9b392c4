use crate::commands::common::{ensure_saved, normalize_document_id, Context};
use crate::error::CliError;

pub async fn run_save(id: &str, force: bool, context: &Context) -> Result<(), CliError> {
    let id = normalize_document_id(id)?;

    let handle = context.start(&id).await?;
    let outcome = if force {
        handle.checkpoint().await
    } else {
        handle.save().await
    };
    handle.shutdown().await;
    let outcome = outcome?;

    ensure_saved(outcome.status)?;
    match outcome.snapshot {
        Some(snapshot) => println!("{}", snapshot.id),
        None => println!("No changes since the last snapshot"),
    }
    Ok(())
}
