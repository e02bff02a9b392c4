use crate::commands::common::{
    describe_status, ensure_saved, normalize_document_id, resolve_content, Context,
};
use crate::error::CliError;

pub async fn run_write(id: &str, content_parts: &[String], context: &Context) -> Result<(), CliError> {
    let id = normalize_document_id(id)?;
    let content = resolve_content(content_parts)?;

    let handle = context.start(&id).await?;
    handle.edit(content).await?;
    let status = handle.flush().await?;
    let document = handle.document();
    handle.shutdown().await;

    ensure_saved(status)?;
    println!("{} {} ({})", document.id, document.updated_at, describe_status(status));
    Ok(())
}
