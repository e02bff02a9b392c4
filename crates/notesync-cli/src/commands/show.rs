use crate::commands::common::{normalize_document_id, Context};
use crate::error::CliError;

pub async fn run_show(id: &str, context: &Context) -> Result<(), CliError> {
    let id = normalize_document_id(id)?;
    let store = context.open_store();

    // Missing and corrupt documents both print nothing
    if let Some(document) = store.get(&id).await {
        println!("{}", document.content);
    }
    Ok(())
}
