use crate::commands::common::{
    format_history_lines, history_to_item, normalize_document_id, normalize_snapshot_id,
    Context, HistoryItem,
};
use crate::error::CliError;

pub async fn run_history(id: &str, as_json: bool, context: &Context) -> Result<(), CliError> {
    let id = normalize_document_id(id)?;
    let entries = context.history(&id).list().await?;

    if as_json {
        let json_items = entries
            .iter()
            .map(history_to_item)
            .collect::<Vec<HistoryItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No snapshots recorded.");
        return Ok(());
    }

    for line in format_history_lines(&entries) {
        println!("{line}");
    }
    Ok(())
}

pub async fn run_discard(id: &str, snapshot: &str, context: &Context) -> Result<(), CliError> {
    let id = normalize_document_id(id)?;
    let snapshot_id = normalize_snapshot_id(snapshot)?;

    if !context.history(&id).discard(&snapshot_id).await? {
        return Err(CliError::SnapshotNotFound(snapshot_id.to_string()));
    }
    println!("{snapshot_id}");
    Ok(())
}

pub async fn run_purge(id: &str, context: &Context) -> Result<(), CliError> {
    let id = normalize_document_id(id)?;
    let removed = context.history(&id).discard_all().await?;
    println!("Removed {removed} snapshot(s) of {id}");
    Ok(())
}
