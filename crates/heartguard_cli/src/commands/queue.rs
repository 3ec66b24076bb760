//! Queue inspection commands.

use super::CliFacade;
use heartguard_offline::{HttpMethod, OfflineStatus, PendingMutation};
use serde::Serialize;

/// One pending mutation as listed by `list`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationRow {
    /// Position in replay order, starting at 1.
    pub position: usize,
    /// Mutation ID.
    pub id: String,
    /// HTTP method.
    pub method: HttpMethod,
    /// API endpoint.
    pub endpoint: String,
    /// Failed attempts so far.
    pub sync_attempts: u32,
    /// Enqueue time in milliseconds since the Unix epoch.
    pub created_at: u64,
    /// JSON payload.
    pub payload: serde_json::Value,
}

impl MutationRow {
    fn new(position: usize, mutation: PendingMutation) -> Self {
        Self {
            position,
            id: mutation.id.to_string(),
            method: mutation.method,
            endpoint: mutation.endpoint,
            sync_attempts: mutation.sync_attempts,
            created_at: mutation.created_at,
            payload: mutation.payload,
        }
    }
}

/// Runs the enqueue command.
pub fn enqueue(
    facade: &CliFacade,
    endpoint: &str,
    method: HttpMethod,
    payload: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let payload: serde_json::Value =
        serde_json::from_str(payload).map_err(|e| format!("Invalid JSON payload: {e}"))?;
    let id = facade.store_offline_data(endpoint, method, payload)?;
    println!("Queued {} {} as {}", method, endpoint, id);
    Ok(())
}

/// Runs the list command.
pub fn list(facade: &CliFacade, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let rows: Vec<MutationRow> = facade
        .pending_mutations()?
        .into_iter()
        .enumerate()
        .map(|(i, m)| MutationRow::new(i + 1, m))
        .collect();

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&rows)?),
        "text" => print_rows(&rows),
        other => return Err(format!("Unknown format: {other}").into()),
    }
    Ok(())
}

fn print_rows(rows: &[MutationRow]) {
    if rows.is_empty() {
        println!("No pending mutations");
        return;
    }

    for row in rows {
        println!(
            "{:>4}  {:<6} {:<32} attempts={} id={}",
            row.position, row.method, row.endpoint, row.sync_attempts, row.id
        );
    }
}

/// Output of the status command.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    /// Connectivity and session progress.
    #[serde(flatten)]
    pub status: OfflineStatus,
    /// Bytes held in the data directory's store.
    pub store_bytes: usize,
}

/// Runs the status command.
pub fn status(facade: &CliFacade, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let report = StatusReport {
        status: facade.status(),
        store_bytes: facade.storage_used()?,
    };
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        "text" => print!("{}", render_status(&report)),
        other => return Err(format!("Unknown format: {other}").into()),
    }
    Ok(())
}

fn render_status(report: &StatusReport) -> String {
    let sync = report.status.sync_status;
    format!(
        "Online:  {}\nTotal:   {}\nSynced:  {}\nPending: {}\nStored:  {} bytes\n",
        if report.status.is_online { "yes" } else { "no" },
        sync.total,
        sync.synced,
        sync.pending,
        report.store_bytes
    )
}

/// Runs the clear command.
pub fn clear(facade: &CliFacade) -> Result<(), Box<dyn std::error::Error>> {
    let pending = facade.get_sync_status().pending;
    facade.clear_offline_data()?;
    println!("Cleared {} pending mutation(s) and all cached assets", pending);
    Ok(())
}
