//! Sync command implementation.

use super::CliFacade;
use heartguard_offline::SyncPassResult;

/// Runs one sync pass and prints what happened.
pub async fn run(facade: &CliFacade) -> Result<(), Box<dyn std::error::Error>> {
    let result = facade.sync_offline_data().await;
    print!("{}", render(&result));

    if let Some(reason) = result.abort_reason {
        return Err(format!("Sync aborted: {reason}").into());
    }
    Ok(())
}

fn render(result: &SyncPassResult) -> String {
    let mut out = format!(
        "Attempted: {}\nSynced:    {}\nFailed:    {}\nRemaining: {}\nDuration:  {:?}\n",
        result.attempted,
        result.synced,
        result.failed.len(),
        result.remaining,
        result.duration
    );
    for failure in &result.failed {
        let retry = if failure.retryable { "will retry" } else { "permanent" };
        out.push_str(&format!(
            "  FAILED {} (attempt {}, {}): {}\n",
            failure.endpoint, failure.sync_attempts, retry, failure.reason
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use heartguard_offline::{MutationId, SyncItemFailed};
    use std::time::Duration;

    #[test]
    fn render_lists_failures() {
        let result = SyncPassResult {
            attempted: 2,
            synced: 1,
            failed: vec![SyncItemFailed {
                id: MutationId::new(),
                endpoint: "/api/log/1".into(),
                sync_attempts: 1,
                reason: "HTTP 500".into(),
                retryable: true,
            }],
            abort_reason: None,
            remaining: 1,
            duration: Duration::from_millis(5),
        };

        let text = render(&result);
        assert!(text.contains("Synced:    1"));
        assert!(text.contains("FAILED /api/log/1 (attempt 1, will retry): HTTP 500"));
    }
}
