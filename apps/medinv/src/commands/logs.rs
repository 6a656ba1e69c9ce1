//! # Log Commands

use medinv_core::LogEntry;

use crate::error::CommandResult;
use crate::state::AppState;

/// The whole audit log, or `No logs available.` when there is none.
pub async fn read_logs(state: &AppState) -> CommandResult<String> {
    Ok(state.audit().read_text().await?)
}

/// The last `limit` parsed entries, oldest first.
pub async fn recent_entries(state: &AppState, limit: usize) -> CommandResult<Vec<LogEntry>> {
    let mut entries = state.audit().entries().await?;
    let skip = entries.len().saturating_sub(limit);
    entries.drain(..skip);
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use medinv_core::AuditAction;
    use medinv_store::NO_LOGS_MESSAGE;

    use super::*;
    use crate::state::tests::test_state;

    #[tokio::test]
    async fn test_missing_log_message() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = test_state(&dir, None);

        assert_eq!(read_logs(&state).await.unwrap(), NO_LOGS_MESSAGE);
        assert!(recent_entries(&state, 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_recent_entries_keeps_the_tail() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = test_state(&dir, None);
        for name in ["A", "B", "C"] {
            state.audit().record_deleted(name).await.unwrap();
        }

        let tail = recent_entries(&state, 2).await.unwrap();
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].details, "Deleted item 'B'");
        assert_eq!(tail[1].action, AuditAction::Delete);

        let text = read_logs(&state).await.unwrap();
        assert_eq!(text.lines().count(), 3);
    }
}
