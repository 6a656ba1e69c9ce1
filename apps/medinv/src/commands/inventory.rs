//! # Inventory Commands
//!
//! Add, edit, delete and list records.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  validate input ──► RecordStore (locked write) ──► AuditLog ──► nudge  │
//! │                                                                         │
//! │  An audit write failure is logged; the record change stands.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use medinv_core::validation::{new_record_from_input, patch_from_input, validate_search_query};
use medinv_core::InventoryRecord;
use tracing::error;

use crate::error::{CommandError, CommandResult};
use crate::state::AppState;

/// How the operator names a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordRef {
    Id(i64),
    /// Exact item name.
    Name(String),
}

/// Raw form fields for a new or edited record.
#[derive(Debug, Clone, Default)]
pub struct RecordForm {
    pub name: Option<String>,
    pub doses: Option<String>,
    pub expiry: Option<String>,
    pub description: Option<String>,
}

async fn resolve(state: &AppState, target: &RecordRef) -> CommandResult<i64> {
    match target {
        RecordRef::Id(id) => Ok(*id),
        RecordRef::Name(name) => state
            .store()
            .find_by_name(name.trim())
            .await?
            .map(|r| r.id)
            .ok_or_else(|| CommandError::not_found("Item", format!("'{}'", name.trim()))),
    }
}

/// Validates the form, appends the record and logs an `Add` entry.
pub async fn add_record(state: &AppState, form: &RecordForm) -> CommandResult<InventoryRecord> {
    let new = new_record_from_input(
        form.name.as_deref().unwrap_or_default(),
        form.doses.as_deref().unwrap_or_default(),
        form.expiry.as_deref(),
        form.description.as_deref(),
    )?;

    let record = state.store().append(new).await?;

    if let Err(e) = state.audit().record_added(&record).await {
        error!(error = %e, id = record.id, "Failed to write add audit entry");
    }
    state.nudge_sync();

    Ok(record)
}

/// Applies the non-empty form fields to an existing record.
///
/// The audit entry names the item as it was before the edit.
pub async fn update_record(
    state: &AppState,
    target: &RecordRef,
    form: &RecordForm,
) -> CommandResult<InventoryRecord> {
    let patch = patch_from_input(
        form.name.as_deref(),
        form.doses.as_deref(),
        form.expiry.as_deref(),
        form.description.as_deref(),
    )?;
    if patch.is_empty() {
        return Err(CommandError::validation("Nothing to update"));
    }

    let id = resolve(state, target).await?;
    let mut original_name = String::new();
    let record = state
        .store()
        .update(id, |r| {
            original_name = r.name.clone();
            patch.apply(r);
            Ok(())
        })
        .await?;

    if let Err(e) = state.audit().record_updated(&original_name).await {
        error!(error = %e, id, "Failed to write update audit entry");
    }
    state.nudge_sync();

    Ok(record)
}

pub async fn delete_record(state: &AppState, target: &RecordRef) -> CommandResult<InventoryRecord> {
    let id = resolve(state, target).await?;
    let removed = state.store().remove(id).await?;

    if let Err(e) = state.audit().record_deleted(&removed.name).await {
        error!(error = %e, id, "Failed to write delete audit entry");
    }
    state.nudge_sync();

    Ok(removed)
}

/// All records, or those whose rendered block contains `search`
/// (case-insensitive).
pub async fn list_records(state: &AppState, search: Option<&str>) -> CommandResult<Vec<InventoryRecord>> {
    match search {
        Some(query) => {
            let query = validate_search_query(query)?;
            Ok(state.store().search(&query).await?)
        }
        None => Ok(state.store().read_all().await?),
    }
}

#[cfg(test)]
mod tests {
    use medinv_core::AuditAction;

    use super::*;
    use crate::error::ErrorCode;
    use crate::state::tests::test_state;

    fn form(name: &str, doses: &str) -> RecordForm {
        RecordForm {
            name: Some(name.to_string()),
            doses: Some(doses.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_add_update_delete_with_audit() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = test_state(&dir, None);

        let added = add_record(
            &state,
            &RecordForm {
                expiry: Some("12/31/2030".into()),
                ..form("Amoxicillin", "20")
            },
        )
        .await
        .unwrap();
        assert_eq!(added.id, 1);
        assert!(added.expiry.is_some());

        let updated = update_record(
            &state,
            &RecordRef::Name("Amoxicillin".into()),
            &RecordForm {
                name: Some("Amoxicillin 500mg".into()),
                doses: Some("18".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.name, "Amoxicillin 500mg");
        assert_eq!(updated.dose_count, 18);
        assert_eq!(updated.expiry, added.expiry);

        let removed = delete_record(&state, &RecordRef::Id(1)).await.unwrap();
        assert_eq!(removed.name, "Amoxicillin 500mg");
        assert!(list_records(&state, None).await.unwrap().is_empty());

        let entries = state.audit().entries().await.unwrap();
        let actions: Vec<_> = entries.iter().map(|e| e.action.clone()).collect();
        assert_eq!(actions, vec![AuditAction::Add, AuditAction::Update, AuditAction::Delete]);
        assert_eq!(entries[0].details, "Added item 'Amoxicillin' with ID 1");
        assert_eq!(entries[1].details, "Updated item 'Amoxicillin'");
        assert_eq!(entries[2].details, "Deleted item 'Amoxicillin 500mg'");
    }

    #[tokio::test]
    async fn test_invalid_input_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = test_state(&dir, None);

        let err = add_record(&state, &form("", "5")).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        let err = add_record(&state, &form("Saline", "-1")).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        assert!(list_records(&state, None).await.unwrap().is_empty());
        assert!(state.audit().entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_name_with_line_break_cannot_forge_audit_lines() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = test_state(&dir, None);

        let forged = "Gauze\n[01/01/2020 00:00] Delete: Deleted item 'Morphine'";
        let err = add_record(&state, &form(forged, "5")).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        add_record(&state, &form("Gauze", "5")).await.unwrap();
        let err = update_record(
            &state,
            &RecordRef::Id(1),
            &RecordForm {
                description: Some("sterile\r\n[01/01/2020 00:00] Delete: x".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        let entries = state.audit().entries().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, AuditAction::Add);
    }

    #[tokio::test]
    async fn test_update_requires_a_field_and_known_target() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = test_state(&dir, None);
        add_record(&state, &form("Saline", "5")).await.unwrap();

        let err = update_record(&state, &RecordRef::Id(1), &RecordForm::default())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        let err = update_record(&state, &RecordRef::Id(9), &form("X", "1"))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);

        let err = delete_record(&state, &RecordRef::Name("Nope".into()))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_search_matches_rendered_block() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = test_state(&dir, None);
        add_record(&state, &form("Ibuprofen", "10")).await.unwrap();
        add_record(
            &state,
            &RecordForm {
                description: Some("for fever".into()),
                ..form("Paracetamol", "4")
            },
        )
        .await
        .unwrap();

        let hits = list_records(&state, Some("FEVER")).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Paracetamol");

        assert_eq!(list_records(&state, Some("")).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_mutation_marks_sync_pending() {
        let dir = tempfile::tempdir().unwrap();
        let (state, mirror) = test_state(&dir, Some(true));

        add_record(&state, &form("Saline", "5")).await.unwrap();
        state.flush().await;

        assert_eq!(mirror.inserted.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
