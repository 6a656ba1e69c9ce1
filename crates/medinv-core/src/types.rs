//! # Domain Types
//!
//! Core domain types used throughout MedInv.
//!
//! ## Type Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │ InventoryRecord │   │    LogEntry     │   │   SyncStatus    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (i64, ≥1)   │   │  timestamp      │   │  state          │       │
//! │  │  name           │   │  action         │   │  last_sync      │       │
//! │  │  dose_count     │   │  details        │   │  last_error     │       │
//! │  │  expiry?        │   │  (append-only)  │   │                 │       │
//! │  │  description?   │   │                 │   │                 │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   NewRecord     │   │  RecordPatch    │   │   ScanEvent     │       │
//! │  │  (no id yet)    │   │  (all optional) │   │  tag_id         │       │
//! │  │                 │   │                 │   │  observed_at    │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## On-Disk Shape
//! Records serialize with the field names the inventory file has always
//! used, so files written by earlier tooling load unchanged:
//! ```json
//! {"_id": 3, "Item": "Ibuprofen", "Doses": 20, "Expiry": "04/30/2027"}
//! ```

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::{LOG_TIMESTAMP_FORMAT, RECORD_SEPARATOR_WIDTH};

// =============================================================================
// Inventory Record
// =============================================================================

/// A single inventory line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryRecord {
    /// Unique identifier, allocated by the record store (≥ 1).
    #[serde(rename = "_id")]
    pub id: i64,

    /// Display name shown to the operator.
    #[serde(rename = "Item")]
    pub name: String,

    /// Doses remaining.
    #[serde(rename = "Doses")]
    pub dose_count: i64,

    /// Expiration date (`MM/DD/YYYY` on disk).
    #[serde(
        rename = "Expiry",
        default,
        skip_serializing_if = "Option::is_none",
        with = "mdy_date"
    )]
    pub expiry: Option<NaiveDate>,

    /// Free-form description.
    #[serde(
        rename = "Description",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<String>,
}

impl InventoryRecord {
    /// Builds a record from a [`NewRecord`] and the id the store allocated.
    pub fn from_new(id: i64, new: NewRecord) -> Self {
        InventoryRecord {
            id,
            name: new.name,
            dose_count: new.dose_count,
            expiry: new.expiry,
            description: new.description,
        }
    }

    /// Removes one dose.
    ///
    /// Returns the remaining count, or [`CoreError::OutOfStock`] when the
    /// record is already at zero.
    pub fn decrement_dose(&mut self) -> CoreResult<i64> {
        if self.dose_count <= 0 {
            return Err(CoreError::OutOfStock {
                id: self.id,
                name: self.name.clone(),
            });
        }

        self.dose_count -= 1;
        Ok(self.dose_count)
    }

    /// Renders the record as the plain-text block shown in listings.
    ///
    /// ```text
    /// ID: 3
    /// Item: Ibuprofen
    /// Doses: 20
    /// Expiry: 04/30/2027
    /// ----------------------------------------
    /// ```
    pub fn render_block(&self) -> String {
        let mut block = format!(
            "ID: {}\nItem: {}\nDoses: {}\n",
            self.id, self.name, self.dose_count
        );

        if let Some(expiry) = self.expiry {
            block.push_str(&format!("Expiry: {}\n", expiry.format(crate::DATE_FORMAT)));
        }
        if let Some(ref description) = self.description {
            block.push_str(&format!("Description: {}\n", description));
        }

        block.push_str(&"-".repeat(RECORD_SEPARATOR_WIDTH));
        block.push('\n');
        block
    }

    /// Case-insensitive search over the rendered block.
    ///
    /// An empty (or whitespace-only) query matches every record.
    pub fn matches_query(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }

        self.render_block()
            .lines()
            .any(|line| line.to_lowercase().contains(&query))
    }
}

/// A record that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
    pub name: String,
    pub dose_count: i64,
    pub expiry: Option<NaiveDate>,
    pub description: Option<String>,
}

/// Replacement values for an existing record.
///
/// `None` leaves the field unchanged. There is no way to clear an optional
/// field through a patch; the edit form never offered one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordPatch {
    pub name: Option<String>,
    pub dose_count: Option<i64>,
    pub expiry: Option<NaiveDate>,
    pub description: Option<String>,
}

impl RecordPatch {
    /// Returns true if applying this patch would change nothing.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.dose_count.is_none()
            && self.expiry.is_none()
            && self.description.is_none()
    }

    /// Applies every present field to `record`.
    pub fn apply(&self, record: &mut InventoryRecord) {
        if let Some(ref name) = self.name {
            record.name = name.clone();
        }
        if let Some(doses) = self.dose_count {
            record.dose_count = doses;
        }
        if let Some(expiry) = self.expiry {
            record.expiry = Some(expiry);
        }
        if let Some(ref description) = self.description {
            record.description = Some(description.clone());
        }
    }
}

/// `MM/DD/YYYY` (de)serialization for optional dates.
mod mdy_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::DATE_FORMAT;

    pub fn serialize<S: Serializer>(date: &Option<NaiveDate>, s: S) -> Result<S::Ok, S::Error> {
        match date {
            Some(d) => s.serialize_str(&d.format(DATE_FORMAT).to_string()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        raw.map(|s| NaiveDate::parse_from_str(&s, DATE_FORMAT).map_err(serde::de::Error::custom))
            .transpose()
    }
}

// =============================================================================
// Audit Log
// =============================================================================

/// The kind of change an audit entry records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditAction {
    Add,
    Update,
    Delete,
    /// A dose was taken through the hardware pipeline.
    Dispense,
    /// An action written by other tooling that this build does not know.
    Other(String),
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditAction::Add => write!(f, "Add"),
            AuditAction::Update => write!(f, "Update"),
            AuditAction::Delete => write!(f, "Delete"),
            AuditAction::Dispense => write!(f, "Dispense"),
            AuditAction::Other(name) => write!(f, "{}", name),
        }
    }
}

impl From<&str> for AuditAction {
    fn from(s: &str) -> Self {
        match s {
            "Add" => AuditAction::Add,
            "Update" => AuditAction::Update,
            "Delete" => AuditAction::Delete,
            "Dispense" => AuditAction::Dispense,
            other => AuditAction::Other(other.to_string()),
        }
    }
}

/// One line of the append-only audit trail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Local wall-clock time, minute precision.
    pub timestamp: NaiveDateTime,
    pub action: AuditAction,
    pub details: String,
}

impl LogEntry {
    pub fn new(timestamp: NaiveDateTime, action: AuditAction, details: impl Into<String>) -> Self {
        LogEntry {
            timestamp,
            action,
            details: details.into(),
        }
    }

    pub fn added(at: NaiveDateTime, record: &InventoryRecord) -> Self {
        Self::new(
            at,
            AuditAction::Add,
            format!("Added item '{}' with ID {}", record.name, record.id),
        )
    }

    /// `original_name` is the name the record had before the patch.
    pub fn updated(at: NaiveDateTime, original_name: &str) -> Self {
        Self::new(at, AuditAction::Update, format!("Updated item '{}'", original_name))
    }

    pub fn deleted(at: NaiveDateTime, name: &str) -> Self {
        Self::new(at, AuditAction::Delete, format!("Deleted item '{}'", name))
    }

    pub fn dispensed(at: NaiveDateTime, record: &InventoryRecord, identity: usize) -> Self {
        Self::new(
            at,
            AuditAction::Dispense,
            format!(
                "Identity {} took one dose of '{}' (ID {}), {} left",
                identity, record.name, record.id, record.dose_count
            ),
        )
    }

    /// Formats the entry as `[MM/DD/YYYY HH:MM] Action: details`.
    ///
    /// Control characters in the details become spaces, so an entry is
    /// always exactly one line.
    pub fn to_line(&self) -> String {
        let details: String = self
            .details
            .chars()
            .map(|c| if c.is_control() { ' ' } else { c })
            .collect();

        format!(
            "[{}] {}: {}",
            self.timestamp.format(LOG_TIMESTAMP_FORMAT),
            self.action,
            details
        )
    }

    /// Parses a line produced by [`LogEntry::to_line`].
    ///
    /// Returns `None` for lines that do not follow the format.
    pub fn parse_line(line: &str) -> Option<Self> {
        let rest = line.trim_end().strip_prefix('[')?;
        let (stamp, rest) = rest.split_once("] ")?;
        let timestamp = NaiveDateTime::parse_from_str(stamp, LOG_TIMESTAMP_FORMAT).ok()?;
        let (action, details) = rest.split_once(": ")?;

        Some(LogEntry {
            timestamp,
            action: AuditAction::from(action),
            details: details.to_string(),
        })
    }
}

// =============================================================================
// Sync State
// =============================================================================

/// Connectivity state of the remote mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    #[default]
    Offline,
    Online,
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncState::Offline => write!(f, "offline"),
            SyncState::Online => write!(f, "online"),
        }
    }
}

/// Snapshot of the sync engine, published to the operator surface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub state: SyncState,

    /// When the last full sync completed.
    pub last_sync: Option<DateTime<Utc>>,

    /// Most recent remote failure, cleared by the next successful sync.
    pub last_error: Option<String>,
}

impl SyncStatus {
    pub fn is_online(&self) -> bool {
        self.state == SyncState::Online
    }
}

// =============================================================================
// Scan Event
// =============================================================================

/// A tag read that survived parsing and deduplication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanEvent {
    /// Record id encoded on the tag.
    pub tag_id: i64,
    pub observed_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================
