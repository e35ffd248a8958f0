//! Fixed column names and field identifiers of the enrollment template.

/// Column driving the session checkboxes; compared against the sentinel
/// label mapped to each slot, not read as a field value.
pub const SESSION_COLUMN: &str = "Session";
/// Column driving the credit/audit checkboxes.
pub const ENROLLMENT_COLUMN: &str = "Credit/Audit";
/// Column used for enrollee-name output naming and report labels.
pub const FULL_NAME_COLUMN: &str = "Full name";
/// Column used for unique-ID output naming.
pub const UNIQUE_ID_COLUMN: &str = "Duke Unique ID#";

/// The four session-slot checkbox identifiers, two per term.
pub const SESSION_SLOTS: &[&str] = &["fall_1", "fall_2", "spring_1", "spring_2"];
/// The three date field identifiers; values are truncated to the first
/// whitespace-separated token (drops a time-of-day suffix).
pub const DATE_FIELDS: &[&str] = &["date", "date_2", "date_sign"];
pub const CREDIT_FIELD: &str = "credit";
pub const AUDIT_FIELD: &str = "audit";

/// Checkbox "on" state written to both `/V` and `/AS`.
pub const CHECKED: &[u8] = b"Yes";
