//! Expense domain entity
//!
//! An expense is the record users create and edit locally. Every successful
//! local write produces a serialized payload that is queued for the remote.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::{Amount, RecordId};

/// Maximum note length, counted in characters
pub const MAX_NOTE_CHARS: usize = 500;

/// How far in the future an expense date may lie
pub const MAX_FUTURE_HOURS: i64 = 24;

// ============================================================================
// ExpenseDraft / ExpensePatch
// ============================================================================

/// User-editable fields of a new expense
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseDraft {
    /// Amount spent
    pub amount: Amount,
    /// Category the expense belongs to
    pub category_id: String,
    /// Optional subcategory within the category
    pub subcategory_id: Option<String>,
    /// Whether the expense was paid by card
    pub is_card_payment: bool,
    /// Free-form note
    pub note: Option<String>,
    /// When the expense happened
    pub date: DateTime<Utc>,
}

impl ExpenseDraft {
    /// Creates a draft with the required fields; optional fields start empty
    pub fn new(amount: Amount, category_id: impl Into<String>, date: DateTime<Utc>) -> Self {
        Self {
            amount,
            category_id: category_id.into(),
            subcategory_id: None,
            is_card_payment: false,
            note: None,
            date,
        }
    }

    /// Sets the subcategory
    pub fn with_subcategory(mut self, subcategory_id: impl Into<String>) -> Self {
        self.subcategory_id = Some(subcategory_id.into());
        self
    }

    /// Marks the expense as a card payment
    pub fn with_card_payment(mut self, is_card_payment: bool) -> Self {
        self.is_card_payment = is_card_payment;
        self
    }

    /// Sets the note
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Checks every field rule against the given clock
    ///
    /// # Errors
    /// Returns `DomainError::ValidationFailed` naming the first offending field
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), DomainError> {
        if self.category_id.trim().is_empty() {
            return Err(DomainError::ValidationFailed(
                "category_id is required".to_string(),
            ));
        }
        if let Some(sub) = &self.subcategory_id {
            if sub.trim().is_empty() {
                return Err(DomainError::ValidationFailed(
                    "subcategory_id must not be blank when set".to_string(),
                ));
            }
        }
        if let Some(note) = &self.note {
            let chars = note.chars().count();
            if chars > MAX_NOTE_CHARS {
                return Err(DomainError::ValidationFailed(format!(
                    "note must be at most {MAX_NOTE_CHARS} characters (got {chars})"
                )));
            }
        }
        if self.date > now + Duration::hours(MAX_FUTURE_HOURS) {
            return Err(DomainError::ValidationFailed(format!(
                "date cannot be more than {MAX_FUTURE_HOURS}h in the future"
            )));
        }
        Ok(())
    }
}

/// Partial update of an existing expense
///
/// `None` leaves a field untouched. For the optional fields, `Some(None)`
/// clears the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpensePatch {
    pub amount: Option<Amount>,
    pub category_id: Option<String>,
    pub subcategory_id: Option<Option<String>>,
    pub is_card_payment: Option<bool>,
    pub note: Option<Option<String>>,
    pub date: Option<DateTime<Utc>>,
}

impl ExpensePatch {
    /// Returns true if the patch would not change anything
    pub fn is_empty(&self) -> bool {
        self.amount.is_none()
            && self.category_id.is_none()
            && self.subcategory_id.is_none()
            && self.is_card_payment.is_none()
            && self.note.is_none()
            && self.date.is_none()
    }
}

// ============================================================================
// Expense
// ============================================================================

/// A validated expense record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expense {
    id: RecordId,
    #[serde(flatten)]
    fields: ExpenseDraft,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Expense {
    /// Creates a new expense with a generated id
    ///
    /// # Errors
    /// Returns `DomainError::ValidationFailed` if the draft breaks a field rule
    pub fn create(draft: ExpenseDraft, now: DateTime<Utc>) -> Result<Self, DomainError> {
        Self::create_with_id(RecordId::generate(), draft, now)
    }

    /// Creates a new expense with a caller-chosen id
    ///
    /// # Errors
    /// Returns `DomainError::ValidationFailed` if the draft breaks a field rule
    pub fn create_with_id(
        id: RecordId,
        draft: ExpenseDraft,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        draft.validate(now)?;
        Ok(Self {
            id,
            fields: draft,
            created_at: now,
            updated_at: now,
        })
    }

    /// Rebuilds an expense from storage without re-running validation
    pub fn restore(
        id: RecordId,
        fields: ExpenseDraft,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            fields,
            created_at,
            updated_at,
        }
    }

    /// Merges a patch into this expense
    ///
    /// The merged result is validated before anything changes; on error the
    /// expense is left as it was.
    ///
    /// # Errors
    /// Returns `DomainError::ValidationFailed` if the merged fields are invalid
    pub fn apply(&mut self, patch: ExpensePatch, now: DateTime<Utc>) -> Result<(), DomainError> {
        let mut merged = self.fields.clone();
        if let Some(amount) = patch.amount {
            merged.amount = amount;
        }
        if let Some(category_id) = patch.category_id {
            merged.category_id = category_id;
        }
        if let Some(subcategory_id) = patch.subcategory_id {
            merged.subcategory_id = subcategory_id;
        }
        if let Some(is_card_payment) = patch.is_card_payment {
            merged.is_card_payment = is_card_payment;
        }
        if let Some(note) = patch.note {
            merged.note = note;
        }
        if let Some(date) = patch.date {
            merged.date = date;
        }

        merged.validate(now)?;
        self.fields = merged;
        self.updated_at = now;
        Ok(())
    }

    /// Serializes the expense into the opaque payload sent to the remote
    ///
    /// # Errors
    /// Returns `DomainError::PayloadEncoding` if serialization fails
    pub fn to_payload(&self) -> Result<Vec<u8>, DomainError> {
        serde_json::to_vec(self).map_err(|e| DomainError::PayloadEncoding(e.to_string()))
    }

    pub fn id(&self) -> &RecordId {
        &self.id
    }

    pub fn amount(&self) -> Amount {
        self.fields.amount
    }

    pub fn category_id(&self) -> &str {
        &self.fields.category_id
    }

    pub fn subcategory_id(&self) -> Option<&str> {
        self.fields.subcategory_id.as_deref()
    }

    pub fn is_card_payment(&self) -> bool {
        self.fields.is_card_payment
    }

    pub fn note(&self) -> Option<&str> {
        self.fields.note.as_deref()
    }

    pub fn date(&self) -> DateTime<Utc> {
        self.fields.date
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// The editable fields as a draft
    pub fn fields(&self) -> &ExpenseDraft {
        &self.fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(now: DateTime<Utc>) -> ExpenseDraft {
        ExpenseDraft::new(Amount::from_cents(1250).unwrap(), "food", now)
    }

    #[test]
    fn test_create_sets_timestamps() {
        let now = Utc::now();
        let expense = Expense::create(draft(now), now).unwrap();
        assert_eq!(expense.created_at(), now);
        assert_eq!(expense.updated_at(), now);
        assert_eq!(expense.category_id(), "food");
        assert!(!expense.is_card_payment());
    }

    #[test]
    fn test_rejects_blank_category() {
        let now = Utc::now();
        let mut d = draft(now);
        d.category_id = "  ".to_string();
        let err = Expense::create(d, now).unwrap_err();
        assert!(err.to_string().contains("category_id"));
    }

    #[test]
    fn test_rejects_long_note() {
        let now = Utc::now();
        let d = draft(now).with_note("x".repeat(MAX_NOTE_CHARS + 1));
        assert!(Expense::create(d, now).is_err());

        let d = draft(now).with_note("é".repeat(MAX_NOTE_CHARS));
        assert!(Expense::create(d, now).is_ok());
    }

    #[test]
    fn test_date_future_window() {
        let now = Utc::now();
        let mut d = draft(now);
        d.date = now + Duration::hours(23);
        assert!(d.validate(now).is_ok());

        d.date = now + Duration::hours(25);
        assert!(d.validate(now).is_err());
    }

    #[test]
    fn test_apply_merges_fields() {
        let now = Utc::now();
        let mut expense = Expense::create(draft(now).with_note("lunch"), now).unwrap();
        let later = now + Duration::minutes(5);

        let patch = ExpensePatch {
            amount: Some(Amount::from_cents(999).unwrap()),
            note: Some(None),
            is_card_payment: Some(true),
            ..Default::default()
        };
        expense.apply(patch, later).unwrap();

        assert_eq!(expense.amount().cents(), 999);
        assert_eq!(expense.note(), None);
        assert!(expense.is_card_payment());
        assert_eq!(expense.category_id(), "food");
        assert_eq!(expense.created_at(), now);
        assert_eq!(expense.updated_at(), later);
    }

    #[test]
    fn test_apply_invalid_leaves_expense_untouched() {
        let now = Utc::now();
        let mut expense = Expense::create(draft(now), now).unwrap();
        let before = expense.clone();

        let patch = ExpensePatch {
            category_id: Some(String::new()),
            ..Default::default()
        };
        assert!(expense.apply(patch, now).is_err());
        assert_eq!(expense, before);
    }

    #[test]
    fn test_payload_round_trips_through_json() {
        let now = Utc::now();
        let expense = Expense::create(draft(now).with_subcategory("groceries"), now).unwrap();
        let payload = expense.to_payload().unwrap();

        let value: serde_json::Value = serde_json::from_slice(&payload).unwrap();
        assert_eq!(value["id"], expense.id().as_str());
        assert_eq!(value["amount"], 1250);
        assert_eq!(value["subcategory_id"], "groceries");

        let decoded: Expense = serde_json::from_slice(&payload).unwrap();
        assert_eq!(decoded, expense);
    }
}
