//! CLI subcommands and the helpers they share

pub mod add;
pub mod completions;
pub mod config;
pub mod delete;
pub mod edit;
pub mod list;
pub mod show;
pub mod status;
pub mod sync;

use chrono::{DateTime, NaiveDate, Utc};
use outlay_core::domain::Expense;

/// Parses an expense date given as RFC 3339 or as a plain `YYYY-MM-DD`
///
/// A plain date means midnight UTC of that day.
pub fn parse_date(input: &str) -> Result<DateTime<Utc>, String> {
    let input = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| format!("'{input}' is not a date (expected YYYY-MM-DD or RFC 3339)"))
}

/// JSON view of an expense, with the amount both in cents and formatted
pub fn expense_json(expense: &Expense) -> serde_json::Value {
    serde_json::json!({
        "id": expense.id().to_string(),
        "amount_cents": expense.amount().cents(),
        "amount": expense.amount().to_string(),
        "category_id": expense.category_id(),
        "subcategory_id": expense.subcategory_id(),
        "is_card_payment": expense.is_card_payment(),
        "note": expense.note(),
        "date": expense.date().to_rfc3339(),
        "created_at": expense.created_at().to_rfc3339(),
        "updated_at": expense.updated_at().to_rfc3339(),
    })
}

/// One-line human summary used by `list`
pub fn expense_line(expense: &Expense) -> String {
    let category = match expense.subcategory_id() {
        Some(sub) => format!("{}/{}", expense.category_id(), sub),
        None => expense.category_id().to_string(),
    };
    let card = if expense.is_card_payment() { " [card]" } else { "" };
    format!(
        "{}  {}  {:>10}  {}{}",
        expense.id(),
        expense.date().format("%Y-%m-%d"),
        expense.amount().to_string(),
        category,
        card
    )
}

/// Multi-line human description used by `show`, `add` and `edit`
pub fn expense_details(expense: &Expense) -> Vec<String> {
    let mut lines = vec![
        format!("ID:          {}", expense.id()),
        format!("Amount:      {}", expense.amount()),
        format!("Category:    {}", expense.category_id()),
    ];
    if let Some(sub) = expense.subcategory_id() {
        lines.push(format!("Subcategory: {}", sub));
    }
    lines.push(format!(
        "Card:        {}",
        if expense.is_card_payment() { "yes" } else { "no" }
    ));
    if let Some(note) = expense.note() {
        lines.push(format!("Note:        {}", note));
    }
    lines.push(format!("Date:        {}", expense.date().format("%Y-%m-%d")));
    lines.push(format!(
        "Updated:     {}",
        expense.updated_at().format("%Y-%m-%d %H:%M:%S UTC")
    ));
    lines
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, TimeZone, Timelike};
    use outlay_core::domain::{Amount, ExpenseDraft};

    use super::*;

    #[test]
    fn test_parse_date_plain_day() {
        let dt = parse_date("2026-03-14").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2026, 3, 14, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_date_rfc3339_is_converted_to_utc() {
        let dt = parse_date("2026-03-14T10:30:00+02:00").unwrap();
        assert_eq!(dt.day(), 14);
        assert_eq!(dt.hour(), 8);
    }

    #[test]
    fn test_parse_date_rejects_garbage() {
        assert!(parse_date("yesterday").is_err());
        assert!(parse_date("2026-13-01").is_err());
        assert!(parse_date("").is_err());
    }

    fn sample() -> Expense {
        let now = Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).unwrap();
        let draft = ExpenseDraft::new(Amount::from_cents(1250).unwrap(), "food", now)
            .with_subcategory("groceries")
            .with_card_payment(true);
        Expense::create(draft, now).unwrap()
    }

    #[test]
    fn test_expense_json_fields() {
        let json = expense_json(&sample());
        assert_eq!(json["amount_cents"], 1250);
        assert_eq!(json["amount"], "12.50");
        assert_eq!(json["category_id"], "food");
        assert_eq!(json["subcategory_id"], "groceries");
        assert_eq!(json["is_card_payment"], true);
        assert!(json["note"].is_null());
    }

    #[test]
    fn test_expense_line() {
        let line = expense_line(&sample());
        assert!(line.contains("2026-03-14"));
        assert!(line.contains("12.50"));
        assert!(line.ends_with("food/groceries [card]"));
    }

    #[test]
    fn test_expense_details_skips_absent_fields() {
        let details = expense_details(&sample());
        assert!(details.iter().any(|l| l.starts_with("Subcategory: groceries")));
        assert!(!details.iter().any(|l| l.starts_with("Note:")));
    }
}
