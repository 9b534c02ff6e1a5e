//! Edit command - Change fields of an existing expense

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Args;

use outlay_core::domain::{Amount, DomainError, ExpensePatch, RecordId};
use outlay_core::usecases::UpdateExpenseUseCase;

use super::{expense_details, expense_json, parse_date};
use crate::context::{AppContext, GlobalArgs};
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct EditCommand {
    /// Identifier of the expense to change
    pub id: RecordId,

    /// New amount
    #[arg(short, long)]
    pub amount: Option<Amount>,

    /// New category
    #[arg(short, long)]
    pub category: Option<String>,

    /// New subcategory
    #[arg(short, long, conflicts_with = "clear_subcategory")]
    pub subcategory: Option<String>,

    /// Remove the subcategory
    #[arg(long)]
    pub clear_subcategory: bool,

    /// Whether the expense was paid by card (true/false)
    #[arg(long)]
    pub card: Option<bool>,

    /// New note
    #[arg(short, long, conflicts_with = "clear_note")]
    pub note: Option<String>,

    /// Remove the note
    #[arg(long)]
    pub clear_note: bool,

    /// New date (YYYY-MM-DD or RFC 3339)
    #[arg(short, long, value_parser = parse_date)]
    pub date: Option<DateTime<Utc>>,
}

impl EditCommand {
    /// Builds the patch described by the arguments
    pub fn patch(&self) -> ExpensePatch {
        ExpensePatch {
            amount: self.amount,
            category_id: self.category.clone(),
            subcategory_id: clearable(self.subcategory.as_ref(), self.clear_subcategory),
            is_card_payment: self.card,
            note: clearable(self.note.as_ref(), self.clear_note),
            date: self.date,
        }
    }

    pub async fn execute(&self, global: &GlobalArgs, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format, global.quiet);

        let patch = self.patch();
        if patch.is_empty() {
            formatter.error("Nothing to change. Pass at least one field option.");
            return Ok(());
        }

        let ctx = AppContext::open(global).await?;
        let use_case = UpdateExpenseUseCase::new(ctx.records.clone(), ctx.sink());
        let result = use_case.execute(&self.id, patch).await;
        ctx.close().await;

        let expense = match result {
            Ok(expense) => expense,
            Err(err) if matches!(err.downcast_ref::<DomainError>(), Some(DomainError::ExpenseNotFound(_))) => {
                formatter.error(&format!("No expense with id '{}'", self.id));
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        match format {
            OutputFormat::Json => formatter.print_json(&expense_json(&expense)),
            OutputFormat::Human => {
                formatter.success(&format!("Expense {} updated", expense.id()));
                for line in expense_details(&expense) {
                    formatter.info(&line);
                }
            }
        }

        Ok(())
    }
}

fn clearable(value: Option<&String>, clear: bool) -> Option<Option<String>> {
    if clear {
        Some(None)
    } else {
        value.map(|v| Some(v.clone()))
    }
}
