//! Add command - Record a new expense
//!
//! The expense is stored locally and queued for sync whether or not the
//! network is reachable.

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Args;

use outlay_core::domain::{Amount, ExpenseDraft};
use outlay_core::usecases::CreateExpenseUseCase;

use super::{expense_details, expense_json, parse_date};
use crate::context::{AppContext, GlobalArgs};
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct AddCommand {
    /// Amount with at most two decimals, e.g. 12.50
    pub amount: Amount,

    /// Category identifier
    #[arg(short, long)]
    pub category: String,

    /// Subcategory identifier
    #[arg(short, long)]
    pub subcategory: Option<String>,

    /// Paid by card
    #[arg(long)]
    pub card: bool,

    /// Free-form note
    #[arg(short, long)]
    pub note: Option<String>,

    /// Date of the expense (YYYY-MM-DD or RFC 3339); defaults to now
    #[arg(short, long, value_parser = parse_date)]
    pub date: Option<DateTime<Utc>>,
}

impl AddCommand {
    /// Builds the draft described by the arguments
    pub fn draft(&self) -> ExpenseDraft {
        let mut draft = ExpenseDraft::new(
            self.amount,
            self.category.clone(),
            self.date.unwrap_or_else(Utc::now),
        )
        .with_card_payment(self.card);
        if let Some(sub) = &self.subcategory {
            draft = draft.with_subcategory(sub.clone());
        }
        if let Some(note) = &self.note {
            draft = draft.with_note(note.clone());
        }
        draft
    }

    pub async fn execute(&self, global: &GlobalArgs, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format, global.quiet);
        let ctx = AppContext::open(global).await?;

        let use_case = CreateExpenseUseCase::new(ctx.records.clone(), ctx.sink());
        let result = use_case.execute(self.draft()).await;
        let status = ctx.coordinator.status();
        ctx.close().await;
        let expense = result?;

        match format {
            OutputFormat::Json => {
                formatter.print_json(&serde_json::json!({
                    "expense": expense_json(&expense),
                    "sync_state": status.state().name(),
                    "pending": status.pending_count(),
                }));
            }
            OutputFormat::Human => {
                formatter.success(&format!("Expense {} recorded", expense.id()));
                for line in expense_details(&expense) {
                    formatter.info(&line);
                }
                if !status.is_online() {
                    formatter.warn("Offline: saved locally, will sync when the network is back");
                }
            }
        }

        Ok(())
    }
}
