//! Show command - Display one expense

use anyhow::Result;
use clap::Args;

use outlay_core::domain::RecordId;
use outlay_core::usecases::ListExpensesUseCase;

use super::{expense_details, expense_json};
use crate::context::{AppContext, GlobalArgs};
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct ShowCommand {
    /// Identifier of the expense
    pub id: RecordId,
}

impl ShowCommand {
    pub async fn execute(&self, global: &GlobalArgs, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format, global.quiet);
        let ctx = AppContext::open(global).await?;

        let result = ListExpensesUseCase::new(ctx.records.clone())
            .get(&self.id)
            .await;
        let entries = ctx.coordinator.pending_entries().await;
        ctx.close().await;

        let pending = entries?.iter().any(|entry| entry.record_id == self.id);
        let Some(expense) = result? else {
            formatter.error(&format!("No expense with id '{}'", self.id));
            return Ok(());
        };

        match format {
            OutputFormat::Json => {
                let mut value = expense_json(&expense);
                value["pending_sync"] = serde_json::Value::Bool(pending);
                formatter.print_json(&value);
            }
            OutputFormat::Human => {
                for line in expense_details(&expense) {
                    println!("{}", line);
                }
                println!(
                    "Sync:        {}",
                    if pending { "pending" } else { "up to date" }
                );
            }
        }

        Ok(())
    }
}
