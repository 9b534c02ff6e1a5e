//! Delete command - Remove an expense
//!
//! A change still waiting in the pending queue is dropped with it; nothing
//! is sent to the remote for the deletion.

use anyhow::Result;
use clap::Args;

use outlay_core::domain::{DomainError, RecordId};
use outlay_core::usecases::DeleteExpenseUseCase;

use crate::context::{AppContext, GlobalArgs};
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct DeleteCommand {
    /// Identifier of the expense to delete
    pub id: RecordId,
}

impl DeleteCommand {
    pub async fn execute(&self, global: &GlobalArgs, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format, global.quiet);
        let ctx = AppContext::open(global).await?;

        let result = DeleteExpenseUseCase::new(ctx.records.clone(), ctx.sink())
            .execute(&self.id)
            .await;
        ctx.close().await;

        match result {
            Ok(()) => {}
            Err(err) if matches!(err.downcast_ref::<DomainError>(), Some(DomainError::ExpenseNotFound(_))) => {
                formatter.error(&format!("No expense with id '{}'", self.id));
                return Ok(());
            }
            Err(err) => return Err(err),
        }

        match format {
            OutputFormat::Json => formatter.print_json(&serde_json::json!({
                "deleted": self.id.to_string(),
            })),
            OutputFormat::Human => formatter.success(&format!("Expense {} deleted", self.id)),
        }

        Ok(())
    }
}
