//! List command - Show expenses, newest first

use anyhow::Result;
use clap::Args;

use outlay_core::usecases::ListExpensesUseCase;

use super::{expense_json, expense_line};
use crate::context::{AppContext, GlobalArgs};
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct ListCommand {
    /// Show at most this many expenses
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Only expenses in this category
    #[arg(short, long)]
    pub category: Option<String>,
}

impl ListCommand {
    pub async fn execute(&self, global: &GlobalArgs, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format, global.quiet);
        let ctx = AppContext::open(global).await?;

        let result = ListExpensesUseCase::new(ctx.records.clone()).execute().await;
        ctx.close().await;

        let expenses: Vec<_> = result?
            .into_iter()
            .filter(|e| {
                self.category
                    .as_deref()
                    .map_or(true, |c| e.category_id() == c)
            })
            .take(self.limit.unwrap_or(usize::MAX))
            .collect();

        match format {
            OutputFormat::Json => {
                let items: Vec<_> = expenses.iter().map(expense_json).collect();
                formatter.print_json(&serde_json::json!({
                    "count": items.len(),
                    "expenses": items,
                }));
            }
            OutputFormat::Human => {
                if expenses.is_empty() {
                    formatter.info("No expenses recorded");
                    return Ok(());
                }
                let total: u64 = expenses.iter().map(|e| e.amount().cents()).sum();
                for expense in &expenses {
                    println!("{}", expense_line(expense));
                }
                formatter.info(&format!(
                    "{} expense(s), total {}.{:02}",
                    expenses.len(),
                    total / 100,
                    total % 100
                ));
            }
        }

        Ok(())
    }
}
