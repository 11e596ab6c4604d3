use anyhow::Context;
use lum_core::store::AccountStore;

use crate::cli::GlobalFlags;
use crate::cli::subcommands::AccountCommands;
use crate::context::AppContext;
use crate::output::output;

/// Handle `lum account`.
pub async fn handle(action: &AccountCommands, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    match action {
        AccountCommands::Show { account_id } => {
            let dataset = ctx
                .service
                .read_account_data(account_id)
                .await
                .with_context(|| format!("failed to read account {account_id}"))?;
            output(&dataset, flags.format)
        }
    }
}
