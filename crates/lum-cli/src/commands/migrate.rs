use anyhow::{Context, bail};
use lum_core::entities::GuestDataset;
use lum_migrate::MigrationRequest;

use crate::cli::GlobalFlags;
use crate::cli::root_commands::MigrateArgs;
use crate::commands::parse::read_json_file;
use crate::context::AppContext;
use crate::output::output;

/// Handle `lum migrate`.
///
/// Prints the same envelope `POST /migrate` returns and exits non-zero when
/// the session did not complete.
pub async fn handle(args: &MigrateArgs, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    let started = if let Some(path) = &args.file {
        let guest_data: GuestDataset = read_json_file(path)?;
        ctx.engine
            .migrate(MigrationRequest {
                guest_id: args.guest.clone(),
                account_id: args.account.clone(),
                guest_data,
                strategy: args.strategy,
            })
            .await
    } else {
        ctx.engine
            .migrate_stored_guest(&args.guest, &args.account, args.strategy)
            .await
    };
    let outcome =
        started.with_context(|| format!("could not start migration for guest {}", args.guest))?;

    output(&outcome.to_response(), flags.format)?;

    if !outcome.is_success() {
        let reason = outcome
            .error
            .as_ref()
            .map_or_else(String::new, |error| format!(": {}", error.message));
        bail!(
            "migration {} ended as {}{reason}",
            outcome.session_id,
            outcome.status
        );
    }
    Ok(())
}
