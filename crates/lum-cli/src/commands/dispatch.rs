use crate::cli::GlobalFlags;
use crate::cli::root_commands::Commands;
use crate::commands;
use crate::context::AppContext;

/// Dispatch a parsed command to the corresponding handler module.
pub async fn dispatch(command: Commands, ctx: AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    match command {
        Commands::Migrate(args) => commands::migrate::handle(&args, &ctx, flags).await,
        Commands::Guest { action } => commands::guest::handle(&action, &ctx, flags).await,
        Commands::Account { action } => commands::account::handle(&action, &ctx, flags).await,
        Commands::Session { action } => commands::session::handle(&action, &ctx, flags),
        Commands::Serve(args) => commands::serve::handle(&args, ctx, flags).await,
    }
}
