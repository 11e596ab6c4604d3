use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, anyhow};

use crate::cli::GlobalFlags;
use crate::cli::root_commands::ServeArgs;
use crate::context::AppContext;
use crate::server;

/// Handle `lum serve`. Runs until Ctrl-C.
pub async fn handle(args: &ServeArgs, ctx: AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    let bind = args
        .bind
        .clone()
        .unwrap_or_else(|| ctx.config.server.bind.clone());
    let max_body_bytes = ctx.config.server.max_body_bytes;

    let http = tiny_http::Server::http(bind.as_str())
        .map_err(|error| anyhow!("failed to bind {bind}: {error}"))?;
    tracing::info!(%bind, max_body_bytes, "migration entrypoint listening");
    if !flags.quiet {
        eprintln!("lum listening on http://{bind}");
    }

    let ctx = Arc::new(ctx);
    let shutdown = Arc::new(AtomicBool::new(false));
    let runtime = tokio::runtime::Handle::current();

    let worker = {
        let ctx = Arc::clone(&ctx);
        let shutdown = Arc::clone(&shutdown);
        tokio::task::spawn_blocking(move || {
            server::serve_blocking(&http, &ctx, &runtime, max_body_bytes, &shutdown);
        })
    };

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    tracing::info!("shutting down migration entrypoint");
    shutdown.store(true, Ordering::Relaxed);

    worker.await.context("server worker panicked")?;
    Ok(())
}
