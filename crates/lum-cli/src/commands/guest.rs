use anyhow::Context;
use lum_core::entities::GuestDataset;
use serde_json::json;

use crate::cli::GlobalFlags;
use crate::cli::subcommands::GuestCommands;
use crate::commands::parse::read_json_file;
use crate::context::AppContext;
use crate::output::output;

/// Handle `lum guest`.
pub async fn handle(action: &GuestCommands, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    match action {
        GuestCommands::Import { guest_id, file } => {
            let dataset: GuestDataset = read_json_file(file)?;
            ctx.service
                .save_guest_dataset(guest_id, &dataset)
                .await
                .with_context(|| format!("failed to store dataset for guest {guest_id}"))?;
            output(
                &json!({
                    "guestId": guest_id,
                    "curricula": dataset.curricula.len(),
                    "flashcards": dataset.flashcards.len(),
                    "stored": true,
                }),
                flags.format,
            )
        }
        GuestCommands::Eligibility { guest_id } => {
            let response = ctx
                .engine
                .check_eligibility(guest_id)
                .await
                .with_context(|| format!("failed to read usage for guest {guest_id}"))?;
            output(&response, flags.format)
        }
    }
}
