//! `store-cli history <lineage-id>`

use clap::Args;
use store_core_types::LineageId;

use crate::app::AppContext;

#[derive(Debug, Args)]
pub struct HistoryArgs {
    /// Lineage id (a uuid shared by every version of one logical entity).
    pub lineage_id: String,
}

pub async fn execute(ctx: &AppContext, args: HistoryArgs) -> anyhow::Result<()> {
    let lineage_id: LineageId = args
        .lineage_id
        .parse()
        .map_err(|_| anyhow::anyhow!("not a valid uuid: {}", args.lineage_id))?;

    let history = ctx.registry.lineage_history(lineage_id).await;
    if history.is_empty() {
        println!("no published versions for lineage {lineage_id}");
        return Ok(());
    }
    for (version, root) in history.iter().enumerate() {
        println!("{version}: {root}");
    }
    Ok(())
}
