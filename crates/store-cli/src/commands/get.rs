//! `store-cli get <address>`

use clap::Args;

use crate::app::AppContext;

#[derive(Debug, Args)]
pub struct GetArgs {
    /// `@<logical-id>(.<field>)*` address.
    pub address: String,
}

pub async fn execute(ctx: &AppContext, args: GetArgs) -> anyhow::Result<()> {
    let address = store_address::parse(&args.address)?;
    let resolved = store_address::resolve(&ctx.registry, &address).await?;
    println!("{}", serde_json::to_string_pretty(&resolved.into_json())?);
    Ok(())
}
