//! `store-cli publish-demo`: builds and runs the multi-entity composition
//! seed scenario (a student analyzed into a sibling-linked assessment and
//! recommendation) so its shape can be explored with `get` and `history`
//! afterward.

use std::collections::HashMap;
use std::sync::Arc;

use clap::Args;
use store_callable::{ArgValue, CallableOutput};
use store_core::PublishOutcome;

use crate::app::AppContext;
use crate::demo::Student;

#[derive(Debug, Args)]
pub struct PublishDemoArgs {}

pub async fn execute(ctx: &AppContext, _args: PublishDemoArgs) -> anyhow::Result<()> {
    let student = Student::new("Ada Lovelace", 3.8);
    let lineage_id = student.header.lineage_id;

    let outcome = ctx.registry.publish(Arc::new(student), &ctx.bus).await?;
    let root = match outcome {
        PublishOutcome::NewVersion { new_root, .. } => new_root,
        PublishOutcome::Unchanged => unreachable!("first publish of a fresh entity is always new"),
    };
    println!("published Student {root} (lineage {lineage_id})");

    let mut args = HashMap::new();
    args.insert("student".to_string(), ArgValue::Reference(format!("@{root}")));
    match ctx.calls.execute("analyze", args).await? {
        CallableOutput::Multiple(ids) => {
            println!("analyze produced {} sibling-linked outputs:", ids.len());
            for id in ids {
                println!("  {id}");
            }
        }
        CallableOutput::Single(id) => println!("analyze produced {id}"),
    }

    println!("try: store-cli get @{root}");
    println!("try: store-cli history {lineage_id}");
    Ok(())
}
