//! `store-cli call <name> --arg k=v ...`

use std::collections::HashMap;

use clap::Args;
use store_callable::{ArgValue, CallableOutput};

use crate::app::AppContext;

#[derive(Debug, Args)]
pub struct CallArgs {
    /// Registered function name.
    pub name: String,

    /// One `key=value` pair per argument; repeatable. A value starting with
    /// '@' is treated as an address reference, everything else is parsed as
    /// JSON and falls back to a bare string if that fails.
    #[arg(long = "arg")]
    pub args: Vec<String>,
}

pub async fn execute(ctx: &AppContext, args: CallArgs) -> anyhow::Result<()> {
    let mut call_args = HashMap::new();
    for raw in &args.args {
        let (key, value) = raw.split_once('=').ok_or_else(|| {
            anyhow::anyhow!("malformed --arg '{raw}', expected key=value")
        })?;
        let parsed = if let Some(reference) = value.strip_prefix('@') {
            ArgValue::Reference(format!("@{reference}"))
        } else {
            match serde_json::from_str(value) {
                Ok(json) => ArgValue::Primitive(json),
                Err(_) => ArgValue::Primitive(serde_json::Value::String(value.to_string())),
            }
        };
        call_args.insert(key.to_string(), parsed);
    }

    let output = ctx.calls.execute(&args.name, call_args).await?;
    match output {
        CallableOutput::Single(id) => println!("{id}"),
        CallableOutput::Multiple(ids) => {
            for id in ids {
                println!("{id}");
            }
        }
    }
    Ok(())
}
