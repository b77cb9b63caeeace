//! Layered configuration: defaults, then an optional `store.toml`, then
//! `STORE_*` environment variables (via `.env` if present), the precedence
//! order §1.1 of the core's ambient stack calls for.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct StoreCliConfig {
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
}

fn default_queue_capacity() -> usize {
    256
}

fn default_history_capacity() -> usize {
    256
}

impl StoreCliConfig {
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let raw = config::Config::builder()
            .set_default("queue_capacity", default_queue_capacity() as i64)?
            .set_default("history_capacity", default_history_capacity() as i64)?
            .add_source(config::File::with_name("store").required(false))
            .add_source(config::Environment::with_prefix("STORE"))
            .build()?;

        Ok(raw.try_deserialize()?)
    }
}
