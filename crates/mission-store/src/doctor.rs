use anyhow::{Context, Result};

use crate::{MissionStore, StoreConfig};

pub fn check_config(cfg: &StoreConfig) -> Result<()> {
    match cfg.backend.as_str() {
        "memory" => {}
        "mongo" => {
            let m = cfg.mongo.as_ref().context("store.backend=mongo but [store.mongo] missing")?;
            anyhow::ensure!(!m.host.trim().is_empty(), "store.mongo.host is empty");
            anyhow::ensure!(
                m.scheme == "mongodb" || m.scheme == "mongodb+srv",
                "store.mongo.scheme must be mongodb or mongodb+srv, got {}",
                m.scheme
            );
        }
        other => anyhow::bail!("unknown store.backend: {}", other),
    }
    let t = cfg.op_timeout().as_secs();
    anyhow::ensure!((1..=120).contains(&t), "store.op_timeout_s should be 1..120");
    Ok(())
}

/// Round-trips the store and makes sure the lookup indexes exist.
pub async fn check_store(store: &dyn MissionStore) -> Result<()> {
    store.ping().await.context("store ping")?;
    store.ensure_indexes().await.context("ensure indexes")?;
    Ok(())
}
