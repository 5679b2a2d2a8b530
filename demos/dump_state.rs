// Dump the persisted sampler state (previous sample, open window) as JSON.
//
// Usage: cargo run --example dump_state -- [DB_PATH]
//   DB_PATH  default: ./data/state.db

use cpuusage::sample_store::SqliteSampleStore;
use std::env;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = env::args()
        .nth(1)
        .unwrap_or_else(|| "./data/state.db".to_string());

    let store = SqliteSampleStore::connect(&path).await?;
    store.init().await?;
    let entries = store.list_state().await?;

    for entry in &entries {
        let updated = chrono::DateTime::from_timestamp_millis(entry.updated_at)
            .map(|t| t.with_timezone(&chrono::Local).to_rfc3339())
            .unwrap_or_default();
        eprintln!("{} (updated {})", entry.key, updated);
    }
    println!("{}", serde_json::to_string_pretty(&entries)?);
    Ok(())
}
