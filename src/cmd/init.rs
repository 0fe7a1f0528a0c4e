use anyhow::Result;
use serde_json::json;

use streamrank::models::config::Config;
use streamrank::output;

use super::open_db;

pub fn run() -> Result<()> {
    let config = Config::load()?;
    // Validate before writing anything.
    config.anomaly_config()?;
    config.save()?;
    open_db(&config)?;

    let out = output::success(
        "init",
        json!({
            "config_path": Config::path(),
            "db_path": Config::db_path(),
        }),
    );
    println!("{}", serde_json::to_string(&out)?);
    Ok(())
}
