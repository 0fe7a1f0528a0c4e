use anyhow::{Result, bail};
use chrono::{Duration, Utc};
use serde_json::json;

use streamrank::models::config::Config;
use streamrank::output;

use super::open_db;

pub fn run(days: u32) -> Result<()> {
    let config = Config::load()?;
    let db = open_db(&config)?;
    let Some(cutoff) = Utc::now().checked_sub_signed(Duration::days(i64::from(days))) else {
        bail!("--days {} reaches before the earliest representable time", days);
    };
    let removed = db.prune_samples_before(cutoff)?;

    let out = output::success(
        "prune",
        json!({ "removed": removed, "cutoff": cutoff.to_rfc3339() }),
    );
    println!("{}", serde_json::to_string(&out)?);
    Ok(())
}
