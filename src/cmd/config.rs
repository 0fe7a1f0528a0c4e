use anyhow::Result;
use serde_json::json;

use streamrank::core::overrides;
use streamrank::models::config::Config;
use streamrank::output;
use streamrank::output::human;

use super::open_db;

pub fn run_show(human_flag: bool) -> Result<()> {
    let config = Config::load()?;
    let db = open_db(&config)?;
    let entries = overrides::list(&db, &config.anomaly)?;

    if human_flag {
        println!("{}", human::format_config_entries(&entries));
        println!(
            "workers = {}, busy_timeout_ms = {}",
            config.detector.workers, config.detector.busy_timeout_ms
        );
    } else {
        let out = output::success(
            "config",
            json!({ "entries": entries, "detector": config.detector }),
        );
        println!("{}", serde_json::to_string(&out)?);
    }
    Ok(())
}

pub fn run_keys(human_flag: bool) -> Result<()> {
    let keys = overrides::keys();
    if human_flag {
        for k in keys {
            println!("{:<42} {:<6} {}", k.key, k.value_type.as_str(), k.description);
        }
    } else {
        let keys: Vec<_> = keys
            .iter()
            .map(|k| json!({ "key": k.key, "type": k.value_type, "description": k.description }))
            .collect();
        let out = output::success("config", json!({ "keys": keys }));
        println!("{}", serde_json::to_string(&out)?);
    }
    Ok(())
}

pub fn run_set(key: &str, value: &str) -> Result<()> {
    let config = Config::load()?;
    let db = open_db(&config)?;
    let entry = overrides::set(&db, &config.anomaly, key, value)?;

    let out = output::success("config", json!({ "entry": entry }));
    println!("{}", serde_json::to_string(&out)?);
    Ok(())
}

pub fn run_reset(key: &str) -> Result<()> {
    let config = Config::load()?;
    let db = open_db(&config)?;
    let entry = overrides::reset(&db, &config.anomaly, key)?;

    let out = output::success("config", json!({ "entry": entry }));
    println!("{}", serde_json::to_string(&out)?);
    Ok(())
}
