use anyhow::{Result, bail};
use serde_json::json;

use streamrank::models::config::Config;
use streamrank::models::stream::{Livestream, is_valid_external_id};
use streamrank::output;
use streamrank::output::human;

use super::{open_db, resolve_stream};

pub fn run_add(external_id: &str, name: &str, channel: &str, human_flag: bool) -> Result<()> {
    if !is_valid_external_id(external_id) {
        bail!(
            "invalid video id '{}': expected 11 characters of [A-Za-z0-9_-]",
            external_id
        );
    }
    let config = Config::load()?;
    let db = open_db(&config)?;
    let stream = db.insert_stream(&Livestream::new(external_id, name, channel))?;

    if human_flag {
        println!("Tracking {} ({}) as #{}", stream.name, stream.external_id, stream.id);
    } else {
        let out = output::success("stream", json!({ "stream": stream }));
        println!("{}", serde_json::to_string(&out)?);
    }
    Ok(())
}

pub fn run_list(live_only: bool, human_flag: bool) -> Result<()> {
    let config = Config::load()?;
    let db = open_db(&config)?;
    let streams = db.list_streams(live_only)?;

    if human_flag {
        println!("{}", human::format_streams(&streams));
    } else {
        let out = output::success(
            "stream",
            json!({ "count": streams.len(), "streams": streams }),
        );
        println!("{}", serde_json::to_string(&out)?);
    }
    Ok(())
}

pub fn run_live(key: &str, is_live: bool) -> Result<()> {
    let config = Config::load()?;
    let db = open_db(&config)?;
    let stream = resolve_stream(&db, key)?;
    db.set_live(stream.id, is_live)?;

    let out = output::success(
        "stream",
        json!({ "id": stream.id, "external_id": stream.external_id, "is_live": is_live }),
    );
    println!("{}", serde_json::to_string(&out)?);
    Ok(())
}
