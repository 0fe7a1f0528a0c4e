use anyhow::Result;
use serde_json::json;

use streamrank::core::detector::Detector;
use streamrank::models::config::Config;
use streamrank::output;
use streamrank::output::human;

use super::{detection_config, open_db, resolve_stream};

pub fn run(key: &str, algorithm: Option<&str>, human_flag: bool) -> Result<()> {
    let config = Config::load()?;
    let db = open_db(&config)?;
    let stream = resolve_stream(&db, key)?;
    let anomaly = detection_config(&db, &config, algorithm)?;
    let score = Detector::new(anomaly, &db)?.detect_for_stream(stream.id);

    if human_flag {
        println!("{}", human::format_score(&score));
    } else {
        let out = output::success("score", json!({ "result": score.to_record() }));
        println!("{}", serde_json::to_string(&out)?);
    }
    Ok(())
}
