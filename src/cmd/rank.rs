use anyhow::Result;
use serde_json::json;

use streamrank::core::detector::Detector;
use streamrank::models::config::Config;
use streamrank::models::score::AnomalyScore;
use streamrank::output;
use streamrank::output::human;

use super::{detection_config, open_db};

/// `trending` holds the minimum score when only trending streams are wanted.
pub fn run(
    limit: Option<usize>,
    algorithm: Option<&str>,
    trending: Option<f64>,
    human_flag: bool,
) -> Result<()> {
    let config = Config::load()?;
    let db = open_db(&config)?;
    let anomaly = detection_config(&db, &config, algorithm)?;
    let detector = Detector::new(anomaly, &db)?.workers(config.detector.workers);

    let scores = match trending {
        Some(min_score) => detector.trending(min_score, limit.unwrap_or(usize::MAX))?,
        None => detector.detect_all_live(limit)?,
    };

    if human_flag {
        println!("{}", human::format_ranking(&scores));
    } else {
        let records: Vec<_> = scores.iter().map(AnomalyScore::to_record).collect();
        let out = output::success(
            "rank",
            json!({
                "algorithm": detector.algorithm(),
                "count": records.len(),
                "results": records,
            }),
        );
        println!("{}", serde_json::to_string(&out)?);
    }
    Ok(())
}
