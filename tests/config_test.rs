use streamrank::models::anomaly::{
    Algorithm, AnomalyConfig, AnomalySettings, ConfigError, QuantileParams, ZScoreParams,
};
use streamrank::models::config::Config;

fn rejected_field(settings: AnomalySettings) -> &'static str {
    match settings.build() {
        Err(ConfigError::Invalid { field, .. }) => field,
        other => panic!("expected an invalid field, got {:?}", other),
    }
}

#[test]
fn test_defaults() {
    let c = AnomalyConfig::default();
    assert_eq!(c.recent_window_minutes(), 15);
    assert_eq!(c.baseline_hours(), 24);
    assert_eq!(c.min_recent_samples(), 5);
    assert_eq!(c.min_baseline_samples(), 1000);
    assert_eq!(c.algorithm(), Algorithm::Quantile);
    assert_eq!(c.score_min(), 0.0);
    assert_eq!(c.score_max(), 100.0);
    assert_eq!(c.logistic_midpoint(), 0.0);
    assert_eq!(c.logistic_steepness(), 1.0);
    assert_eq!(c.inactive_threshold_minutes(), 60);
    assert_eq!(c.min_viewcount(), 10);
    assert_eq!(c.quantile_params().spike_threshold(), 1.5);
    assert!(c.zscore_params().use_modified_zscore());
}

#[test]
fn test_default_settings_build_to_default_config() {
    assert_eq!(AnomalySettings::default().build().unwrap(), AnomalyConfig::default());
}

#[test]
fn test_derived_windows() {
    let c = AnomalyConfig::default();
    assert_eq!(c.recent_window_seconds(), 900);
    assert_eq!(c.baseline_seconds(), 86_400);
    assert_eq!(c.recent_window(), chrono::Duration::minutes(15));
    assert_eq!(c.inactive_threshold(), chrono::Duration::minutes(60));
}

#[test]
fn test_recent_window_below_minimum_rejected() {
    let s = AnomalySettings {
        recent_window_minutes: 4,
        ..Default::default()
    };
    assert_eq!(rejected_field(s), "recent_window_minutes");
}

#[test]
fn test_zero_baseline_rejected() {
    let s = AnomalySettings {
        baseline_hours: 0,
        ..Default::default()
    };
    assert_eq!(rejected_field(s), "baseline_hours");
}

#[test]
fn test_recent_window_must_be_shorter_than_baseline() {
    let s = AnomalySettings {
        recent_window_minutes: 60,
        baseline_hours: 1,
        ..Default::default()
    };
    assert_eq!(rejected_field(s), "recent_window_minutes");
}

#[test]
fn test_sample_minimums() {
    let s = AnomalySettings {
        min_recent_samples: 0,
        ..Default::default()
    };
    assert_eq!(rejected_field(s), "min_recent_samples");

    let s = AnomalySettings {
        min_baseline_samples: 1,
        ..Default::default()
    };
    assert_eq!(rejected_field(s), "min_baseline_samples");
}

#[test]
fn test_score_bounds_must_be_ordered() {
    let s = AnomalySettings {
        score_min: 100.0,
        score_max: 100.0,
        ..Default::default()
    };
    assert_eq!(rejected_field(s), "score_min");
}

#[test]
fn test_non_finite_score_bound_rejected() {
    let s = AnomalySettings {
        score_max: f64::INFINITY,
        ..Default::default()
    };
    assert_eq!(rejected_field(s), "score_max");
}

#[test]
fn test_steepness_must_be_positive() {
    let s = AnomalySettings {
        logistic_steepness: 0.0,
        ..Default::default()
    };
    assert_eq!(rejected_field(s), "logistic_steepness");
}

#[test]
fn test_negative_min_viewcount_rejected() {
    let s = AnomalySettings {
        min_viewcount: -1,
        ..Default::default()
    };
    assert_eq!(rejected_field(s), "min_viewcount");
}

#[test]
fn test_unknown_algorithm_rejected() {
    let s = AnomalySettings {
        algorithm: "median".into(),
        ..Default::default()
    };
    assert!(matches!(s.build(), Err(ConfigError::UnknownAlgorithm(_))));
}

#[test]
fn test_algorithm_name_is_case_insensitive() {
    let s = AnomalySettings {
        algorithm: " ZScore ".into(),
        ..Default::default()
    };
    assert_eq!(s.build().unwrap().algorithm(), Algorithm::Zscore);
}

#[test]
fn test_quantile_params_validation() {
    assert!(QuantileParams::new(101.0, 90.0, 1.5, 1.2).is_err());
    assert!(QuantileParams::new(75.0, -1.0, 1.5, 1.2).is_err());
    assert!(QuantileParams::new(75.0, 90.0, 0.9, 1.2).is_err());
    assert!(QuantileParams::new(75.0, 90.0, 1.5, 0.5).is_err());
    assert!(QuantileParams::new(0.0, 100.0, 1.0, 1.0).is_ok());
}

#[test]
fn test_zscore_params_validation() {
    assert!(ZScoreParams::new(-0.1, true, 10.0, true).is_err());
    assert!(ZScoreParams::new(2.0, true, 0.0, true).is_err());
    assert!(ZScoreParams::new(0.0, false, 0.5, false).is_ok());
}

#[test]
fn test_nested_error_names_dotted_field() {
    let mut s = AnomalySettings::default();
    s.quantile_params.baseline_percentile = 150.0;
    assert_eq!(rejected_field(s), "quantile_params.baseline_percentile");
}

#[test]
fn test_toml_with_invalid_values_fails_to_load() {
    let result: Result<AnomalyConfig, _> = toml::from_str("recent_window_minutes = 2");
    assert!(result.is_err());
}

#[test]
fn test_partial_toml_uses_defaults() {
    let config: Config = toml::from_str(
        "[anomaly]\nalgorithm = \"zscore\"\n\n[anomaly.zscore_params]\nzscore_threshold = 3.0\n",
    )
    .unwrap();
    let anomaly = config.anomaly_config().unwrap();
    assert_eq!(anomaly.algorithm(), Algorithm::Zscore);
    assert_eq!(anomaly.zscore_params().zscore_threshold(), 3.0);
    assert_eq!(anomaly.recent_window_minutes(), 15);
    assert_eq!(config.detector.workers, 4);
    assert_eq!(config.detector.busy_timeout_ms, 5000);
}

#[test]
fn test_config_serializes_as_settings() {
    let text = toml::to_string(&AnomalyConfig::default()).unwrap();
    let back: AnomalyConfig = toml::from_str(&text).unwrap();
    assert_eq!(back, AnomalyConfig::default());
}
