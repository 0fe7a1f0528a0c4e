//! Name → constructor registry for scoring strategies.

use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

use crate::core::quantile::QuantileStrategy;
use crate::core::strategy::ScoringStrategy;
use crate::core::zscore::ZScoreStrategy;
use crate::models::anomaly::AnomalyConfig;

/// Builds a strategy from a validated config.
pub type StrategyCtor = Arc<dyn Fn(&AnomalyConfig) -> Box<dyn ScoringStrategy> + Send + Sync>;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum FactoryError {
    #[error("unknown algorithm '{name}'. Available algorithms: {available}")]
    UnknownAlgorithm { name: String, available: String },
    #[error("strategy '{0}' is already registered")]
    AlreadyRegistered(String),
    #[error("strategy name must not be empty")]
    EmptyName,
    #[error("strategy registered as '{name}' reports itself as '{reported}'")]
    Incompatible { name: String, reported: String },
}

fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Registry of available strategies.
///
/// `Default` provides `quantile` and `zscore`. Each detector owns its
/// registry, so registering a custom strategy never affects other callers.
#[derive(Clone)]
pub struct StrategyRegistry {
    ctors: BTreeMap<String, StrategyCtor>,
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        let mut ctors: BTreeMap<String, StrategyCtor> = BTreeMap::new();
        ctors.insert(
            "quantile".into(),
            Arc::new(|c: &AnomalyConfig| Box::new(QuantileStrategy::new(c)) as Box<dyn ScoringStrategy>),
        );
        ctors.insert(
            "zscore".into(),
            Arc::new(|c: &AnomalyConfig| Box::new(ZScoreStrategy::new(c)) as Box<dyn ScoringStrategy>),
        );
        Self { ctors }
    }
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("algorithms", &self.available_algorithms())
            .finish()
    }
}

impl StrategyRegistry {
    /// A registry with nothing in it.
    pub fn empty() -> Self {
        Self {
            ctors: BTreeMap::new(),
        }
    }

    /// Strategy selected by `config.algorithm()`.
    pub fn create(&self, config: &AnomalyConfig) -> Result<Box<dyn ScoringStrategy>, FactoryError> {
        self.create_by_name(config.algorithm().as_str(), config)
    }

    /// Strategy selected by an external name (trimmed, case-insensitive).
    pub fn create_by_name(
        &self,
        name: &str,
        config: &AnomalyConfig,
    ) -> Result<Box<dyn ScoringStrategy>, FactoryError> {
        let key = normalize_name(name);
        match self.ctors.get(&key) {
            Some(ctor) => Ok(ctor(config)),
            None => Err(FactoryError::UnknownAlgorithm {
                name: key,
                available: self.available_algorithms().join(", "),
            }),
        }
    }

    /// Add a strategy under `name`.
    ///
    /// The constructor is probed once with the default config; the strategy
    /// it builds must answer to the name it is registered under.
    pub fn register<F>(&mut self, name: &str, ctor: F) -> Result<(), FactoryError>
    where
        F: Fn(&AnomalyConfig) -> Box<dyn ScoringStrategy> + Send + Sync + 'static,
    {
        let key = normalize_name(name);
        if key.is_empty() {
            return Err(FactoryError::EmptyName);
        }
        if self.ctors.contains_key(&key) {
            return Err(FactoryError::AlreadyRegistered(key));
        }
        let probe = ctor(&AnomalyConfig::default());
        let reported = normalize_name(probe.name());
        if reported != key {
            return Err(FactoryError::Incompatible {
                name: key,
                reported: probe.name().to_string(),
            });
        }
        self.ctors.insert(key, Arc::new(ctor));
        Ok(())
    }

    /// Remove a strategy. Returns whether it was registered.
    pub fn unregister(&mut self, name: &str) -> bool {
        self.ctors.remove(&normalize_name(name)).is_some()
    }

    /// Registered names, sorted.
    pub fn available_algorithms(&self) -> Vec<String> {
        self.ctors.keys().cloned().collect()
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.ctors.contains_key(&normalize_name(name))
    }
}
