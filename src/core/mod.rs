pub mod detector;
pub mod factory;
pub mod normalize;
pub mod overrides;
pub mod quantile;
pub mod stats;
pub mod strategy;
pub mod zscore;
