pub mod anomaly;
pub mod config;
pub mod score;
pub mod series;
pub mod stream;

pub use anomaly::{AnomalyConfig, AnomalySettings};
pub use score::{AnomalyScore, Status};
pub use series::TimeSeries;
pub use stream::{Livestream, Sample};
