//! Weather forecast model and the placeholder generator.
//!
//! # Data Flow
//! ```text
//! GET /weatherforecast
//!     → generator.rs (today + 1..=5 days, random temperature and summary)
//!     → model.rs (WeatherForecast, serialized with derived temperatureF)
//!     → JSON array
//! ```

pub mod generator;
pub mod model;
pub mod random;

pub use generator::{generate_forecasts, FORECAST_DAYS, SUMMARIES};
pub use model::WeatherForecast;
pub use random::{RandomSource, SequenceRandom, ThreadRandom};
