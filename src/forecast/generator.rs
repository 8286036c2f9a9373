//! Placeholder forecast generation.

use chrono::{Days, NaiveDate};

use crate::forecast::model::WeatherForecast;
use crate::forecast::random::RandomSource;

/// Number of days returned per call.
pub const FORECAST_DAYS: u64 = 5;

/// Inclusive lower bound of generated temperatures.
pub const MIN_TEMPERATURE_C: i32 = -20;

/// Exclusive upper bound of generated temperatures.
pub const MAX_TEMPERATURE_C: i32 = 55;

/// Summary labels. Picked independently of the temperature.
pub const SUMMARIES: [&str; 10] = [
    "Freezing",
    "Bracing",
    "Chilly",
    "Cool",
    "Mild",
    "Warm",
    "Balmy",
    "Hot",
    "Sweltering",
    "Scorching",
];

/// Forecasts for the five days following `today`, in date order.
pub fn generate_forecasts(today: NaiveDate, rng: &dyn RandomSource) -> Vec<WeatherForecast> {
    (1..=FORECAST_DAYS)
        .filter_map(|offset| today.checked_add_days(Days::new(offset)))
        .map(|date| {
            let temperature_c = rng.next_in_range(MIN_TEMPERATURE_C, MAX_TEMPERATURE_C);
            let index = rng.next_in_range(0, SUMMARIES.len() as i32) as usize;
            WeatherForecast::new(date, temperature_c, Some(SUMMARIES[index].to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::random::{SequenceRandom, ThreadRandom};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 12, 29).unwrap()
    }

    #[test]
    fn test_five_consecutive_days_after_today() {
        let forecasts = generate_forecasts(today(), &ThreadRandom);
        assert_eq!(forecasts.len(), 5);
        for (i, f) in forecasts.iter().enumerate() {
            assert_eq!(f.date, today() + Days::new(i as u64 + 1));
            assert!(f.date > today());
        }
        // crosses the year boundary
        assert_eq!(forecasts[4].date, NaiveDate::from_ymd_opt(2027, 1, 3).unwrap());
    }

    #[test]
    fn test_values_come_from_the_source() {
        let rng = SequenceRandom::new(vec![-20, 0, 54, 9, 10, 4]);
        let forecasts = generate_forecasts(today(), &rng);

        assert_eq!(forecasts[0].temperature_c, -20);
        assert_eq!(forecasts[0].summary.as_deref(), Some("Freezing"));
        assert_eq!(forecasts[1].temperature_c, 54);
        assert_eq!(forecasts[1].summary.as_deref(), Some("Scorching"));
        assert_eq!(forecasts[2].temperature_c, 10);
        assert_eq!(forecasts[2].summary.as_deref(), Some("Mild"));
    }

    #[test]
    fn test_random_values_in_range() {
        for _ in 0..200 {
            for f in generate_forecasts(today(), &ThreadRandom) {
                assert!((MIN_TEMPERATURE_C..MAX_TEMPERATURE_C).contains(&f.temperature_c));
                assert!(SUMMARIES.contains(&f.summary.as_deref().unwrap()));
            }
        }
    }
}
