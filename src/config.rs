//! Runtime configuration read from the environment (and an optional `.env` file).

use chrono::Duration;
use log::warn;
use std::env;
use std::str::FromStr;

/// Latency thresholds used to turn an answer into a quality grade.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GradingConfig {
    /// Answers faster than this are "fast".
    pub fast_answer: Duration,
    /// Correct answers at or above this are "slow".
    pub slow_answer: Duration,
}

impl Default for GradingConfig {
    fn default() -> Self {
        Self {
            fast_answer: Duration::seconds(5),
            slow_answer: Duration::seconds(10),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub db_path: String,
    pub grading: GradingConfig,
    /// Sessions idle for longer than this are flushed and dropped by `evict_idle`.
    pub session_ttl: Duration,
    pub practice_size: usize,
    /// Decoy text used when a queue has fewer than three other answers.
    pub placeholder_decoy: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: "db.sqlite3".to_string(),
            grading: GradingConfig::default(),
            session_ttl: Duration::minutes(60),
            practice_size: 20,
            placeholder_decoy: "The Road So Far".to_string(),
        }
    }
}

impl Config {
    /// Loads `.env` if present, then reads `FLASHCARDS_*` variables on top of the defaults.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let fast_answer = parse_duration(
            "FLASHCARDS_FAST_ANSWER_SECS",
            Duration::try_seconds,
            defaults.grading.fast_answer,
        );
        let slow_answer = parse_duration(
            "FLASHCARDS_SLOW_ANSWER_SECS",
            Duration::try_seconds,
            defaults.grading.slow_answer,
        );

        let grading = if fast_answer <= slow_answer {
            GradingConfig {
                fast_answer,
                slow_answer,
            }
        } else {
            warn!(
                "Fast answer threshold ({}s) exceeds slow threshold ({}s), using defaults",
                fast_answer.num_seconds(),
                slow_answer.num_seconds()
            );
            defaults.grading
        };

        Self {
            db_path: env::var("FLASHCARDS_DB_PATH").unwrap_or(defaults.db_path),
            grading,
            session_ttl: parse_duration(
                "FLASHCARDS_SESSION_TTL_MINUTES",
                Duration::try_minutes,
                defaults.session_ttl,
            ),
            practice_size: parse_var("FLASHCARDS_PRACTICE_SIZE", defaults.practice_size),
            placeholder_decoy: env::var("FLASHCARDS_PLACEHOLDER_DECOY")
                .unwrap_or(defaults.placeholder_decoy),
        }
    }
}

fn parse_var<T: FromStr + Copy + std::fmt::Display>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring {}='{}', using default {}", name, raw, default);
            default
        }),
        Err(_) => default,
    }
}

/// Reads a positive whole number of units and turns it into a duration.
/// Zero, negative and out of range values fall back to `default`.
fn parse_duration(name: &str, build: fn(i64) -> Option<Duration>, default: Duration) -> Duration {
    let Ok(raw) = env::var(name) else {
        return default;
    };

    match raw
        .trim()
        .parse::<i64>()
        .ok()
        .filter(|units| *units > 0)
        .and_then(build)
    {
        Some(duration) => duration,
        None => {
            warn!(
                "Ignoring {}='{}', using default of {}s",
                name,
                raw,
                default.num_seconds()
            );
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.grading.fast_answer, Duration::seconds(5));
        assert_eq!(config.grading.slow_answer, Duration::seconds(10));
        assert_eq!(config.practice_size, 20);
        assert_eq!(config.session_ttl, Duration::minutes(60));
    }

    #[test]
    fn test_parse_var_falls_back_on_garbage() {
        // Name is unique to this test so parallel tests don't interfere
        let name = "FLASHCARDS_TEST_PARSE_VAR_GARBAGE";
        unsafe { env::set_var(name, "not-a-number") };
        assert_eq!(parse_var(name, 7usize), 7);

        unsafe { env::set_var(name, " 12 ") };
        assert_eq!(parse_var(name, 7usize), 12);

        unsafe { env::remove_var(name) };
        assert_eq!(parse_var(name, 7usize), 7);
    }

    #[test]
    fn test_parse_duration_rejects_out_of_range() {
        let name = "FLASHCARDS_TEST_PARSE_DURATION";
        let default = Duration::minutes(60);

        for raw in ["9223372036854775807", "0", "-5", "soon"] {
            unsafe { env::set_var(name, raw) };
            assert_eq!(parse_duration(name, Duration::try_minutes, default), default);
        }

        unsafe { env::set_var(name, "15") };
        assert_eq!(
            parse_duration(name, Duration::try_minutes, default),
            Duration::minutes(15)
        );
        unsafe { env::remove_var(name) };
    }

    #[test]
    fn test_huge_session_ttl_uses_default() {
        unsafe { env::set_var("FLASHCARDS_SESSION_TTL_MINUTES", "9223372036854775807") };
        let config = Config::from_env();
        unsafe { env::remove_var("FLASHCARDS_SESSION_TTL_MINUTES") };

        assert_eq!(config.session_ttl, Duration::minutes(60));
    }
}
