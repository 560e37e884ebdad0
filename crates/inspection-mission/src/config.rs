//! Mission supervisor configuration from environment.

use std::env;
use std::time::Duration;

use inspection_core::MissionParameters;

use crate::fetch::FetchPolicy;

#[derive(Debug, Clone)]
pub struct MissionConfig {
    pub parameters: MissionParameters,
    /// Delay before a photo waypoint without a "reached" flag forces a review
    pub review_timeout: Duration,
    pub fetch: FetchPolicy,
    /// Capacity of the control loop's event queue
    pub event_buffer: usize,
}

impl Default for MissionConfig {
    fn default() -> Self {
        Self {
            parameters: MissionParameters::default(),
            review_timeout: Duration::from_secs(3),
            fetch: FetchPolicy::default(),
            event_buffer: 256,
        }
    }
}

impl MissionConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let params = defaults.parameters;
        let fetch = defaults.fetch;

        Self {
            parameters: MissionParameters {
                auto_flight_speed_mps: env_parse("INSPECTION_SPEED_MPS", params.auto_flight_speed_mps),
                max_flight_speed_mps: env_parse("INSPECTION_MAX_SPEED_MPS", params.max_flight_speed_mps),
                safety_altitude_m: env_parse("INSPECTION_SAFETY_ALTITUDE_M", params.safety_altitude_m),
                safety_clearance_m: env_parse("INSPECTION_SAFETY_CLEARANCE_M", params.safety_clearance_m),
                ..params
            },
            review_timeout: env_millis("INSPECTION_REVIEW_TIMEOUT_MS", defaults.review_timeout),
            fetch: FetchPolicy {
                settle_delay: env_millis("INSPECTION_FETCH_SETTLE_MS", fetch.settle_delay),
                list_delay: env_millis("INSPECTION_FETCH_LIST_DELAY_MS", fetch.list_delay),
                retry_delay: env_millis("INSPECTION_FETCH_RETRY_DELAY_MS", fetch.retry_delay),
                max_attempts: env_parse("INSPECTION_FETCH_MAX_ATTEMPTS", fetch.max_attempts).max(1),
                creation_slack: env_millis("INSPECTION_FETCH_SLACK_MS", fetch.creation_slack),
                attempt_timeout: env_millis("INSPECTION_FETCH_ATTEMPT_TIMEOUT_MS", fetch.attempt_timeout),
                initial_location: fetch.initial_location,
            },
            event_buffer: env_parse("INSPECTION_EVENT_BUFFER", defaults.event_buffer).max(1),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_millis(key: &str, default: Duration) -> Duration {
    env::var(key)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}
