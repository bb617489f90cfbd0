use crate::config::{Log, Ranking, Refresh};

// default values
pub fn get_default_status_timeout_ms() -> u64 {
    10_000
}

pub fn get_default_latency_timeout_ms() -> u64 {
    30_000
}

pub fn get_default_interval_ms() -> u64 {
    30_000
}

pub fn get_default_status_port() -> u16 {
    8889
}

pub fn get_default_refresh() -> Refresh {
    Refresh {
        status_timeout_ms: get_default_status_timeout_ms(),
        latency_timeout_ms: get_default_latency_timeout_ms(),
        interval_ms: get_default_interval_ms(),
        status_port: get_default_status_port(),
    }
}

pub fn get_default_ranking_type() -> String {
    String::from("lowest-latency")
}

pub fn get_default_ranking() -> Ranking {
    Ranking {
        ranking_type: get_default_ranking_type(),
    }
}

pub fn get_default_log_level() -> String {
    String::from("info")
}

pub fn get_default_log() -> Log {
    Log {
        level: get_default_log_level(),
        file: None,
    }
}
