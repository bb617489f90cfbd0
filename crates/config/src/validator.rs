use std::{collections::HashSet, net::ToSocketAddrs};

use http::Uri;
use log::{error, info};

use crate::{ConfigError, config::Config};

pub const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

pub const VALID_RANKING_TYPES: &[&str] = &[
    "lowest-latency",
    "lowest_latency",
    "latency",
    "config-order",
    "config_order",
    "health-only",
    "least-load",
    "least_load",
];

fn invalid(message: String) -> ConfigError {
    error!("{}", message);
    ConfigError::Invalid(message)
}

fn is_absolute_url(value: &str) -> bool {
    match value.parse::<Uri>() {
        Ok(uri) => uri.scheme().is_some() && uri.authority().is_some(),
        Err(_) => false,
    }
}

pub fn validate(config: &Config) -> Result<(), ConfigError> {
    info!("Starting configuration validation...");

    // --- Validate Log level ---
    if !VALID_LOG_LEVELS
        .iter()
        .any(|lvl| lvl.eq_ignore_ascii_case(&config.log.level))
    {
        return Err(invalid(format!("Invalid log level: {}", config.log.level)));
    }

    // --- Validate ranking type ---
    if !VALID_RANKING_TYPES
        .iter()
        .any(|t| t.eq_ignore_ascii_case(config.ranking.ranking_type.trim()))
    {
        return Err(invalid(format!(
            "Invalid ranking type: {}",
            config.ranking.ranking_type
        )));
    }

    // --- Validate refresh timings ---
    let refresh = &config.refresh;
    if refresh.status_timeout_ms == 0 {
        return Err(invalid("Status refresh timeout is invalid (0)".to_string()));
    }
    if refresh.latency_timeout_ms == 0 {
        return Err(invalid("Latency refresh timeout is invalid (0)".to_string()));
    }
    if refresh.interval_ms == 0 {
        return Err(invalid("Refresh interval is invalid (0)".to_string()));
    }
    if refresh.status_port == 0 {
        return Err(invalid("PoP status port is invalid (0)".to_string()));
    }

    // --- Validate observability listener ---
    if let Some(observability) = &config.observability {
        if observability.address.is_empty() {
            return Err(invalid("Observability listen address is empty".to_string()));
        }
        let resolves = observability
            .bind_address()
            .to_socket_addrs()
            .is_ok_and(|mut addrs| addrs.next().is_some());
        if !resolves {
            return Err(invalid(format!(
                "Invalid observability listen address: {}",
                observability.address
            )));
        }
    }

    // --- Validate PoPs ---
    if config.pops.is_empty() {
        return Err(invalid("No PoPs configured".to_string()));
    }

    let mut pop_ids = HashSet::new();
    for pop in &config.pops {
        if pop.id.is_empty() {
            return Err(invalid(format!("PoP id is missing for PoP at {}", pop.ip4)));
        }

        if !pop_ids.insert(pop.id.as_str()) {
            return Err(invalid(format!("Duplicate PoP id '{}'", pop.id)));
        }

        if pop.latency_endpoint_url.is_empty() {
            return Err(invalid(format!(
                "Latency endpoint URL is missing for PoP id '{}'",
                pop.id
            )));
        }

        if !is_absolute_url(&pop.latency_endpoint_url) {
            return Err(invalid(format!(
                "Latency endpoint URL '{}' is invalid for PoP id '{}'",
                pop.latency_endpoint_url, pop.id
            )));
        }
    }

    // --- Validate regions ---
    let mut region_ids = HashSet::new();
    for region in &config.regions {
        if region.id.is_empty() {
            return Err(invalid("Region id is missing".to_string()));
        }

        if !region_ids.insert(region.id.as_str()) {
            return Err(invalid(format!("Duplicate region id '{}'", region.id)));
        }

        if region.prefices.is_empty() {
            return Err(invalid(format!(
                "No prefices configured for region id '{}'",
                region.id
            )));
        }

        if region.prober_url.is_empty() {
            return Err(invalid(format!(
                "Prober URL is missing for region id '{}'",
                region.id
            )));
        }

        if !is_absolute_url(&region.prober_url) {
            return Err(invalid(format!(
                "Prober URL '{}' is invalid for region id '{}'",
                region.prober_url, region.id
            )));
        }
    }

    info!("Configuration validation passed successfully");

    Ok(())
}
