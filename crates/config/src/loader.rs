use std::fs;

use crate::{ConfigError, config::Config};

pub fn read_config(filename: &str) -> Result<Config, ConfigError> {
    let text = fs::read_to_string(filename).map_err(|source| ConfigError::Read {
        path: filename.to_string(),
        source,
    })?;

    parse_yaml(&text, filename)
}

pub fn parse_config(text: &str) -> Result<Config, ConfigError> {
    parse_yaml(text, "<string>")
}

fn parse_yaml(text: &str, origin: &str) -> Result<Config, ConfigError> {
    serde_yaml::from_str(text).map_err(|source| ConfigError::Parse {
        origin: origin.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const SAMPLE: &str = r#"
prober_secret: hirakegoma
pops:
  - id: shinjuku
    ip4: 192.0.2.1
    latency_endpoint_url: http://192.0.2.1/latencyz
  - id: shibuya
    ip4: 192.0.2.2
    latency_endpoint_url: http://192.0.2.2/latencyz
    ui_popup_css: "top: 12px"
regions:
  - id: us-west
    prefices: [198.51.100.0/28, 198.51.100.192/28]
    prober_url: http://203.0.113.10:8823/probe
"#;

    #[test]
    fn parses_sample_with_defaults() {
        let config = parse_config(SAMPLE).unwrap();

        assert_eq!(config.prober_secret, "hirakegoma");
        assert_eq!(config.pops.len(), 2);
        assert_eq!(config.pops[0].ip4, "192.0.2.1".parse::<std::net::Ipv4Addr>().unwrap());
        assert_eq!(config.pops[1].ui_popup_css, "top: 12px");
        assert_eq!(config.regions[0].prefices.len(), 2);
        assert_eq!(config.regions[0].prefices[1].prefix(), 28);

        assert!(config.observability.is_none());
        assert_eq!(config.refresh.status_timeout_ms, 10_000);
        assert_eq!(config.refresh.latency_timeout_ms, 30_000);
        assert_eq!(config.refresh.interval_ms, 30_000);
        assert_eq!(config.refresh.status_port, 8889);
        assert_eq!(config.ranking.ranking_type, "lowest-latency");
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn rejects_invalid_ipv4() {
        let text = SAMPLE.replace("192.0.2.2\n", "192.0.2.256\n");
        let err = parse_config(&text).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn rejects_invalid_cidr() {
        let text = SAMPLE.replace("198.51.100.0/28", "198.51.100.0/33");
        let err = parse_config(&text).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn reads_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = read_config(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.pops[1].id, "shibuya");
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = read_config("/nonexistent/gslb.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
