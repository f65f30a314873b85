//! Tests for configuration

#[cfg(test)]
mod tests {
    use super::super::config::*;
    use crate::error::EngineError;
    use std::io::Write;

    #[test]
    fn test_engine_config_default() {
        let config = EngineConfig::default();
        assert_eq!(config.risk_free_rate, 0.05);
        assert_eq!(config.defensive_decay, 0.8);
        assert_eq!(config.sharpe_exponent, 2.0);
        assert_eq!(config.volatility_floor, 0.1);
        assert_eq!(config.frontier_points, 50);
        assert_eq!(config.weight_tolerance, 1e-6);
        assert_eq!(config.max_commit_retries, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_engine_config_defaults_from_empty_toml() {
        let config: EngineConfig = toml::from_str("").unwrap();
        assert_eq!(config.risk_free_rate, 0.05);
        assert_eq!(config.frontier_points, 50);
    }

    #[test]
    fn test_engine_config_partial_override() {
        let toml_str = r#"
risk_free_rate = 0.03
sharpe_exponent = 1.5
"#;
        let config: EngineConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.risk_free_rate, 0.03);
        assert_eq!(config.sharpe_exponent, 1.5);
        assert_eq!(config.defensive_decay, 0.8);
    }

    #[test]
    fn test_with_risk_free_rate() {
        let config = EngineConfig::default().with_risk_free_rate(0.02);
        assert_eq!(config.risk_free_rate, 0.02);
        assert_eq!(config.defensive_decay, 0.8);
    }

    #[test]
    fn test_validate_rejects_bad_parameters() {
        let cases = [
            EngineConfig { frontier_points: 0, ..EngineConfig::default() },
            EngineConfig { defensive_decay: 0.0, ..EngineConfig::default() },
            EngineConfig { sharpe_exponent: -1.0, ..EngineConfig::default() },
            EngineConfig { volatility_floor: f64::NAN, ..EngineConfig::default() },
            EngineConfig { risk_free_rate: f64::INFINITY, ..EngineConfig::default() },
            EngineConfig { weight_tolerance: 0.0, ..EngineConfig::default() },
        ];
        for config in cases {
            assert!(matches!(config.validate(), Err(EngineError::InvalidInput(_))));
        }
    }

    #[test]
    fn test_database_config_defaults() {
        let config: DatabaseConfig = toml::from_str("").unwrap();
        assert_eq!(config.path, "portfolio.db");
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.resolved_path(), "portfolio.db");
    }

    #[test]
    fn test_database_path_expands_home() {
        let config = DatabaseConfig {
            path: "~/portfolio.db".to_string(),
            ..DatabaseConfig::default()
        };
        let resolved = config.resolved_path();
        assert!(!resolved.starts_with('~'));
        assert!(resolved.ends_with("portfolio.db"));
    }

    #[test]
    fn test_forecast_config_defaults() {
        let toml_str = r#"
base_url = "http://localhost:8000"
"#;
        let config: ForecastConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.base_url, "http://localhost:8000");
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.max_concurrency, 8);
    }

    #[test]
    fn test_full_config_parse() {
        let toml_str = r#"
[engine]
risk_free_rate = 0.04
frontier_points = 20

[database]
path = "/tmp/engine.db"

[forecast]
base_url = "http://ml:8000"
max_concurrency = 2
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.engine.risk_free_rate, 0.04);
        assert_eq!(config.engine.frontier_points, 20);
        assert_eq!(config.database.path, "/tmp/engine.db");
        let forecast = config.forecast.unwrap();
        assert_eq!(forecast.max_concurrency, 2);
        assert_eq!(forecast.timeout_secs, 30);
    }

    #[test]
    fn test_config_default_has_no_forecast_service() {
        let config = Config::default();
        assert!(config.forecast.is_none());
        assert_eq!(config.database.path, "portfolio.db");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[engine]\ndefensive_decay = 0.5\n\n[database]\nmax_connections = 2").unwrap();

        let config = Config::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.engine.defensive_decay, 0.5);
        assert_eq!(config.database.max_connections, 2);
        assert_eq!(config.engine.risk_free_rate, 0.05);
    }

    #[test]
    fn test_load_rejects_invalid_engine_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[engine]\nfrontier_points = 0\n").unwrap();

        assert!(Config::load(path.to_str().unwrap()).is_err());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");

        let config = Config::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.engine.frontier_points, 50);
    }
}
