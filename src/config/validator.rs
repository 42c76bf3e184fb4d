//! Configuration validation

use super::*;
use anyhow::Result;

/// Validate complete configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_ramp(&config.ramp)?;
    validate_attack(&config.attack)?;
    validate_output(&config.output)?;

    Ok(())
}

/// Validate ramp parameters
///
/// Only the shape of the staircase is checked; rates may be zero or negative.
pub fn validate_ramp(ramp: &RampConfig) -> Result<()> {
    if ramp.duration_minutes < 1 {
        anyhow::bail!(
            "duration_minutes must be at least 1, got {}",
            ramp.duration_minutes
        );
    }

    if ramp.plateau_minutes < 0 {
        anyhow::bail!(
            "plateau_minutes must not be negative, got {}",
            ramp.plateau_minutes
        );
    }

    Ok(())
}

/// Validate attack configuration
pub fn validate_attack(attack: &AttackConfig) -> Result<()> {
    if attack.targets.is_none() {
        anyhow::bail!("A targets file is required");
    }

    if attack.max_workers == 0 {
        anyhow::bail!("max_workers must be at least 1");
    }

    if attack.timeout_secs == 0 {
        anyhow::bail!("timeout must be at least 1 second");
    }

    if attack.name.trim().is_empty() {
        anyhow::bail!("attack name must not be empty");
    }

    for header in &attack.headers {
        super::cli_convert::parse_header(header)?;
    }

    Ok(())
}

/// Validate output configuration
pub fn validate_output(output: &OutputConfig) -> Result<()> {
    if output.metrics_period_secs == 0 {
        anyhow::bail!("metrics_period_secs must be at least 1");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.attack.targets = Some(PathBuf::from("targets.jsonl"));
        config.output.metrics_file = Some(PathBuf::from("metrics.jsonl"));
        config
    }

    #[test]
    fn test_valid_config() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_validate_ramp_shape() {
        let mut ramp = RampConfig::default();
        ramp.duration_minutes = 0;
        assert!(validate_ramp(&ramp).is_err());

        ramp.duration_minutes = 1;
        ramp.plateau_minutes = -1;
        assert!(validate_ramp(&ramp).is_err());

        ramp.plateau_minutes = 0;
        assert!(validate_ramp(&ramp).is_ok());
    }

    #[test]
    fn test_validate_ramp_allows_non_positive_rates() {
        let ramp = RampConfig {
            start_freq: 0,
            slope_per_minute: -5,
            ..Default::default()
        };
        assert!(validate_ramp(&ramp).is_ok());
    }

    #[test]
    fn test_validate_attack() {
        let mut config = valid_config();
        config.attack.max_workers = 0;
        assert!(validate_config(&config).is_err());

        let mut config = valid_config();
        config.attack.timeout_secs = 0;
        assert!(validate_config(&config).is_err());

        let mut config = valid_config();
        config.attack.targets = None;
        assert!(validate_config(&config).is_err());

        let mut config = valid_config();
        config.attack.headers = vec!["broken".to_string()];
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_output() {
        let mut config = valid_config();
        config.output.metrics_period_secs = 0;
        assert!(validate_config(&config).is_err());

    }

    #[test]
    fn test_validate_without_metrics_file() {
        let mut config = valid_config();
        config.output.metrics_file = None;
        assert!(validate_config(&config).is_ok());
    }
}
