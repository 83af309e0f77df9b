//! `urbanroute doctor`: Diagnose config, checkpoint and credentials.

use std::path::Path;
use urbanroute_classifier::LoadedModel;
use urbanroute_config::{AppConfig, ConfigError};
use urbanroute_core::Label;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Ok,
    Warn,
    Fail,
}

#[derive(Debug)]
struct Check {
    status: Status,
    message: String,
}

impl Check {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            status: Status::Ok,
            message: message.into(),
        }
    }

    fn warn(message: impl Into<String>) -> Self {
        Self {
            status: Status::Warn,
            message: message.into(),
        }
    }

    fn fail(message: impl Into<String>) -> Self {
        Self {
            status: Status::Fail,
            message: message.into(),
        }
    }
}

fn diagnose(config_path: &Path, loaded: &Result<AppConfig, ConfigError>) -> Vec<Check> {
    let mut checks = Vec::new();

    let config = match loaded {
        Ok(config) => {
            if config_path.exists() {
                checks.push(Check::ok(format!("Config file valid: {}", config_path.display())));
            } else {
                checks.push(Check::warn(format!(
                    "No config file at {}, using defaults (run `urbanroute config init`)",
                    config_path.display()
                )));
            }
            config
        }
        Err(e) => {
            checks.push(Check::fail(format!("Config invalid: {e}")));
            return checks;
        }
    };

    match LoadedModel::load(&config.checkpoint) {
        Ok(model) => checks.push(Check::ok(format!(
            "Checkpoint loads: {} ({} encoder, dimension {})",
            config.checkpoint.display(),
            model.encoder().kind(),
            model.dimension()
        ))),
        Err(e) => checks.push(Check::fail(format!("Checkpoint unusable: {e}"))),
    }

    let responders = &config.responders;
    let needs_llm: Vec<Label> = [Label::Transport, Label::Culture, Label::Leisure]
        .into_iter()
        .filter(|&label| responders.is_enabled(label))
        .collect();
    if needs_llm.is_empty() {
        checks.push(Check::ok("No LLM-backed responder enabled"));
    } else if config.llm.api_key.is_some() {
        checks.push(Check::ok(format!("LLM API key configured ({})", config.llm.base_url)));
    } else {
        checks.push(Check::warn(format!(
            "No LLM API key (set OPENAI_API_KEY); {needs_llm:?} will answer with errors"
        )));
    }

    if responders.is_enabled(Label::Transport) {
        if responders.transport.google_maps_api_key.is_some() {
            checks.push(Check::ok("Google Maps API key configured"));
        } else {
            checks.push(Check::warn(
                "No Google Maps API key (set GOOGLE_MAPS_API_KEY); itineraries unavailable",
            ));
        }
    }

    let enabled: Vec<Label> = Label::ALL
        .into_iter()
        .filter(|&label| responders.is_enabled(label))
        .collect();
    if enabled.is_empty() {
        checks.push(Check::warn("All responders disabled; every request gets a notice"));
    } else {
        checks.push(Check::ok(format!("Responders enabled: {enabled:?}")));
    }

    checks
}

pub fn run(
    config_path: &Path,
    loaded: Result<AppConfig, ConfigError>,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("urbanroute doctor");
    println!("=================\n");

    let checks = diagnose(config_path, &loaded);
    for check in &checks {
        let marker = match check.status {
            Status::Ok => "✅",
            Status::Warn => "⚠️ ",
            Status::Fail => "❌",
        };
        println!("  {marker} {}", check.message);
    }

    let issues = checks.iter().filter(|c| c.status != Status::Ok).count();
    println!();
    if issues == 0 {
        println!("  All checks passed!");
    } else {
        println!("  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn statuses(checks: &[Check]) -> Vec<Status> {
        checks.iter().map(|c| c.status).collect()
    }

    #[test]
    fn invalid_config_stops_early() {
        let loaded = Err(ConfigError::ValidationError("bad".into()));
        let checks = diagnose(Path::new("/nowhere/config.toml"), &loaded);
        assert_eq!(statuses(&checks), vec![Status::Fail]);
        assert!(checks[0].message.contains("bad"));
    }

    #[test]
    fn missing_checkpoint_and_keys_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            checkpoint: dir.path().join("absent"),
            ..AppConfig::default()
        };
        let checks = diagnose(&dir.path().join("config.toml"), &Ok(config));

        assert_eq!(checks[0].status, Status::Warn);
        assert_eq!(checks[1].status, Status::Fail);
        assert!(checks[1].message.starts_with("Checkpoint unusable"));
        assert!(checks.iter().any(|c| c.message.contains("OPENAI_API_KEY")));
        assert!(checks.iter().any(|c| c.message.contains("GOOGLE_MAPS_API_KEY")));
    }

    #[test]
    fn disabled_responders_need_no_keys() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig {
            checkpoint: dir.path().join("absent"),
            ..AppConfig::default()
        };
        config.responders.transport.enabled = false;
        config.responders.culture.enabled = false;
        config.responders.leisure.enabled = false;

        let checks = diagnose(&dir.path().join("config.toml"), &Ok(config));
        assert!(checks.iter().all(|c| !c.message.contains("API key (set")));
        assert!(checks.iter().any(|c| c.message == "Responders enabled: [Weather]"));
    }
}
