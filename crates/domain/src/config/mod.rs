mod infrastructure;
mod memory;
mod security;
mod skills;
mod tape;
mod verification;
mod workspace;

pub use infrastructure::*;
pub use memory::*;
pub use security::*;
pub use skills::*;
pub use tape::*;
pub use verification::*;
pub use workspace::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub infrastructure: InfrastructureConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub verification: VerificationConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub skills: SkillsConfig,
    #[serde(default)]
    pub tape: TapeConfig,
}

impl Config {
    pub fn from_toml_str(s: &str) -> crate::error::Result<Self> {
        toml::from_str(s).map_err(|e| crate::error::Error::Config(e.to_string()))
    }

    pub fn events_dir(&self) -> std::path::PathBuf {
        self.workspace.root.join(&self.infrastructure.events.dir)
    }

    pub fn snapshots_dir(&self) -> std::path::PathBuf {
        self.workspace
            .root
            .join(&self.infrastructure.snapshots.dir)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        let cb = &self.infrastructure.context_budget;
        if cb.max_injection_tokens == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "infrastructure.context_budget.max_injection_tokens".into(),
                message: "must be greater than 0".into(),
            });
        }
        if !(0.0..=1.0).contains(&cb.hard_limit_percent) {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "infrastructure.context_budget.hard_limit_percent".into(),
                message: "must be between 0.0 and 1.0".into(),
            });
        }
        if cb.compaction_threshold_percent >= cb.hard_limit_percent {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "infrastructure.context_budget.compaction_threshold_percent".into(),
                message: "compaction threshold should be below the hard limit or compaction never runs before rejection".into(),
            });
        }
        if cb.compaction_circuit_breaker.max_consecutive_failures == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "infrastructure.context_budget.compaction_circuit_breaker.max_consecutive_failures".into(),
                message: "must be greater than 0".into(),
            });
        }

        if self.tape.checkpoint_interval_entries == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "tape.checkpoint_interval_entries".into(),
                message: "must be greater than 0".into(),
            });
        }

        if self.skills.roots.is_empty() && self.skills.packs.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "skills.roots".into(),
                message: "no skill roots or packs configured".into(),
            });
        }
        if self.skills.selector.k == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "skills.selector.k".into(),
                message: "must be greater than 0".into(),
            });
        }

        if let Some(budget) = self.infrastructure.cost_tracking.max_cost_usd_per_session {
            if budget < 0.0 {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: "infrastructure.cost_tracking.max_cost_usd_per_session".into(),
                    message: "must not be negative".into(),
                });
            }
        }

        if self.memory.enabled && self.memory.external_recall.enabled {
            let min_score = self.memory.external_recall.min_internal_score;
            if !(0.0..=1.0).contains(&min_score) {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: "memory.external_recall.min_internal_score".into(),
                    message: "must be between 0.0 and 1.0".into(),
                });
            }
        }

        for (check, command) in &self.verification.commands {
            if command.trim().is_empty() {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("verification.commands.{check}"),
                    message: "command must not be empty".into(),
                });
            }
        }

        errors
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    fn find_issue<'a>(issues: &'a [ConfigError], field_prefix: &str) -> Option<&'a ConfigError> {
        issues.iter().find(|e| e.field.starts_with(field_prefix))
    }

    #[test]
    fn default_config_has_no_errors() {
        let issues = Config::default().validate();
        let errors: Vec<_> = issues
            .iter()
            .filter(|e| e.severity == ConfigSeverity::Error)
            .collect();
        assert!(errors.is_empty(), "expected no errors, got: {errors:?}");
    }

    #[test]
    fn zero_max_injection_tokens_is_error() {
        let mut cfg = Config::default();
        cfg.infrastructure.context_budget.max_injection_tokens = 0;
        let issues = cfg.validate();
        let issue = find_issue(&issues, "infrastructure.context_budget.max_injection_tokens")
            .expect("expected error");
        assert_eq!(issue.severity, ConfigSeverity::Error);
    }

    #[test]
    fn compaction_threshold_above_hard_limit_is_warning() {
        let mut cfg = Config::default();
        cfg.infrastructure.context_budget.hard_limit_percent = 0.5;
        cfg.infrastructure.context_budget.compaction_threshold_percent = 0.8;
        let issues = cfg.validate();
        let issue = find_issue(&issues, "infrastructure.context_budget.compaction_threshold_percent")
            .expect("expected warning");
        assert_eq!(issue.severity, ConfigSeverity::Warning);
    }

    #[test]
    fn zero_checkpoint_interval_is_error() {
        let mut cfg = Config::default();
        cfg.tape.checkpoint_interval_entries = 0;
        let issues = cfg.validate();
        assert!(find_issue(&issues, "tape.checkpoint_interval_entries").is_some());
    }

    #[test]
    fn empty_skill_roots_and_packs_is_warning() {
        let mut cfg = Config::default();
        cfg.skills.roots.clear();
        let issues = cfg.validate();
        let issue = find_issue(&issues, "skills.roots").expect("expected warning");
        assert_eq!(issue.severity, ConfigSeverity::Warning);
    }

    #[test]
    fn negative_cost_budget_is_error() {
        let mut cfg = Config::default();
        cfg.infrastructure.cost_tracking.max_cost_usd_per_session = Some(-1.0);
        let issues = cfg.validate();
        assert!(find_issue(&issues, "infrastructure.cost_tracking.max_cost_usd_per_session").is_some());
    }

    #[test]
    fn default_config_round_trips_through_toml() {
        let cfg = Config::default();
        let s = toml::to_string(&cfg).expect("serialize");
        let back: Config = toml::from_str(&s).expect("deserialize");
        assert_eq!(
            back.infrastructure.context_budget.max_injection_tokens,
            cfg.infrastructure.context_budget.max_injection_tokens
        );
    }

    #[test]
    fn empty_toml_uses_defaults() {
        let cfg = Config::from_toml_str("").expect("defaults apply");
        assert_eq!(cfg.skills.selector.k, 5);
        assert_eq!(cfg.tape.checkpoint_interval_entries, 500);
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let cfg = Config::from_toml_str(
            r#"
            [security]
            mode = "strict"
            "#,
        )
        .expect("partial config parses");
        assert_eq!(cfg.security.mode, SecurityMode::Strict);
        assert_eq!(cfg.memory.retrieval_top_k, 8);
    }

    #[test]
    fn config_error_display_format() {
        let err = ConfigError {
            severity: ConfigSeverity::Error,
            field: "tape.checkpoint_interval_entries".into(),
            message: "must be greater than 0".into(),
        };
        assert_eq!(
            format!("{err}"),
            "[ERROR] tape.checkpoint_interval_entries: must be greater than 0"
        );
    }
}
