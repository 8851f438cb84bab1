// Logger configuration
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable, for terminals
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Filter directives used when `RUST_LOG` is unset. `{level}` is replaced
    /// with the base level.
    pub default_filter: String,
    pub verbose: bool,
    pub format: LogFormat,
    pub ansi: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            default_filter: "asha_sync={level},asha_cli={level},sqlx=warn,reqwest=info".to_string(),
            verbose: false,
            format: LogFormat::Pretty,
            ansi: true,
        }
    }
}

impl LoggerConfig {
    /// JSON output when `env_var` is `production`, pretty output otherwise.
    pub fn for_environment(env_var: &str) -> Self {
        let production = std::env::var(env_var).map(|v| v == "production").unwrap_or(false);
        let no_color = std::env::var("NO_COLOR").is_ok();
        Self {
            format: if production { LogFormat::Json } else { LogFormat::Pretty },
            ansi: !production && !no_color,
            ..Self::default()
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else {
            "info"
        }
    }

    pub fn filter_directives(&self) -> String {
        self.default_filter.replace("{level}", self.level())
    }
}
