use clap::{Args, Subcommand};
use std::fs;
use std::path::Path;

use super::OutputFormat;
use crate::config::Config;

const DEFAULT_CONFIG: &str = r#"# haven configuration

# Directory for the offline queue (default: ~/.local/share/haven)
# data_dir: ~/.local/share/haven

sync:
  # Backend base URL (or set HAVEN_SERVER_URL)
  # server_url: "https://api.example.com"
  # Bearer token (or set HAVEN_API_TOKEN)
  # api_token: ""
  auto_sync: false
  request_timeout_secs: 10
  poll_interval_secs: 15
  max_retries: 3
"#;

/// Inspect or create the configuration file
#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show the effective configuration and where each value came from
    Show {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Write a default configuration file
    Init,
}

impl ConfigCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            ConfigSubcommand::Show { format } => {
                println!("{}", render(config, format)?);
            }
            ConfigSubcommand::Init => {
                let path = Config::default_config_path();
                if write_default_config(&path)? {
                    println!("Created config file: {}", path.display());
                } else {
                    println!("Config file already exists: {}", path.display());
                    println!("Use 'haven config show' to view current configuration.");
                }
            }
        }
        Ok(())
    }
}

fn render(config: &Config, format: &OutputFormat) -> Result<String, serde_json::Error> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(config),
        OutputFormat::Text => Ok(render_text(config)),
    }
}

fn render_text(config: &Config) -> String {
    let sync = &config.sync;
    let config_file = match &config.config_file {
        Some(path) => path.display().to_string(),
        None => format!("{} (not found)", Config::default_config_path().display()),
    };
    let set_or_not = |present: bool| if present { "(set)" } else { "(not set)" };

    let rows = [
        ("config file", config_file),
        (
            "data_dir",
            format!(
                "{} [{}]",
                config.data_dir.value.display(),
                config.data_dir.source
            ),
        ),
        (
            "sync",
            if sync.is_configured() {
                "enabled".to_string()
            } else {
                "disabled, queue only".to_string()
            },
        ),
        (
            "sync.server_url",
            sync.server_url.as_deref().unwrap_or("(not set)").to_string(),
        ),
        (
            "sync.api_token",
            set_or_not(sync.api_token.is_some()).to_string(),
        ),
        ("sync.auto_sync", sync.auto_sync.to_string()),
        (
            "sync.request_timeout_secs",
            sync.request_timeout_secs.to_string(),
        ),
        ("sync.poll_interval_secs", sync.poll_interval_secs.to_string()),
        ("sync.max_retries", sync.max_retries.to_string()),
    ];

    let width = rows.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    rows.iter()
        .map(|(key, value)| format!("{:<width$}  {}", key, value, width = width))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Writes the default config to `path`. Returns `false` if a file is
/// already there.
fn write_default_config(path: &Path) -> std::io::Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, DEFAULT_CONFIG)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigSource, ConfigValue, SyncConfig};
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn sample_config() -> Config {
        Config {
            data_dir: ConfigValue::new(PathBuf::from("/var/lib/haven"), ConfigSource::File),
            config_file: None,
            sync: SyncConfig {
                server_url: Some("https://api.example.com".to_string()),
                api_token: Some("secret".to_string()),
                ..SyncConfig::default()
            },
        }
    }

    #[test]
    fn test_show_json_hides_token() {
        let json = render(&sample_config(), &OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["data_dir"]["value"], "/var/lib/haven");
        assert_eq!(value["data_dir"]["source"], "file");
        assert_eq!(value["sync"]["server_url"], "https://api.example.com");
        assert_eq!(value["sync"]["max_retries"], 3);
        assert!(value["sync"].get("api_token").is_none());
        assert!(!json.contains("secret"));
    }

    #[test]
    fn test_show_text_lists_sources() {
        let text = render(&sample_config(), &OutputFormat::Text).unwrap();

        assert!(text.contains("/var/lib/haven [file]"));
        assert!(text.contains("(set)"));
        assert!(text.contains("enabled"));
        assert!(!text.contains("secret"));
    }

    #[test]
    fn test_show_text_without_server() {
        let mut config = sample_config();
        config.sync = SyncConfig::default();

        let text = render_text(&config);
        assert!(text.contains("disabled, queue only"));
        assert!(text.contains("sync.server_url"));
    }

    #[test]
    fn test_init_writes_loadable_defaults() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("haven").join("config.yaml");

        assert!(write_default_config(&path).unwrap());

        let config = Config::load(Some(path.clone())).unwrap();
        assert_eq!(config.config_file, Some(path));
        assert!(!config.sync.auto_sync);
        assert_eq!(config.sync.request_timeout_secs, 10);
        assert_eq!(config.sync.poll_interval_secs, 15);
        assert_eq!(config.sync.max_retries, 3);
    }

    #[test]
    fn test_init_keeps_existing_file() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("config.yaml");
        fs::write(&path, "data_dir: /mine\n").unwrap();

        assert!(!write_default_config(&path).unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "data_dir: /mine\n");
    }
}
