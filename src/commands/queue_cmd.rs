//! Commands for adding to and inspecting the offline queue.

use std::io::Read;
use std::sync::Arc;

use clap::{Args, Subcommand};
use serde_json::Value;

use haven_core::{SyncItem, SyncKind};

use super::OutputFormat;
use crate::config::Config;
use crate::sync::{open_queue, try_auto_sync, ConsoleNotifier};

/// Manage the offline queue
#[derive(Args)]
pub struct QueueCommand {
    #[command(subcommand)]
    pub command: QueueSubcommand,
}

#[derive(Subcommand)]
pub enum QueueSubcommand {
    /// Queue an action for delivery
    Add {
        /// Kind of action (message, emotion, profile_update)
        kind: SyncKind,

        /// JSON payload, or "-" to read it from stdin
        data: String,
    },

    /// List pending actions
    List {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Discard every pending action
    Clear,
}

impl QueueCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        let queue = open_queue(config, Arc::new(ConsoleNotifier))?;

        match &self.command {
            QueueSubcommand::Add { kind, data } => {
                let payload = parse_payload(data)?;
                let id = queue.enqueue(kind.clone(), payload)?;
                println!("Queued {} {}", kind, id);

                try_auto_sync(config, &queue);
            }

            QueueSubcommand::List { format } => {
                let items = queue.peek();
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&items)?);
                    }
                    OutputFormat::Text => print_items(&items),
                }
            }

            QueueSubcommand::Clear => {
                let count = queue.len();
                queue.clear()?;
                println!(
                    "Discarded {} pending item{}",
                    count,
                    if count == 1 { "" } else { "s" }
                );
            }
        }

        Ok(())
    }
}

fn parse_payload(data: &str) -> Result<Value, Box<dyn std::error::Error>> {
    let raw = if data == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        data.to_string()
    };

    serde_json::from_str(&raw).map_err(|e| format!("Invalid JSON payload: {}", e).into())
}

fn print_items(items: &[SyncItem]) {
    if items.is_empty() {
        println!("No pending items.");
        return;
    }

    let title = format!("Pending items ({})", items.len());
    println!("{}", title);
    println!("{}", "=".repeat(title.len()));
    println!();

    for item in items {
        println!(
            "  {}  {:<14}  {}  retries: {}",
            item.id,
            item.kind.to_string(),
            item.enqueued_at.format("%Y-%m-%d %H:%M:%S"),
            item.retry_count
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigSource, ConfigValue, SyncConfig};
    use haven_core::TracingNotifier;
    use serde_json::json;
    use tempfile::TempDir;

    fn offline_config(temp: &TempDir) -> Config {
        Config {
            data_dir: ConfigValue::new(temp.path().to_path_buf(), ConfigSource::Default),
            config_file: None,
            sync: SyncConfig::default(),
        }
    }

    fn run(config: &Config, command: QueueSubcommand) -> Result<(), Box<dyn std::error::Error>> {
        QueueCommand { command }.run(config)
    }

    #[test]
    fn test_add_list_clear() {
        let temp = TempDir::new().unwrap();
        let config = offline_config(&temp);

        run(
            &config,
            QueueSubcommand::Add {
                kind: SyncKind::Message,
                data: r#"{"text": "hello"}"#.to_string(),
            },
        )
        .unwrap();
        run(
            &config,
            QueueSubcommand::Add {
                kind: SyncKind::ProfileUpdate,
                data: r#"{"name": "Jo"}"#.to_string(),
            },
        )
        .unwrap();

        let queue = open_queue(&config, Arc::new(TracingNotifier)).unwrap();
        let items = queue.peek();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].kind, SyncKind::Message);
        assert_eq!(items[0].payload, json!({"text": "hello"}));
        assert_eq!(items[1].kind, SyncKind::ProfileUpdate);

        run(
            &config,
            QueueSubcommand::List {
                format: OutputFormat::Json,
            },
        )
        .unwrap();

        run(&config, QueueSubcommand::Clear).unwrap();
        assert!(queue.is_empty());
    }

    #[test]
    fn test_add_with_invalid_payload_queues_nothing() {
        let temp = TempDir::new().unwrap();
        let config = offline_config(&temp);

        let result = run(
            &config,
            QueueSubcommand::Add {
                kind: SyncKind::Message,
                data: "{oops".to_string(),
            },
        );

        assert!(result.is_err());
        let queue = open_queue(&config, Arc::new(TracingNotifier)).unwrap();
        assert!(queue.is_empty());
    }

    #[test]
    fn test_parse_payload() {
        assert_eq!(
            parse_payload(r#"{"text": "hi"}"#).unwrap(),
            json!({"text": "hi"})
        );
    }

    #[test]
    fn test_parse_payload_rejects_invalid_json() {
        let err = parse_payload("{not json").unwrap_err();
        assert!(err.to_string().contains("Invalid JSON payload"));
    }
}
