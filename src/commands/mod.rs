use clap::ValueEnum;

mod config_cmd;
mod queue_cmd;
mod sync_cmd;
mod watch_cmd;

pub use config_cmd::ConfigCommand;
pub use queue_cmd::QueueCommand;
pub use sync_cmd::SyncCommand;
pub use watch_cmd::WatchCommand;

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}
