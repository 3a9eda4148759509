//! 命令行界面定义
//!
//! 定义了主程序的命令行参数和选项
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "sourcelinks")]
#[command(version)]
#[command(about = "Link directory service backed by a partitioned audit ledger")]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Option<Commands>,

    /// Configuration file path (defaults to searching standard locations)
    #[arg(short, long, default_value = "config.toml")]
    pub(crate) config: PathBuf,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    /// Test configuration file
    Test {
        /// Configuration file path (optional, defaults to config.toml)
        #[arg(index = 1)]
        config_file: Option<PathBuf>,
    },

    /// Inspect or maintain the audit ledger
    Ledger {
        #[command(subcommand)]
        action: LedgerAction,
    },
}

#[derive(Subcommand, Debug)]
pub(crate) enum LedgerAction {
    /// Print entries written strictly between two RFC 3339 timestamps
    Read {
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: String,
    },

    /// Delete a single entry by row key
    Delete {
        #[arg(index = 1)]
        row_key: String,
    },

    /// Delete all entries written strictly between two RFC 3339 timestamps
    DeleteRange {
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: String,
    },

    /// Drop the ledger table (recreated on next start)
    Purge {
        /// Skip the confirmation guard
        #[arg(long)]
        yes: bool,
    },
}
