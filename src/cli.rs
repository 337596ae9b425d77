use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the JSON-RPC server with its retention sweeper
    Serve {
        /// Address to bind (overrides the configuration)
        #[arg(long)]
        bind: Option<String>,

        /// Port to listen on (overrides the configuration)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Translate a local subtitle file once
    Translate {
        /// Input subtitle file
        #[arg(short, long)]
        input: PathBuf,

        /// Output translated file
        #[arg(short, long)]
        output: PathBuf,

        /// Target language
        #[arg(short, long)]
        language: String,

        /// Hint about the piece being translated
        #[arg(long, default_value = "")]
        context: String,

        /// Model name (defaults to the configured model)
        #[arg(short, long)]
        model: Option<String>,

        /// Replicas per oracle call (defaults to the configured size)
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// API key for the translation oracle
        #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
        api_key: String,
    },

    /// Write the default configuration to a file
    Config {
        /// Destination path
        #[arg(short, long, default_value = "config.toml")]
        output: PathBuf,
    },
}
