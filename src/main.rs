use clap::{Parser, Subcommand};
use pch_remote::config::{ServerConfig, DEFAULT_CONFIG_PATH};
use pch_remote::device::{self, DeviceClient};
use pch_remote::{cli, server};
use simplelog::*;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pch-remote")]
#[command(about = "Remote control server and playback tools for a networked media player", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Player control API host
    #[arg(long, global = true, default_value = device::DEFAULT_HOST)]
    host: String,

    /// Player control API port
    #[arg(long, global = true, default_value_t = device::DEFAULT_PORT)]
    device_port: u16,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the command server
    Server {
        /// Configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },
    /// Play every video under a directory in random order
    Shuffle {
        /// Directory to scan
        #[arg(value_name = "DIRECTORY")]
        dir: PathBuf,

        /// File extension to include (repeatable, defaults to avi, mkv, mp4, flv)
        #[arg(short, long = "ext", value_name = "EXT")]
        extensions: Vec<String>,
    },
    /// Query the player or control playback
    Query {
        /// Command and arguments: status, play <path>, enqueue <path>, pause, resume, stop, next, prev, keys, key <name>, formats
        #[arg(value_name = "COMMAND", num_args = 1..)]
        args: Vec<String>,
    },
    /// Interactive mode - read commands from stdin
    Interactive,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let log_level = match &cli.command {
        Commands::Server { .. } => {
            // Server mode: info by default, debug if verbose
            if cli.verbose {
                LevelFilter::Debug
            } else {
                LevelFilter::Info
            }
        }
        _ => {
            // CLI mode: silent unless verbose
            if cli.verbose {
                LevelFilter::Debug
            } else {
                LevelFilter::Off
            }
        }
    };

    if log_level != LevelFilter::Off {
        CombinedLogger::init(vec![TermLogger::new(
            log_level,
            Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        )])?;
    }

    match cli.command {
        Commands::Server { config } => {
            let config = ServerConfig::load_or_default(&config);
            server::start_server(config).await?;
        }
        Commands::Shuffle { dir, extensions } => {
            let mut client = DeviceClient::new(&cli.host, cli.device_port);
            let result = cli::handle_shuffle(&client, &dir, &extensions).await;
            client.close();
            result?;
        }
        Commands::Query { args } => {
            let mut client = DeviceClient::new(&cli.host, cli.device_port);
            let result = cli::handle_query(&client, &args.join(" ")).await;
            client.close();
            result?;
        }
        Commands::Interactive => {
            let mut client = DeviceClient::new(&cli.host, cli.device_port);
            let result = cli::handle_interactive(&client).await;
            client.close();
            result?;
        }
    }

    Ok(())
}
