use clap::{Arg, Command};
use felix::client::FileClient;
use felix::config::LoggingConfig;
use felix::logging::LoggerManager;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;

fn build_cli() -> Command {
    Command::new("felix-client")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Fetch a file from a Felix server")
        .arg(
            Arg::new("server")
                .value_name("ADDR")
                .required(true)
                .help("Server address, e.g. 127.0.0.1:7070"),
        )
        .arg(
            Arg::new("file")
                .value_name("FILE")
                .required(true)
                .help("File name relative to the server's root directory"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("PATH")
                .help("Where to save the file (default: the file name)"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .default_value("info")
                .help("Log level filter"),
        )
}

#[tokio::main]
async fn main() -> ExitCode {
    let matches = build_cli().get_matches();

    let logger = LoggerManager::new(LoggingConfig {
        log_level: matches
            .get_one::<String>("log-level")
            .cloned()
            .unwrap_or_else(|| "info".to_string()),
        app_log_dir: None,
    });
    if let Err(e) = logger.initialize() {
        eprintln!("Fatal Error: {}", e);
        return ExitCode::FAILURE;
    }

    let (Some(server), Some(file)) = (
        matches.get_one::<String>("server"),
        matches.get_one::<String>("file"),
    ) else {
        return ExitCode::FAILURE;
    };

    let output = matches
        .get_one::<String>("output")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            PathBuf::from(file)
                .file_name()
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(file))
        });

    match FileClient::new(server.clone()).fetch_to_file(file, &output).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Cannot fetch '{}' from '{}': {}", file, server, e);
            ExitCode::FAILURE
        }
    }
}
