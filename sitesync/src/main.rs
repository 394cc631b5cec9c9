//! Sitesync - Entry Point
//!
//! Deploys a directory or zip archive to a site, uploading only the files
//! the remote side does not already have.

use std::collections::HashMap;
use std::env;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use sitesync::http::client::HttpClient;
use sitesync::logs::{init_logging, LogLevel, LogOptions};
use sitesync::storage::settings::Settings;
use sitesync::sync::{DeployParams, DeploySource, DeploySync};
use sitesync::utils::version_info;

use tracing::{error, info};

const TOKEN_ENV: &str = "NETLIFY_AUTH_TOKEN";

const USAGE: &str = "Usage: sitesync --site=<site_id> --dir=<directory or .zip> [--draft] \
                     [--no-wait] [--timeout=<secs>] [--settings=<file>] [--token=<token>]";

/// Exit code for a deploy that did not finish in time
const EXIT_TIMEOUT: u8 = 124;

#[tokio::main]
async fn main() -> ExitCode {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version_info()) {
            Ok(version) => println!("{version}"),
            Err(e) => eprintln!("Failed to render version: {e}"),
        }
        return ExitCode::SUCCESS;
    }

    // Retrieve the settings file, if any
    let settings = match cli_args.get("settings") {
        Some(path) => match Settings::load(Path::new(path)).await {
            Ok(settings) => settings,
            Err(e) => {
                eprintln!("Unable to read settings file {path}: {e}");
                return ExitCode::from(2);
            }
        },
        None => Settings::default(),
    };

    // Initialize logging
    let log_level = match cli_args.get("log-level").map(|s| s.parse::<LogLevel>()) {
        Some(Ok(level)) => level,
        Some(Err(e)) => {
            eprintln!("{e}");
            return ExitCode::from(2);
        }
        None => settings.log_level,
    };
    let log_options = LogOptions {
        log_level,
        json_format: settings.json_logs,
    };
    if let Err(e) = init_logging(log_options) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let (Some(site_id), Some(path)) = (cli_args.get("site"), cli_args.get("dir")) else {
        error!("{}", USAGE);
        return ExitCode::from(2);
    };

    let token = cli_args
        .get("token")
        .cloned()
        .or_else(|| env::var(TOKEN_ENV).ok());
    let token = match token {
        Some(token) => SecretString::from(token),
        None => {
            error!("No access token, pass --token or set {}", TOKEN_ENV);
            return ExitCode::from(2);
        }
    };

    let ready_timeout = match cli_args.get("timeout").map(|s| s.parse::<u64>()) {
        Some(Ok(secs)) => Duration::from_secs(secs),
        Some(Err(e)) => {
            error!("Invalid --timeout: {}", e);
            return ExitCode::from(2);
        }
        None => Duration::ZERO,
    };

    let client = match HttpClient::new(settings.client_options(token)) {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to create API client: {}", e);
            return ExitCode::from(2);
        }
    };

    let options = match settings.sync_options() {
        Ok(options) => options,
        Err(e) => {
            error!("Invalid settings: {}", e);
            return ExitCode::from(2);
        }
    };

    let engine = DeploySync::new(Arc::new(client), options);
    let source = DeploySource::from_path(path);
    let params = DeployParams {
        draft: cli_args.contains_key("draft"),
        wait_for_ready: !cli_args.contains_key("no-wait"),
        ready_timeout,
    };

    info!("Deploying {} to site {}", source.path().display(), site_id);
    let result = tokio::select! {
        result = engine.deploy(site_id, source, &params) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C received, aborting deploy...");
            return ExitCode::from(130);
        }
    };

    match result {
        Ok(deploy) => {
            info!("Deploy {} finished in state {}", deploy.id, deploy.state);
            match serde_json::to_string_pretty(&deploy) {
                Ok(json) => println!("{json}"),
                Err(e) => error!("Failed to render deploy: {}", e),
            }
            ExitCode::SUCCESS
        }
        Err(failure) => {
            match &failure.deploy {
                Some(deploy) => error!("Deploy {} failed: {}", deploy.id, failure),
                None => error!("Deploy failed: {}", failure),
            }
            if failure.error.is_timeout() {
                ExitCode::from(EXIT_TIMEOUT)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}
