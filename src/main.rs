use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use dishboard::config::{
    ClientConfig, ConfigError, DEFAULT_API_BASE_URL, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_RECONNECT_DELAY_MS,
    DEFAULT_REQUEST_TIMEOUT_SECS, HttpTimeouts,
};
use dishboard::console::{self, HELP, Input};
use dishboard::net::api::HttpDishApi;
use dishboard::net::push_client::PushClient;
use dishboard::net::types::ApiError;
use dishboard::services::reconciler::{CatalogHandle, Reconciler};
use dishboard::state::catalog::CatalogState;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("HTTP client setup failed: {0}")]
    Api(#[from] ApiError),
    #[error("console I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "dishboard", about = "Live dish catalog console")]
struct Cli {
    #[arg(long, env = "DISHBOARD_API_URL", default_value = DEFAULT_API_BASE_URL)]
    api_url: String,

    #[arg(long, env = "DISHBOARD_WS_URL", help = "Push channel URL; derived from --api-url when omitted")]
    ws_url: Option<String>,

    #[arg(long, env = "DISHBOARD_RECONNECT_MS", default_value_t = DEFAULT_RECONNECT_DELAY_MS)]
    reconnect_ms: u64,

    #[arg(long, env = "DISHBOARD_REQUEST_TIMEOUT_SECS", default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS)]
    request_timeout_secs: u64,

    #[arg(long, env = "DISHBOARD_CONNECT_TIMEOUT_SECS", default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS)]
    connect_timeout_secs: u64,
}

impl Cli {
    fn into_config(self) -> ClientConfig {
        let mut config = ClientConfig::new(self.api_url)
            .with_reconnect_delay(Duration::from_millis(self.reconnect_ms))
            .with_timeouts(HttpTimeouts {
                request_secs: self.request_timeout_secs,
                connect_secs: self.connect_timeout_secs,
            });
        if let Some(ws_url) = self.ws_url {
            config = config.with_ws_url(ws_url);
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let config = Cli::parse().into_config();
    config.validate()?;
    info!(api = %config.api_base_url, ws = %config.ws_url, "dishboard starting");

    let api = Arc::new(HttpDishApi::new(config.clone())?);
    let (push, events) = PushClient::from_config(&config);
    let (catalog, reconciler) = Reconciler::new(api).spawn(events, push.subscribe_status());

    let result = run_console(&catalog).await;

    catalog.shutdown();
    if let Err(e) = reconciler.await {
        warn!(error = %e, "reconciler task ended abnormally");
    }
    push.close().await;
    result
}

/// Re-render on every snapshot change and forward stdin commands until EOF
/// or `quit`.
async fn run_console(catalog: &CatalogHandle) -> Result<(), CliError> {
    let mut snapshots = catalog.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let initial = snapshots.borrow_and_update().clone();
    print_screen(&initial)?;

    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
                let state = snapshots.borrow_and_update().clone();
                print_screen(&state)?;
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    return Ok(());
                };
                match console::parse_input(&line) {
                    Ok(Input::Command(command)) => {
                        if !catalog.send(command) {
                            return Ok(());
                        }
                    }
                    Ok(Input::List) => print_screen(&catalog.snapshot())?,
                    Ok(Input::Help) => println!("{HELP}"),
                    Ok(Input::Quit) => return Ok(()),
                    Ok(Input::Nothing) => {}
                    Err(message) => eprintln!("{message}"),
                }
            }
        }
    }
}

fn print_screen(state: &CatalogState) -> Result<(), CliError> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout)?;
    write!(stdout, "{}", console::render(state))?;
    write!(stdout, "> ")?;
    stdout.flush()?;
    Ok(())
}
