use clap::Parser;
use murmur::api::{DirectoryId, login};
use murmur::core::config::{CliOverrides, ResolvedConfig, load_config, resolve};
use murmur::core::storage;
use murmur::tui::{self, Credentials};
use simplelog::{ConfigBuilder, LevelFilter, WriteLogger};
use std::fs::File;
use std::io;

#[derive(Parser)]
#[command(name = "murmur", about = "Real-time threaded chat in the terminal")]
struct Args {
    /// Server address (host[:port])
    #[arg(short, long)]
    server: Option<String>,

    /// Username to log in with when no token is configured
    #[arg(short, long)]
    username: Option<String>,

    /// Thread to open on startup
    #[arg(short, long)]
    thread: Option<DirectoryId>,
}

#[tokio::main]
async fn main() -> io::Result<()> {
    let args = Args::parse();
    dotenv::dotenv().ok();

    // Initialize file logger - writes to murmur.log in current directory
    let log_config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .build();

    if let Ok(log_file) = File::create("murmur.log") {
        let _ = WriteLogger::init(LevelFilter::Debug, log_config, log_file);
    }

    let file_config = load_config().map_err(|e| {
        eprintln!("{e}");
        io::Error::other(e)
    })?;
    let cli = CliOverrides {
        server: args.server,
        username: args.username,
    };
    let config = resolve(&file_config, &cli);
    log::info!("Murmur starting up against {}", config.server_address);

    let credentials = authenticate(&config).await?;
    let initial_thread = args
        .thread
        .or_else(storage::load_last_thread)
        .or(config.default_thread);

    tui::run(config, credentials, initial_thread)
}

/// Uses the configured token, or logs in by username to get one.
async fn authenticate(config: &ResolvedConfig) -> io::Result<Credentials> {
    let username = config.username.clone();

    if let Some(token) = config.token.clone() {
        return Ok(Credentials {
            username: username.unwrap_or_default(),
            token,
        });
    }

    let Some(username) = username else {
        let msg = "no token configured; pass --username or set MURMUR_USERNAME to log in";
        eprintln!("{msg}");
        return Err(io::Error::new(io::ErrorKind::InvalidInput, msg));
    };

    match login(&config.http_base(), &username).await {
        Ok(auth) => Ok(Credentials {
            username: auth.user.username,
            token: auth.token,
        }),
        Err(e) => {
            log::warn!("Login failed: {}", e);
            eprintln!("Login failed: {e}");
            Err(io::Error::other(e))
        }
    }
}
