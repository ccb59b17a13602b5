//! chaff-host - stdio protocol host for the chaff engine
//!
//! Serves the chaff noise engine over length-prefixed JSON frames on
//! stdin/stdout, one response per request, until stdin closes or the process
//! is interrupted. Diagnostics go to stderr so they never corrupt a frame.

mod framing;

use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};

use chaff::config::EngineConfig;
use chaff::engine::Engine;
use chaff::host::HttpResourceHost;
use chaff::logging;
use chaff::protocol::{Request, Response};
use chaff::store::JsonFileStore;

#[derive(Parser)]
#[command(name = "chaff-host")]
#[command(version = chaff::VERSION)]
#[command(about = "Decoy browsing noise engine speaking framed JSON on stdio", long_about = None)]
struct Args {
    /// Path of the persisted engine state file
    #[arg(long, default_value = "chaff-state.json")]
    state_file: PathBuf,

    /// Directory for rolling log files (in addition to stderr)
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Scheduler tick period in seconds
    #[arg(long, default_value = "60")]
    tick_secs: u64,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let _logging_guard = match logging::init_logging(args.log_dir.as_deref()) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("Error: failed to initialize logging: {err}");
            process::exit(1);
        }
    };

    info!(
        version = chaff::VERSION,
        state_file = %args.state_file.display(),
        "chaff-host starting"
    );

    let host = match HttpResourceHost::new() {
        Ok(host) => host,
        Err(err) => {
            error!(%err, "failed to build the resource host");
            process::exit(1);
        }
    };

    let store = JsonFileStore::new(&args.state_file);
    let config =
        EngineConfig::default().with_tick_period(Duration::from_secs(args.tick_secs.max(1)));
    let engine = Engine::load(store, host, config).await;

    // Pick up a running state persisted by a previous host process.
    engine.reconcile().await;

    serve(&engine).await;

    engine.shutdown().await;
    info!("chaff-host exiting");
}

/// Request/response loop over stdio frames.
async fn serve(engine: &Engine<HttpResourceHost, JsonFileStore>) {
    let mut stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();

    loop {
        let frame = tokio::select! {
            frame = framing::read_frame(&mut stdin) => frame,
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received, shutting down");
                break;
            }
        };

        let payload = match frame {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                info!("stdin closed, shutting down");
                break;
            }
            Err(err) => {
                error!(%err, "frame read failed, shutting down");
                break;
            }
        };

        let response = match serde_json::from_slice::<Request>(&payload) {
            Ok(request) => engine.handle_request(request).await,
            Err(err) => {
                warn!(%err, "malformed request");
                Response::error(format!("malformed request: {err}"))
            }
        };

        let encoded = match serde_json::to_vec(&response) {
            Ok(encoded) => encoded,
            Err(err) => {
                error!(%err, "failed to encode response");
                continue;
            }
        };
        if let Err(err) = framing::write_frame(&mut stdout, &encoded).await {
            error!(%err, "frame write failed, shutting down");
            break;
        }
    }
}
