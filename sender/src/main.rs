use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info};
use protocol::Config;
use sender::{inspector, CommandLauncher, Error, Outcome, StatusBoard, TransferRequest};

/// Streams a plain-text book to the reader app on a watch, one chapter at a
/// time.
#[derive(Parser, Debug)]
#[command(name = "bookcast", version, about)]
struct CliArgs {
    /// Text file to send.
    file: PathBuf,
    /// Receiver host, overrides RECEIVER_HOST.
    #[arg(long)]
    host: Option<String>,
    /// Receiver port, overrides RECEIVER_PORT.
    #[arg(long)]
    port: Option<u16>,
    /// Only send the first N characters of the file.
    #[arg(long, value_name = "N")]
    text_len: Option<usize>,
    /// Program run with the receiver package name to start the app.
    #[arg(long, value_name = "CMD")]
    launch: Option<PathBuf>,
    /// Serve transfer status over HTTP on this address.
    #[arg(long, value_name = "ADDR")]
    inspector: Option<SocketAddr>,
}

async fn execute(args: CliArgs) -> Result<Outcome, Error> {
    let mut config = Config::new();
    if let Some(host) = args.host {
        config.host = host.into();
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    let board = args.inspector.map(|addr| {
        let board = StatusBoard::default();
        let status = board.clone();
        tokio::spawn(async move {
            if let Err(e) = inspector::run(status, addr).await {
                error!("Inspector stopped: {}", e);
            }
        });
        board
    });

    let launcher = CommandLauncher::new(args.launch, &*config.receiver.package);
    let request = TransferRequest::from_path(args.file, args.text_len).await?;
    info!("Sending {:?} to {}:{}", request.name, config.host, config.port);

    sender::run(&config, &launcher, request, board).await
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();

    match execute(CliArgs::parse()).await {
        Ok(Outcome::Succeeded { message, count }) => {
            info!("Done: {} ({} chapters)", message, count);
            ExitCode::SUCCESS
        }
        Ok(Outcome::Cancelled) => {
            info!("Cancelled");
            ExitCode::from(130)
        }
        Ok(Outcome::Failed { message, count }) => {
            error!("Transfer failed: {} ({})", message, count);
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
