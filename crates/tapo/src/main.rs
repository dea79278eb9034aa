mod cli;
mod handlers;
mod utils;

use clap::Parser;

use crate::cli::{Cli, Command};
use crate::handlers::{handle_cloud, handle_device};
use crate::utils::get_credentials;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(std::io::stderr)
            .init();
    }

    match cli.command {
        Command::Version => {
            println!("tapo {}", env!("CARGO_PKG_VERSION"));
            println!("tapo-core {}", tapo_core::VERSION);
        }

        Command::Device {
            target,
            protocol,
            port,
            timeout,
            command,
        } => {
            let credentials = credentials_or_exit(cli.username, cli.password_stdin);
            handle_device(target, protocol, port, timeout, command, credentials).await;
        }

        Command::Cloud { url, command } => {
            let credentials = credentials_or_exit(cli.username, cli.password_stdin);
            handle_cloud(url, command, credentials).await;
        }
    }
}

fn credentials_or_exit(username: Option<String>, password_stdin: bool) -> tapo_core::Credentials {
    match get_credentials(username, password_stdin) {
        Ok(credentials) => credentials,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
