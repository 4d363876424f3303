use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use nqkd::control::{resolve_socket_path, ControlClient};
use nqkd::state::StatusEntry;

#[derive(Parser)]
#[command(name = "nqkctl")]
#[command(about = "Interact with the running nqkd daemon", long_about = None)]
struct Cli {
    /// Control socket; defaults to $RUNTIME_DIRECTORY/nqkd.sock.
    #[arg(short, long)]
    socket: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask the daemon to check and apply every unit now
    Apply,
    /// Show the state of every tracked unit
    Status {
        #[arg(long, value_enum, default_value_t = Format::Plain)]
        format: Format,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Plain,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = ControlClient::new(resolve_socket_path(cli.socket.as_deref()));

    match cli.command {
        Commands::Apply => {
            client.force_apply().await?;
            eprintln!("Request submitted successfully");
        }
        Commands::Status { format } => {
            let mut status = client.status().await?;
            status.sort_by(|a, b| a.name.cmp(&b.name));
            print_status(&status, format)?;
        }
    }

    Ok(())
}

fn print_status(status: &[StatusEntry], format: Format) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        Format::Json => println!("{}", serde_json::to_string(status)?),
        Format::Plain => {
            if status.is_empty() {
                println!("(no records)");
            }
            for entry in status {
                println!(
                    "{}\t{}\t{}\t{}",
                    entry.name,
                    entry.source.display(),
                    entry.last_updated.to_rfc3339(),
                    entry.state
                );
            }
        }
    }
    Ok(())
}
