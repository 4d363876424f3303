//! nqkd daemon entry point.
//!
//! # Architecture Overview
//!
//! ```text
//!  unit roots ──▶ units::load_units ──▶ apply engine ──▶ docker compose
//!      │                                     │
//!      │ notify / interval                   ▼
//!      ▼                              state tracker ──▶ control socket ◀── nqkctl
//!  PassQueue ──▶ PassExecutor
//!      ▲                ▼
//!  docker events   binding engine ──▶ runtime ports + labels ──▶ nginx conf.d
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use nqkd::config::{read_config, DaemonConfig};
use nqkd::lifecycle::{run_binding, run_launch};
use nqkd::materialize::BindingMode;
use nqkd::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "nqkd")]
#[command(about = "Not Quite Kubernetes Daemon", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Folder to watch for changes and query for updates. Repeatable.
    #[arg(long = "path", global = true)]
    paths: Vec<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch the daemon to start applying units from the paths
    Launch {
        /// Don't apply anything, only report what would be applied
        #[arg(long)]
        dry_run: bool,
    },
    /// Resolve bindings of the current deployments
    Binding(BindingArgs),
    /// Print the version
    Version,
}

#[derive(Args)]
struct BindingArgs {
    /// Keep running and rebind on changes
    #[arg(long)]
    watch: bool,

    #[arg(long = "ssl-cert")]
    ssl_cert: Option<String>,

    #[arg(long = "ssl-privkey")]
    ssl_privkey: Option<String>,

    #[arg(long)]
    domain: Option<String>,

    #[command(subcommand)]
    output: BindingOutput,
}

#[derive(Subcommand)]
enum BindingOutput {
    /// Write nginx configuration and restart nginx on change
    Nginx {
        #[arg(long)]
        dir: Option<PathBuf>,

        /// nginx binary used to validate before restarting
        #[arg(long)]
        executable: Option<PathBuf>,

        #[arg(long)]
        service: Option<String>,
    },
    /// Print the binding tree as JSON
    Json,
}

impl BindingArgs {
    fn apply_to(self, config: &mut DaemonConfig) -> BindingMode {
        let binding = &mut config.binding;
        binding.watch |= self.watch;
        if let Some(cert) = self.ssl_cert {
            binding.ssl_certificate = cert;
        }
        if let Some(key) = self.ssl_privkey {
            binding.ssl_private_key = key;
        }
        if let Some(domain) = self.domain {
            binding.default_domain = domain;
        }

        match self.output {
            BindingOutput::Nginx { dir, executable, service } => {
                if let Some(dir) = dir {
                    binding.output_dir = dir;
                }
                if executable.is_some() {
                    binding.nginx_executable = executable;
                }
                if let Some(service) = service {
                    binding.service_name = service;
                }
                BindingMode::Nginx
            }
            BindingOutput::Json => BindingMode::Json,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Commands::Version = cli.command {
        println!("{}", nqkd::VERSION);
        return Ok(());
    }

    let mut config = match &cli.config {
        Some(path) => read_config(path)?,
        None => DaemonConfig::default(),
    };
    if !cli.paths.is_empty() {
        config.paths = cli.paths;
    }

    init_logging(&config.observability.log_level);
    tracing::info!(version = nqkd::VERSION, "nqkd starting");

    match cli.command {
        Commands::Launch { dry_run } => {
            config.apply.dry_run |= dry_run;
            let config = config.validated()?;
            run_launch(config).await?;
        }
        Commands::Binding(args) => {
            let mode = args.apply_to(&mut config);
            let config = config.validated()?;
            run_binding(config, mode).await?;
        }
        Commands::Version => {}
    }

    Ok(())
}
