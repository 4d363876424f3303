//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the engines from a validated configuration
//! - Start the executor, control server, schedulers and event subscriber
//! - Wait for a signal, then stop everything in order
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - The control socket is bound before any task starts
//! - Shutdown order: signal → stop waiting for work → let the running pass
//!   finish → close the socket

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::apply::{ApplyPass, ComposeRunner, DockerCompose};
use crate::binding::{ContainerRuntime, DockerCli};
use crate::config::DaemonConfig;
use crate::control::{resolve_socket_path, ControlError, ControlServer, ControlState};
use crate::events::{forward_rebinds, EventSubscriber};
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals::wait_for_signal;
use crate::materialize::{BindingMode, BindingPass, BindingPassError, NginxControl};
use crate::observability::metrics;
use crate::scheduler::{PassExecutor, PassKind, PassQueue, WatchError, WatchScheduler};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Control(#[from] ControlError),

    #[error(transparent)]
    Watch(#[from] WatchError),

    #[error("failed to subscribe to runtime events: {0}")]
    Events(#[source] std::io::Error),

    #[error("failed to install signal handlers: {0}")]
    Signals(#[source] std::io::Error),

    #[error("failed to install metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error(transparent)]
    Binding(#[from] BindingPassError),

    #[error("background task panicked: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// External collaborators. Production uses the docker CLI; tests swap in
/// fakes.
#[derive(Clone)]
pub struct Services {
    pub compose: Arc<dyn ComposeRunner>,
    pub runtime: Arc<dyn ContainerRuntime>,
    /// `None` disables event-driven rebinding.
    pub events: Option<EventSubscriber>,
}

impl Services {
    pub fn from_config(config: &DaemonConfig) -> Self {
        Self {
            compose: Arc::new(DockerCompose::new(config.apply.compose_program.clone())),
            runtime: Arc::new(DockerCli::new(config.binding.runtime_program.clone())),
            events: Some(EventSubscriber::new(config.binding.runtime_program.clone())),
        }
    }
}

pub fn binding_pass(config: &DaemonConfig, runtime: Arc<dyn ContainerRuntime>) -> BindingPass {
    BindingPass::new(
        config.paths.clone(),
        config.load_options(),
        runtime,
        config.label_scheme(),
        config.route_defaults(),
        config.binding.output_dir.clone(),
        NginxControl::new(config.binding.nginx_executable.clone(), config.binding.service_name.clone()),
    )
}

/// A running daemon.
pub struct Daemon {
    queue: PassQueue,
    socket: Option<PathBuf>,
    executor: JoinHandle<()>,
    control: Option<JoinHandle<Result<(), ControlError>>>,
    schedulers: Vec<WatchScheduler>,
    forwarder: Option<JoinHandle<()>>,
    subscriber: Option<JoinHandle<()>>,
}

impl Daemon {
    pub fn queue(&self) -> &PassQueue {
        &self.queue
    }

    pub fn socket_path(&self) -> Option<&Path> {
        self.socket.as_deref()
    }

    /// Wait for every task after `shutdown` has been triggered.
    pub async fn join(self) -> Result<(), StartupError> {
        for scheduler in self.schedulers {
            scheduler.stop().await;
        }
        self.queue.close();
        self.executor.await?;

        if let Some(subscriber) = self.subscriber {
            subscriber.abort();
            let _ = subscriber.await;
        }
        if let Some(forwarder) = self.forwarder {
            let _ = forwarder.await;
        }
        if let Some(control) = self.control {
            control.await??;
        }
        tracing::info!("Shutdown complete");
        Ok(())
    }
}

fn subscribe_rebinds(
    config: &DaemonConfig,
    subscriber: &EventSubscriber,
    queue: &PassQueue,
) -> Result<(JoinHandle<()>, JoinHandle<()>), StartupError> {
    let (tx, rx) = mpsc::channel(config.events.queue_capacity);
    let pump = subscriber.subscribe(tx).map_err(StartupError::Events)?;

    let queue = queue.clone();
    let forwarder = tokio::spawn(forward_rebinds(rx, move |_| {
        queue.trigger(PassKind::Binding);
    }));
    Ok((pump, forwarder))
}

struct Engines {
    queue: PassQueue,
    executor: PassExecutor,
    schedulers: Vec<WatchScheduler>,
    subscriber: Option<JoinHandle<()>>,
    forwarder: Option<JoinHandle<()>>,
}

fn prepare_engines(config: &DaemonConfig, services: &Services, shutdown: &Shutdown) -> Result<Engines, StartupError> {
    let queue = PassQueue::new();
    let mut executor = PassExecutor::new(queue.clone()).with_apply(ApplyPass::new(
        config.paths.clone(),
        config.load_options(),
        Arc::clone(&services.compose),
        config.apply.dry_run,
    ));
    if config.binding.enabled {
        executor = executor.with_binding(binding_pass(config, Arc::clone(&services.runtime)), BindingMode::Nginx);
    }

    let mut schedulers = vec![WatchScheduler::spawn(
        &config.paths,
        Some(config.apply.interval()),
        vec![PassKind::Apply],
        queue.clone(),
        shutdown.subscribe(),
    )?];

    let (mut subscriber, mut forwarder) = (None, None);
    if config.binding.enabled {
        schedulers.push(WatchScheduler::spawn(
            &config.paths,
            Some(config.binding.interval()),
            vec![PassKind::Binding],
            queue.clone(),
            shutdown.subscribe(),
        )?);
        if let Some(events) = &services.events {
            let (pump, fwd) = subscribe_rebinds(config, events, &queue)?;
            subscriber = Some(pump);
            forwarder = Some(fwd);
        }
    }

    Ok(Engines {
        queue,
        executor,
        schedulers,
        subscriber,
        forwarder,
    })
}

/// Start the full daemon: apply engine, control plane and, when enabled,
/// the binding engine. On failure no socket file is left behind.
pub fn start_daemon(config: &DaemonConfig, services: Services, shutdown: &Shutdown) -> Result<Daemon, StartupError> {
    let socket = resolve_socket_path(config.control.socket_path.as_deref());
    let server = ControlServer::bind(&socket)?;

    let engines = match prepare_engines(config, &services, shutdown) {
        Ok(engines) => engines,
        Err(e) => {
            server.discard();
            return Err(e);
        }
    };

    let state = ControlState {
        queue: engines.queue.clone(),
        status: engines.executor.status(),
    };
    let executor = tokio::spawn(engines.executor.run(shutdown.subscribe()));
    let control = tokio::spawn(server.run(state, shutdown.subscribe()));

    tracing::info!(
        paths = ?config.paths,
        dry_run = config.apply.dry_run,
        binding = config.binding.enabled,
        socket = %socket.display(),
        "Daemon started"
    );

    Ok(Daemon {
        queue: engines.queue,
        socket: Some(socket),
        executor,
        control: Some(control),
        schedulers: engines.schedulers,
        forwarder: engines.forwarder,
        subscriber: engines.subscriber,
    })
}

/// Start only the binding engine in watch mode.
pub fn start_binding_watch(
    config: &DaemonConfig,
    services: Services,
    mode: BindingMode,
    shutdown: &Shutdown,
) -> Result<Daemon, StartupError> {
    let queue = PassQueue::new();
    let executor = PassExecutor::new(queue.clone()).with_binding(binding_pass(config, services.runtime), mode);

    let schedulers = vec![WatchScheduler::spawn(
        &config.paths,
        Some(config.binding.interval()),
        vec![PassKind::Binding],
        queue.clone(),
        shutdown.subscribe(),
    )?];

    let (subscriber, forwarder) = match &services.events {
        Some(events) => {
            let (pump, fwd) = subscribe_rebinds(config, events, &queue)?;
            (Some(pump), Some(fwd))
        }
        None => (None, None),
    };

    let executor = tokio::spawn(executor.run(shutdown.subscribe()));
    tracing::info!(paths = ?config.paths, "Binding watch started");

    Ok(Daemon {
        queue,
        socket: None,
        executor,
        control: None,
        schedulers,
        forwarder,
        subscriber,
    })
}

fn init_metrics(config: &DaemonConfig) -> Result<(), StartupError> {
    if !config.observability.metrics_enabled {
        return Ok(());
    }
    match config.observability.metrics_socket() {
        Some(addr) => metrics::init_metrics(addr)?,
        None => tracing::error!(
            metrics_address = %config.observability.metrics_address,
            "Failed to parse metrics address"
        ),
    }
    Ok(())
}

async fn serve_until_signal(daemon: Daemon, shutdown: Shutdown) -> Result<(), StartupError> {
    let signal = wait_for_signal().await.map_err(StartupError::Signals)?;
    tracing::info!(signal, "Received signal, shutting down");
    shutdown.trigger();
    daemon.join().await
}

/// `nqkd launch`.
pub async fn run_launch(config: DaemonConfig) -> Result<(), StartupError> {
    init_metrics(&config)?;
    let shutdown = Shutdown::new();
    let daemon = start_daemon(&config, Services::from_config(&config), &shutdown)?;
    serve_until_signal(daemon, shutdown).await
}

/// `nqkd binding`: a single pass, or a watch loop when configured.
pub async fn run_binding(config: DaemonConfig, mode: BindingMode) -> Result<(), StartupError> {
    let services = Services::from_config(&config);
    if !config.binding.watch {
        binding_pass(&config, services.runtime).run(mode).await?;
        return Ok(());
    }

    init_metrics(&config)?;
    let shutdown = Shutdown::new();
    let daemon = start_binding_watch(&config, services, mode, &shutdown)?;
    serve_until_signal(daemon, shutdown).await
}
