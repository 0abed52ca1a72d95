//! Command-line entry point for the image relay.
//!
//! Usage:
//!
//! ```text
//! image-relay transfer nginx:1.25 --registry https://harbor.example.com \
//!     --username robot --password s3cret
//! image-relay transfer redis:7 --config-id <uuid>
//! image-relay add-registry harbor https://harbor.example.com robot s3cret --default
//! image-relay registries
//! image-relay stats
//! ```
//!
//! Configuration comes from the environment (`DATABASE_URL`,
//! `ENCRYPTION_KEY`, `LOG_LEVEL`, `TASK_TIMEOUT_SECS`, `RECENT_TASK_LIMIT`).
//! Without `DATABASE_URL` every store lives in memory for the duration of
//! the command. Results are reported through the log.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool};
use image_relay::config::ServiceConfig;
use image_relay::registry::{
    adapters::{
        AesGcmPasswordCipher, InMemoryRegistryConfigRepository,
        postgres::PostgresRegistryConfigRepository,
    },
    domain::RegistryConfigId,
    ports::{PasswordCipher, RegistryConfigRepository},
    services::{
        CreateRegistryConfigRequest, CredentialResolver, DestinationRequest,
        RegistryConfigService,
    },
};
use image_relay::task::{
    adapters::{memory::InMemoryTaskRepository, postgres::PostgresTaskRepository},
    domain::{Task, TaskId, TaskStatus},
    ports::TaskRepository,
    services::{CreateTaskRequest, TaskLifecycleService},
};
use image_relay::telemetry;
use image_relay::transfer::{
    adapters::OciImageClient, ports::ImageClient, services::TransferPipeline,
};
use mockable::{Clock, DefaultClock};
use tracing::{error, info, warn};

/// Boxed error type for the main result.
type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Parser)]
#[command(name = "image-relay")]
#[command(about = "Copies container images between registries as tracked tasks")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Transfer one image and wait for the task to finish.
    Transfer {
        /// Source image reference.
        source: String,
        /// Destination reference; computed from the destination host when
        /// omitted.
        #[arg(long)]
        target: Option<String>,
        /// Stored registry configuration to push with.
        #[arg(long, conflicts_with_all = ["registry", "username", "password"])]
        config_id: Option<RegistryConfigId>,
        /// Destination registry URL.
        #[arg(long, requires_all = ["username", "password"])]
        registry: Option<String>,
        /// Destination username.
        #[arg(long)]
        username: Option<String>,
        /// Destination password.
        #[arg(long)]
        password: Option<String>,
        /// Interval between task status checks, in milliseconds.
        #[arg(long, default_value_t = 500)]
        poll_interval_ms: u64,
    },
    /// Store an encrypted registry configuration.
    AddRegistry {
        /// Display name.
        name: String,
        /// Registry URL.
        url: String,
        /// Username.
        username: String,
        /// Password, stored encrypted.
        password: String,
        /// Make this the default configuration.
        #[arg(long)]
        default: bool,
    },
    /// List stored registry configurations.
    Registries,
    /// Report aggregate task statistics.
    Stats,
}

#[tokio::main]
async fn main() -> Result<ExitCode, BoxError> {
    let cli = Cli::parse();
    let config = ServiceConfig::from_env()?;
    if !telemetry::init_tracing(&config.log_level) {
        warn!("tracing subscriber already installed");
    }

    match config.database_url.clone() {
        Some(url) => {
            let pool = Pool::builder().build(ConnectionManager::<PgConnection>::new(url))?;
            let tasks = Arc::new(PostgresTaskRepository::new(pool.clone()));
            let configs = Arc::new(PostgresRegistryConfigRepository::new(pool));
            run(cli.command, &config, tasks, configs).await
        }
        None => {
            info!("DATABASE_URL not set; using in-memory stores");
            let tasks = Arc::new(InMemoryTaskRepository::new());
            let configs = Arc::new(InMemoryRegistryConfigRepository::new());
            run(cli.command, &config, tasks, configs).await
        }
    }
}

async fn run<T, R>(
    command: Command,
    config: &ServiceConfig,
    tasks: Arc<T>,
    configs: Arc<R>,
) -> Result<ExitCode, BoxError>
where
    T: TaskRepository + 'static,
    R: RegistryConfigRepository + 'static,
{
    let cipher = Arc::new(AesGcmPasswordCipher::new(&config.encryption_key));
    let clock = Arc::new(DefaultClock);
    let admin = RegistryConfigService::new(
        Arc::clone(&configs),
        Arc::clone(&cipher),
        Arc::clone(&clock),
    );

    match command {
        Command::Transfer {
            source,
            target,
            config_id,
            registry,
            username,
            password,
            poll_interval_ms,
        } => {
            let destination = match (config_id, registry) {
                (Some(id), _) => DestinationRequest::stored(id),
                (None, Some(url)) => DestinationRequest::inline(
                    url,
                    username.unwrap_or_default(),
                    password.unwrap_or_default(),
                ),
                (None, None) => match admin.default_config().await? {
                    Some(default) => DestinationRequest::stored(default.id),
                    None => {
                        error!("no destination given and no default registry configured");
                        return Ok(ExitCode::FAILURE);
                    }
                },
            };
            let mut request = CreateTaskRequest::new(source, destination);
            if let Some(explicit) = target {
                request = request.with_target(explicit);
            }

            let service = TaskLifecycleService::new(
                tasks,
                CredentialResolver::new(configs, cipher),
                TransferPipeline::new(Arc::new(OciImageClient::default())),
                clock,
                config.lifecycle(),
            );
            let created = service.create_task(request).await?;
            let finished = tokio::select! {
                polled = poll_until_finished(&service, created.task_id, poll_interval_ms) => polled?,
                signal = tokio::signal::ctrl_c() => {
                    signal?;
                    warn!(task_id = %created.task_id, "interrupted; cancelling transfer");
                    service.cancel_task(created.task_id).await?
                }
            };
            service.shutdown().await;
            Ok(report(&finished))
        }
        Command::AddRegistry {
            name,
            url,
            username,
            password,
            default,
        } => {
            let mut request = CreateRegistryConfigRequest::new(name, url, username, password);
            if default {
                request = request.as_default();
            }
            let view = admin.create(request).await?;
            info!(config = %serde_json::to_string(&view)?, "registry configuration stored");
            Ok(ExitCode::SUCCESS)
        }
        Command::Registries => {
            for view in admin.list().await? {
                info!(config = %serde_json::to_string(&view)?, "registry configuration");
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Stats => {
            let stats = tasks.stats().await?;
            info!(stats = %serde_json::to_string(&stats)?, "task statistics");
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn poll_until_finished<T, R, P, I, C>(
    service: &TaskLifecycleService<T, R, P, I, C>,
    task_id: TaskId,
    poll_interval_ms: u64,
) -> Result<Task, BoxError>
where
    T: TaskRepository + 'static,
    R: RegistryConfigRepository + 'static,
    P: PasswordCipher + 'static,
    I: ImageClient + 'static,
    C: Clock + Send + Sync + 'static,
{
    let interval = Duration::from_millis(poll_interval_ms.max(50));
    let mut last_progress = None;
    loop {
        let view = service.get_task(task_id).await?;
        if view.task.is_terminal() {
            return Ok(view.task);
        }
        if last_progress != Some(view.task.progress()) {
            last_progress = Some(view.task.progress());
            info!(
                task_id = %task_id,
                progress = view.task.progress(),
                step = view.task.step_message(),
                remaining_secs = view.estimated_remaining_secs,
                "transfer in progress"
            );
        }
        tokio::time::sleep(interval).await;
    }
}

fn report(task: &Task) -> ExitCode {
    match task.status() {
        TaskStatus::Completed => {
            info!(
                task_id = %task.id(),
                target = task.target_reference(),
                duration_secs = task.duration_secs(),
                "transfer completed"
            );
            ExitCode::SUCCESS
        }
        status => {
            error!(
                task_id = %task.id(),
                status = status.as_str(),
                error = task.error_message().unwrap_or_default(),
                "transfer did not complete"
            );
            ExitCode::FAILURE
        }
    }
}
