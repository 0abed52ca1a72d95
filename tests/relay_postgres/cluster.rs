//! Embedded `PostgreSQL` cluster shared by the repository integration tests.
//!
//! The cluster starts once per test binary. Each test receives its own
//! database copied from a migrated template, dropped again when the test
//! finishes. A cluster that cannot start fails the test with a
//! `SKIP-TEST-CLUSTER` panic instead of passing it silently.

use crate::test_helpers::EnvVarGuard;
use cap_std::ambient_authority;
use cap_std::fs::Dir;
#[cfg(unix)]
use cap_std::fs::{Permissions, PermissionsExt};
use diesel::prelude::*;
use pg_embedded_setup_unpriv::worker_process_test_api::{
    WorkerOperation, WorkerRequest, WorkerRequestArgs, run as run_worker,
};
use pg_embedded_setup_unpriv::{
    ExecutionPrivileges, TestBootstrapSettings, bootstrap_for_tests, detect_execution_privileges,
};
use postgresql_embedded::{PostgreSQL, Settings, Status};
use std::ffi::{OsStr, OsString};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock, PoisonError};
use std::time::Duration;
use tokio::runtime::{Builder, Runtime};

/// Error type used by the provisioning helpers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Worker binary used to run `PostgreSQL` as an unprivileged user under root.
const WORKER_ENV: &str = "PG_EMBEDDED_WORKER";
const WORKER_NAME: &str = "pg_worker";

static SHARED_CLUSTER: OnceLock<ManagedCluster> = OnceLock::new();
static DATABASE_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

/// Builds the single-threaded runtime the tests drive repositories with.
///
/// # Errors
///
/// Returns the runtime construction failure.
pub fn test_runtime() -> Result<Runtime, BoxError> {
    Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| Box::new(err) as BoxError)
}

/// Returns the cluster shared by every test in this binary, starting it on
/// first use.
///
/// # Panics
///
/// Panics with a `SKIP-TEST-CLUSTER` message when `PostgreSQL` cannot start.
pub fn shared_cluster() -> &'static ManagedCluster {
    SHARED_CLUSTER.get_or_init(|| match ManagedCluster::new() {
        Ok(cluster) => cluster,
        Err(err) => panic!("SKIP-TEST-CLUSTER: failed to start PostgreSQL: {err}"),
    })
}

/// Embedded `PostgreSQL` cluster owned by the test binary.
pub struct ManagedCluster {
    bootstrap: TestBootstrapSettings,
    env_vars: Vec<(String, Option<String>)>,
    runtime: Option<Runtime>,
    postgres: Option<PostgreSQL>,
}

impl ManagedCluster {
    fn new() -> Result<Self, BoxError> {
        let overrides = bootstrap_env_changes()?;
        let guard = EnvVarGuard::set_many(&overrides);
        let bootstrapped = bootstrap_for_tests().map_err(|err| Box::new(err) as BoxError);
        drop(guard);
        let mut bootstrap = bootstrapped?;
        sync_password_from_file(&mut bootstrap.settings)?;
        let env_vars = bootstrap.environment.to_env();
        let mut cluster = Self {
            bootstrap,
            env_vars,
            runtime: None,
            postgres: None,
        };
        cluster.start()?;
        Ok(cluster)
    }

    /// Returns the connection URL for `database`.
    #[must_use]
    pub fn database_url(&self, database: &str) -> String {
        self.bootstrap.settings.url(database)
    }

    /// Creates `template` and runs `migrate` against it unless it already
    /// exists.
    ///
    /// # Errors
    ///
    /// Returns the admin or migration failure; a template whose migration
    /// failed is dropped again.
    pub fn ensure_template<F>(&self, template: &str, migrate: F) -> Result<(), BoxError>
    where
        F: FnOnce(&str) -> Result<(), BoxError>,
    {
        let _serialised = database_lock();
        if self.database_exists(template)? {
            return Ok(());
        }
        self.execute_admin_sql(&format!("CREATE DATABASE {}", quote_identifier(template)))?;
        if let Err(err) = migrate(&self.database_url(template)) {
            self.drop_database(template)?;
            return Err(err);
        }
        Ok(())
    }

    /// Copies `template` into a fresh database dropped with the returned
    /// handle.
    ///
    /// # Errors
    ///
    /// Returns the admin failure.
    pub fn temporary_database(
        &'static self,
        template: &str,
    ) -> Result<TemporaryDatabase, BoxError> {
        let name = format!("relay_test_{}", uuid::Uuid::new_v4().simple());
        let _serialised = database_lock();
        self.execute_admin_sql(&format!(
            "CREATE DATABASE {} TEMPLATE {}",
            quote_identifier(&name),
            quote_identifier(template),
        ))?;
        Ok(TemporaryDatabase {
            cluster: self,
            name,
        })
    }

    fn drop_database(&self, name: &str) -> Result<(), BoxError> {
        self.execute_admin_sql(&format!(
            "DROP DATABASE IF EXISTS {} WITH (FORCE)",
            quote_identifier(name)
        ))
    }

    fn start(&mut self) -> Result<(), BoxError> {
        match self.bootstrap.privileges {
            ExecutionPrivileges::Root => self.start_via_worker(),
            ExecutionPrivileges::Unprivileged => self.start_in_process(),
        }
    }

    fn start_in_process(&mut self) -> Result<(), BoxError> {
        let runtime = test_runtime()?;
        let guard = EnvVarGuard::set_many(&env_vars_to_os(&self.env_vars));
        let mut postgres = PostgreSQL::new(self.bootstrap.settings.clone());
        let started = runtime.block_on(async {
            postgres
                .setup()
                .await
                .map_err(|err| Box::new(err) as BoxError)?;
            if !matches!(postgres.status(), Status::Started) {
                postgres
                    .start()
                    .await
                    .map_err(|err| Box::new(err) as BoxError)?;
            }
            Ok::<(), BoxError>(())
        });
        drop(guard);
        started?;
        self.bootstrap.settings = postgres.settings().clone();
        sync_port_from_pid(&mut self.bootstrap.settings)?;
        self.runtime = Some(runtime);
        self.postgres = Some(postgres);
        Ok(())
    }

    fn start_via_worker(&mut self) -> Result<(), BoxError> {
        self.run_worker_operation(WorkerOperation::Setup, self.bootstrap.setup_timeout)?;
        self.run_worker_operation(WorkerOperation::Start, self.bootstrap.start_timeout)?;
        sync_port_from_pid(&mut self.bootstrap.settings)
    }

    fn stop(&mut self) -> Result<(), BoxError> {
        let Some(postgres) = self.postgres.take() else {
            if matches!(self.bootstrap.privileges, ExecutionPrivileges::Root) {
                self.run_worker_operation(WorkerOperation::Stop, self.bootstrap.shutdown_timeout)?;
            }
            return Ok(());
        };
        let Some(runtime) = &self.runtime else {
            return Ok(());
        };
        runtime.block_on(async {
            postgres
                .stop()
                .await
                .map_err(|err| Box::new(err) as BoxError)
        })
    }

    fn run_worker_operation(
        &self,
        operation: WorkerOperation,
        timeout: Duration,
    ) -> Result<(), BoxError> {
        let worker = self.bootstrap.worker_binary.as_ref().ok_or_else(|| {
            Box::new(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{WORKER_ENV} is not set for worker operation"),
            )) as BoxError
        })?;
        let args = WorkerRequestArgs {
            worker: worker.as_path(),
            settings: &self.bootstrap.settings,
            env_vars: &self.env_vars,
            operation,
            timeout,
        };
        run_worker(&WorkerRequest::new(args)).map_err(|err| Box::new(err) as BoxError)
    }

    fn execute_admin_sql(&self, sql: &str) -> Result<(), BoxError> {
        let mut connection = PgConnection::establish(&self.database_url("postgres"))
            .map_err(|err| Box::new(err) as BoxError)?;
        diesel::sql_query(sql)
            .execute(&mut connection)
            .map_err(|err| Box::new(err) as BoxError)?;
        Ok(())
    }

    fn database_exists(&self, name: &str) -> Result<bool, BoxError> {
        #[derive(diesel::QueryableByName)]
        struct ExistsRow {
            #[diesel(sql_type = diesel::sql_types::Bool)]
            exists: bool,
        }

        let mut connection = PgConnection::establish(&self.database_url("postgres"))
            .map_err(|err| Box::new(err) as BoxError)?;
        let row = diesel::sql_query(
            "SELECT EXISTS (SELECT 1 FROM pg_database WHERE datname = $1) AS exists",
        )
        .bind::<diesel::sql_types::Text, _>(name)
        .get_result::<ExistsRow>(&mut connection)
        .map_err(|err| Box::new(err) as BoxError)?;
        Ok(row.exists)
    }
}

impl Drop for ManagedCluster {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            tracing::warn!(error = %err, "failed to stop embedded PostgreSQL");
        }
    }
}

/// A per-test database dropped when the handle goes out of scope.
pub struct TemporaryDatabase {
    cluster: &'static ManagedCluster,
    name: String,
}

impl TemporaryDatabase {
    /// Connection URL for this database.
    #[must_use]
    pub fn url(&self) -> String {
        self.cluster.database_url(&self.name)
    }
}

impl Drop for TemporaryDatabase {
    fn drop(&mut self) {
        if let Err(err) = self.cluster.drop_database(&self.name) {
            tracing::warn!(database = %self.name, error = %err, "failed to drop test database");
        }
    }
}

fn database_lock() -> std::sync::MutexGuard<'static, ()> {
    DATABASE_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn env_vars_to_os(env_vars: &[(String, Option<String>)]) -> Vec<(OsString, Option<OsString>)> {
    env_vars
        .iter()
        .map(|(key, value)| (OsString::from(key), value.as_ref().map(OsString::from)))
        .collect()
}

/// Picks a free port and, under root, the worker binary before bootstrap
/// reads the environment.
fn bootstrap_env_changes() -> Result<Vec<(OsString, Option<OsString>)>, BoxError> {
    let mut changes = Vec::new();
    if std::env::var_os("PG_PORT").is_none() {
        let listener =
            TcpListener::bind(("127.0.0.1", 0)).map_err(|err| Box::new(err) as BoxError)?;
        let port = listener
            .local_addr()
            .map_err(|err| Box::new(err) as BoxError)?
            .port();
        drop(listener);
        changes.push((OsString::from("PG_PORT"), Some(OsString::from(port.to_string()))));
    }

    if matches!(detect_execution_privileges(), ExecutionPrivileges::Root) {
        let worker = locate_worker().ok_or_else(|| {
            Box::new(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("running as root needs {WORKER_ENV} or `{WORKER_NAME}` on PATH"),
            )) as BoxError
        })?;
        changes.push((OsString::from(WORKER_ENV), Some(prepare_worker(&worker)?)));
    }
    Ok(changes)
}

fn locate_worker() -> Option<PathBuf> {
    if let Some(configured) = std::env::var_os(WORKER_ENV) {
        return Some(PathBuf::from(configured));
    }
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(WORKER_NAME))
        .find(|candidate| candidate.is_file())
}

/// Copies the worker somewhere the demoted user can execute it.
fn prepare_worker(worker: &Path) -> Result<OsString, BoxError> {
    let destination = std::env::temp_dir().join(format!("{WORKER_NAME}_{}", std::process::id()));
    let (source_dir, source_name) = open_parent_dir(worker)?;
    let (destination_dir, destination_name) = open_parent_dir(&destination)?;
    if destination_dir.exists(destination_name) {
        destination_dir
            .remove_file(destination_name)
            .map_err(|err| Box::new(err) as BoxError)?;
    }
    source_dir
        .copy(source_name, &destination_dir, destination_name)
        .map_err(|err| Box::new(err) as BoxError)?;
    #[cfg(unix)]
    destination_dir
        .set_permissions(destination_name, Permissions::from_mode(0o755))
        .map_err(|err| Box::new(err) as BoxError)?;
    Ok(destination.into_os_string())
}

fn sync_password_from_file(settings: &mut Settings) -> Result<(), BoxError> {
    let (dir, file_name) = open_parent_dir(&settings.password_file)?;
    match dir.read_to_string(file_name) {
        Ok(contents) => {
            let password = contents.trim_end();
            if !password.is_empty() {
                password.clone_into(&mut settings.password);
            }
            Ok(())
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(Box::new(err) as BoxError),
    }
}

/// The fourth line of `postmaster.pid` holds the port the server bound.
fn sync_port_from_pid(settings: &mut Settings) -> Result<(), BoxError> {
    let data_dir = Dir::open_ambient_dir(&settings.data_dir, ambient_authority())
        .map_err(|err| Box::new(err) as BoxError)?;
    let contents = match data_dir.read_to_string("postmaster.pid") {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(Box::new(err) as BoxError),
    };
    if let Some(port) = contents
        .lines()
        .nth(3)
        .and_then(|line| line.trim().parse::<u16>().ok())
    {
        settings.port = port;
    }
    Ok(())
}

fn open_parent_dir(path: &Path) -> Result<(Dir, &OsStr), BoxError> {
    let file_name = path.file_name().ok_or_else(|| {
        Box::new(std::io::Error::other("path must include a file name")) as BoxError
    })?;
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let dir = Dir::open_ambient_dir(parent, ambient_authority())
        .map_err(|err| Box::new(err) as BoxError)?;
    Ok((dir, file_name))
}
