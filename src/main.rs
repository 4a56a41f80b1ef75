use std::{net::SocketAddr, path::Path, process::ExitCode, sync::Arc, time::Duration};

use clap::Parser;
use docguard::{
    AppState,
    authz::{AccessRequest, PolicyRequirement},
    build_app,
    config::DocguardConfig,
    db::{DbPool, InMemoryStore},
    models::Caller,
    observability,
};
use http::Method;
use tokio_util::task::TaskTracker;

const DEFAULT_CONFIG_PATH: &str = "docguard.toml";

/// How long shutdown waits for pending audit writes.
const SHUTDOWN_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// CLI arguments for docguard
#[derive(Parser, Debug)]
#[command(version, about = "Document access control service", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to config file (defaults to ./docguard.toml if it exists,
    /// otherwise built-in defaults are used)
    #[arg(short, long, global = true)]
    config: Option<String>,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Start the decision service (default)
    Serve,
    /// Run database migrations and exit
    ///
    /// Useful for init containers or CI pipelines.
    Migrate,
    /// Print the route policy table, with config overrides applied
    Policies,
    /// Evaluate a single request against the configured database
    ///
    /// Exits 0 when allowed, 1 when denied, 2 when the check could not run.
    Check {
        /// Registered route id, e.g. "documents.delete"
        #[arg(long, conflicts_with = "public")]
        route: Option<String>,
        /// Evaluate against a public requirement instead of a route
        #[arg(long)]
        public: bool,
        /// Caller UUID; omit for an anonymous caller
        #[arg(long, requires = "role")]
        caller_id: Option<String>,
        /// Caller system role (ADMIN, USER or GUEST)
        #[arg(long, requires = "caller_id")]
        role: Option<String>,
        /// HTTP method of the request
        #[arg(long, default_value = "GET")]
        method: String,
        /// Target document id
        #[arg(long)]
        document: Option<String>,
        /// Target group id
        #[arg(long)]
        group: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(message) => {
            eprintln!("{message}");
            return ExitCode::FAILURE;
        }
    };

    match args.command {
        None | Some(Command::Serve) => run_server(config).await,
        Some(Command::Migrate) => run_migrate(config).await,
        Some(Command::Policies) => run_policies(&config),
        Some(Command::Check {
            route,
            public,
            caller_id,
            role,
            method,
            document,
            group,
        }) => {
            let requirement = match (route, public) {
                (Some(route), _) => match config.route_registry() {
                    Ok(registry) => match registry.get(&route) {
                        Some(policy) => policy.requirement.clone(),
                        None => {
                            eprintln!("Error: unknown route '{route}'");
                            return ExitCode::from(2);
                        }
                    },
                    Err(e) => {
                        eprintln!("Error: {e}");
                        return ExitCode::from(2);
                    }
                },
                (None, true) => PolicyRequirement::public(),
                (None, false) => {
                    eprintln!("Error: one of --route or --public is required");
                    return ExitCode::from(2);
                }
            };

            let caller = match (caller_id, role) {
                (Some(id), Some(role)) => match Caller::parse(&id, &role) {
                    Some(caller) => Some(caller),
                    None => {
                        eprintln!("Error: invalid caller '{id}' with role '{role}'");
                        return ExitCode::from(2);
                    }
                },
                _ => None,
            };

            let method = match Method::from_bytes(method.to_ascii_uppercase().as_bytes()) {
                Ok(method) => method,
                Err(_) => {
                    eprintln!("Error: invalid method '{method}'");
                    return ExitCode::from(2);
                }
            };

            let mut request = AccessRequest::new(method);
            request.target_document_id = document;
            request.target_group_id = group;

            run_check(config, requirement, caller, request).await
        }
    }
}

fn load_config(explicit_path: Option<&str>) -> Result<DocguardConfig, String> {
    let path = match explicit_path {
        Some(path) => Path::new(path),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => Path::new(DEFAULT_CONFIG_PATH),
        None => return Ok(DocguardConfig::default()),
    };

    DocguardConfig::from_file(path)
        .map_err(|e| format!("Failed to load config from {}: {e}", path.display()))
}

/// Connect to the configured database, or an empty in-memory store when none is set.
async fn connect(config: &DocguardConfig) -> Result<Arc<DbPool>, String> {
    if config.database.is_none() {
        tracing::warn!(
            "No database configured. Lookups use an empty in-memory store, so every \
             request that names a document or group will be denied."
        );
        return Ok(Arc::new(DbPool::from_memory(Arc::new(InMemoryStore::new()))));
    }

    let pool = DbPool::from_config(&config.database)
        .await
        .map_err(|e| format!("Failed to connect to database: {e}"))?;

    if config.database.run_migrations() {
        pool.run_migrations()
            .await
            .map_err(|e| format!("Database migrations failed: {e}"))?;
    }

    Ok(Arc::new(pool))
}

async fn run_server(config: DocguardConfig) -> ExitCode {
    if let Err(e) = observability::init_tracing(&config.observability) {
        eprintln!("Failed to initialize tracing: {e}");
        return ExitCode::FAILURE;
    }

    if let Err(e) = observability::metrics::init_metrics(&config.observability.metrics) {
        tracing::warn!(error = %e, "Failed to initialize metrics");
    }

    if config.auth.trusted_headers.is_some() && !config.server.host.is_loopback() {
        tracing::warn!(
            bind_address = %config.server.host,
            "Caller identity is read from request headers. Only expose this service \
             behind a proxy that strips and sets those headers."
        );
    }

    let db = match connect(&config).await {
        Ok(db) => db,
        Err(message) => {
            tracing::error!("{message}");
            return ExitCode::FAILURE;
        }
    };

    let addr = config.server.socket_addr();
    let state = match AppState::new(config.clone(), db) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, "Failed to initialize application state");
            return ExitCode::FAILURE;
        }
    };
    let task_tracker = state.task_tracker.clone();

    tracing::info!(
        routes = state.registry.len(),
        backend = state.db.backend(),
        "Route policies loaded"
    );

    let app = build_app(&config, state);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, %addr, "Failed to bind");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(%addr, "docguard listening");

    let served = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(task_tracker.clone()))
    .await;

    if let Err(e) = served {
        tracing::error!(error = %e, "Server error");
        return ExitCode::FAILURE;
    }

    // In-flight requests are done; let the last audit writes land.
    if tokio::time::timeout(SHUTDOWN_DRAIN_TIMEOUT, task_tracker.wait())
        .await
        .is_err()
    {
        tracing::warn!(
            pending = task_tracker.len(),
            "Timeout waiting for audit writes to complete"
        );
    } else {
        tracing::info!("All background tasks completed");
    }

    ExitCode::SUCCESS
}

async fn shutdown_signal(task_tracker: TaskTracker) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, waiting for background tasks to complete...");

    task_tracker.close();
}

async fn run_migrate(config: DocguardConfig) -> ExitCode {
    if let Err(e) = observability::init_tracing(&config.observability) {
        eprintln!("Failed to initialize tracing: {e}");
        return ExitCode::FAILURE;
    }

    if config.database.is_none() {
        eprintln!("Error: Database is not configured. Nothing to migrate.");
        return ExitCode::FAILURE;
    }

    tracing::info!("Running database migrations");

    let pool = match DbPool::from_config(&config.database).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!(error = %e, "Failed to connect to database");
            eprintln!("Error: Failed to connect to database: {e}");
            return ExitCode::FAILURE;
        }
    };

    match pool.run_migrations().await {
        Ok(()) => {
            tracing::info!("Database migrations completed successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Database migrations failed");
            eprintln!("Error: Database migrations failed: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run_policies(config: &DocguardConfig) -> ExitCode {
    let registry = match config.route_registry() {
        Ok(registry) => registry,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    for policy in registry.iter() {
        let requirement = &policy.requirement;
        let mut rules = Vec::new();
        if requirement.is_public {
            rules.push("public".to_string());
        }
        if let Some(roles) = &requirement.system_roles {
            let roles: Vec<_> = roles.iter().map(|r| r.as_str()).collect();
            rules.push(format!("system={}", roles.join("|")));
        }
        if let Some(roles) = &requirement.group_roles {
            let roles: Vec<_> = roles.iter().map(|r| r.as_str()).collect();
            rules.push(format!("group={}", roles.join("|")));
        }
        if requirement.allow_list_access {
            rules.push("allow_list".to_string());
        }
        if rules.is_empty() {
            rules.push("open".to_string());
        }

        println!(
            "{:<32} {:<7} {:<48} {}",
            policy.id,
            policy.method.as_str(),
            policy.path,
            rules.join(" ")
        );
    }

    ExitCode::SUCCESS
}

async fn run_check(
    config: DocguardConfig,
    requirement: PolicyRequirement,
    caller: Option<Caller>,
    request: AccessRequest,
) -> ExitCode {
    let db = match connect(&config).await {
        Ok(db) => db,
        Err(message) => {
            eprintln!("Error: {message}");
            return ExitCode::from(2);
        }
    };
    let state = match AppState::new(config, db) {
        Ok(state) => state,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::from(2);
        }
    };

    match state
        .engine
        .decide(&requirement, caller.as_ref(), &request)
        .await
    {
        Ok(decision) if decision.allowed => {
            println!("allow ({})", decision.rule);
            ExitCode::SUCCESS
        }
        Ok(decision) => {
            println!("deny ({})", decision.rule);
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(2)
        }
    }
}
