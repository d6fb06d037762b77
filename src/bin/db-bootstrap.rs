use anyhow::{Context, Result};
use bb8::Pool;
use clap::{Args, Parser, Subcommand};
use db_bootstrap::{
    r#async::{Backend, TokioPostgresBackend, TokioPostgresBb8},
    BootstrapConfig, ExistingRole, IsolationLevel, Plan, PrivilegedPostgresConfig,
    SessionDefaults,
};
use dotenvy::dotenv;
use tracing::Level;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
struct Cli {
    /// Print debug information, including every statement with the password redacted
    #[clap(long, global = true)]
    debug: bool,

    #[clap(flatten)]
    connection: ConnectionArgs,

    #[clap(subcommand)]
    command: Commands,
}

/// Administrative connection
#[derive(Args)]
struct ConnectionArgs {
    /// Server host
    #[clap(long, global = true, env = "POSTGRES_HOST", default_value = "localhost")]
    host: String,

    /// Server port
    #[clap(long, global = true, env = "POSTGRES_PORT", default_value_t = 5432)]
    port: u16,

    /// Administrative user
    #[clap(long, global = true, env = "POSTGRES_USERNAME", default_value = "postgres")]
    username: String,

    /// Administrative user's password
    #[clap(long, global = true, env = "POSTGRES_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Database the administrative connection opens, never the target
    #[clap(
        long,
        global = true,
        env = "POSTGRES_DATABASE",
        default_value = "postgres"
    )]
    maintenance_database: String,
}

impl ConnectionArgs {
    fn config(&self) -> PrivilegedPostgresConfig {
        PrivilegedPostgresConfig::new()
            .host(self.host.clone())
            .port(self.port)
            .username(self.username.clone())
            .password(self.password.clone())
            .database(self.maintenance_database.clone())
    }
}

/// Database and role to bootstrap
#[derive(Args)]
struct TargetArgs {
    /// Database to recreate
    #[clap(long, env = "BOOTSTRAP_DATABASE")]
    database: String,

    /// Application role
    #[clap(long, env = "BOOTSTRAP_ROLE")]
    role: String,

    /// Application role's password
    #[clap(long, env = "BOOTSTRAP_PASSWORD", hide_env_values = true)]
    role_password: String,

    /// Default client encoding of the role
    #[clap(long, env = "BOOTSTRAP_CLIENT_ENCODING", default_value = "utf8")]
    client_encoding: String,

    /// Default transaction isolation level of the role, e.g. read-committed
    #[clap(
        long,
        env = "BOOTSTRAP_ISOLATION_LEVEL",
        default_value = "read committed"
    )]
    isolation_level: IsolationLevel,

    /// Default timezone of the role
    #[clap(long, env = "BOOTSTRAP_TIMEZONE", default_value = "UTC")]
    timezone: String,

    /// Reset the password of an existing role instead of failing
    #[clap(long)]
    update_existing_role: bool,

    /// Drop the database even if sessions reconnect (PostgreSQL 13+)
    #[clap(long)]
    force_drop: bool,
}

impl TargetArgs {
    fn into_config(self) -> Result<BootstrapConfig> {
        let session_defaults = SessionDefaults::new()
            .client_encoding(self.client_encoding)?
            .isolation_level(self.isolation_level)
            .timezone(self.timezone)?;
        let existing_role = if self.update_existing_role {
            ExistingRole::Update
        } else {
            ExistingRole::Fail
        };

        Ok(
            BootstrapConfig::new(self.database, self.role, self.role_password)?
                .session_defaults(session_defaults)
                .existing_role(existing_role)
                .force_drop(self.force_drop),
        )
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Terminate sessions, recreate the database and set up the role
    Run {
        #[clap(flatten)]
        target: TargetArgs,

        /// Verify the role afterwards
        #[clap(long)]
        verify: bool,
    },

    /// Check the role logs in and carries its defaults and privileges
    Verify {
        #[clap(flatten)]
        target: TargetArgs,
    },

    /// Terminate sessions and drop the database and the role
    Teardown {
        #[clap(flatten)]
        target: TargetArgs,
    },

    /// Print the bootstrap statements without connecting
    Plan {
        #[clap(flatten)]
        target: TargetArgs,

        /// Print the role's password instead of a placeholder
        #[clap(long)]
        show_password: bool,
    },
}

async fn create_backend(
    connection: &ConnectionArgs,
    target: BootstrapConfig,
) -> Result<TokioPostgresBackend<TokioPostgresBb8>> {
    TokioPostgresBackend::<TokioPostgresBb8>::new(connection.config().into(), target, || {
        Pool::builder().max_size(1).retry_connection(false)
    })
    .await
    .with_context(|| {
        format!(
            "failed to connect to {}:{} as {}",
            connection.host, connection.port, connection.username
        )
    })
}

async fn verify(
    backend: &TokioPostgresBackend<TokioPostgresBb8>,
    target: &BootstrapConfig,
) -> Result<()> {
    let verification = backend
        .verify()
        .await
        .with_context(|| format!("role {} failed verification", target.get_role()))?;

    for (name, _) in target.get_session_defaults().settings() {
        println!(
            "{name} = {}",
            verification.role_setting(name).unwrap_or_default()
        );
    }
    let privileges = verification.privileges();
    println!(
        "privileges on {}: CREATE={} CONNECT={} TEMPORARY={}",
        target.get_database(),
        privileges.create,
        privileges.connect,
        privileges.temporary
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.debug { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run { target, verify: verify_after } => {
            let target = target.into_config()?;
            let backend = create_backend(&cli.connection, target.clone()).await?;
            let report = backend.bootstrap().await.with_context(|| {
                format!("failed to bootstrap database {}", target.get_database())
            })?;
            println!(
                "bootstrapped database {} for role {} ({} sessions terminated)",
                target.get_database(),
                target.get_role(),
                report.terminated_sessions()
            );
            if verify_after {
                verify(&backend, &target).await?;
            }
        }
        Commands::Verify { target } => {
            let target = target.into_config()?;
            let backend = create_backend(&cli.connection, target.clone()).await?;
            verify(&backend, &target).await?;
        }
        Commands::Teardown { target } => {
            let target = target.into_config()?;
            let backend = create_backend(&cli.connection, target.clone()).await?;
            let report = backend.teardown().await.with_context(|| {
                format!("failed to tear down database {}", target.get_database())
            })?;
            println!(
                "dropped database {} and role {} ({} sessions terminated)",
                target.get_database(),
                target.get_role(),
                report.terminated_sessions()
            );
        }
        Commands::Plan {
            target,
            show_password,
        } => {
            let target = target.into_config()?;
            print!("{}", Plan::bootstrap(&target, false).script(show_password));
        }
    }

    Ok(())
}
