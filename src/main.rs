use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use futures::StreamExt;
use gcp_estate::admin;
use gcp_estate::config::{app_config_dir, Config};
use gcp_estate::gcp::http::format_gcp_error;
use gcp_estate::resource::region::{MultiRegion, Region};
use gcp_estate::{
    list_organizations, ApiResolver, Container, Endpoints, GcpClient, GcpCredentials,
    Organization,
};
use serde::Serialize;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Navigate a Google Cloud estate
#[derive(Parser, Debug)]
#[command(name = "gcp-estate", version = gcp_estate::VERSION, about, long_about = None)]
struct Args {
    /// Log level for debugging (written to the log file, never the terminal)
    #[arg(long, value_enum, default_value = "off", global = true)]
    log_level: LogLevel,

    /// Use this OAuth access token instead of Application Default Credentials
    #[arg(long, global = true)]
    access_token: Option<String>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List visible organizations
    Orgs,
    /// Print the folder/project tree
    Tree {
        #[command(flatten)]
        scope: Scope,
    },
    /// List every project below a container, depth-first
    Walk {
        #[command(flatten)]
        scope: Scope,
        /// Include projects that are not ACTIVE
        #[arg(long)]
        all: bool,
    },
    /// Resolve a folder path ("team/prod/apps")
    Cd {
        path: String,
        /// Organization to start from
        #[arg(short, long)]
        org: Option<String>,
    },
    /// Resolve API display names to service ids
    LookupApi {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// List billing accounts
    Billing {
        #[arg(short, long)]
        org: Option<String>,
        /// Include closed accounts
        #[arg(long)]
        all: bool,
    },
    /// Roles bound to a user on a container (defaults to the caller)
    Roles {
        #[command(flatten)]
        scope: Scope,
        #[arg(long)]
        email: Option<String>,
    },
    /// List regions and multi-regions
    Regions,
    /// List admin configurations
    AdminConfigs,
    /// Remember the organization used when --org is omitted
    SetOrg { org: String },
}

/// Container selection shared by the tree commands
#[derive(clap::Args, Debug)]
struct Scope {
    /// Organization id, "organizations/<id>" or "none" for projects without one
    #[arg(short, long)]
    org: Option<String>,
    /// Folder path below the organization
    #[arg(short, long)]
    path: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let Some(tracing_level) = level.to_tracing_level() else {
        return Ok(None);
    };

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("failed to open log file {}", log_path.display()))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("gcp-estate {} started with log level: {:?}", gcp_estate::VERSION, level);
    tracing::info!("Log file: {:?}", log_path);

    Ok(Some(guard))
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = app_config_dir() {
        return config_dir.join("gcp-estate.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".gcp-estate").join("gcp-estate.log");
    }
    PathBuf::from("gcp-estate.log")
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let _log_guard = match setup_logging(args.log_level) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("Warning: {err:#}");
            None
        },
    };

    if let Err(err) = run(args).await {
        tracing::error!("{:#}", err);
        match err.downcast_ref::<gcp_estate::Error>() {
            Some(gcp_err) => eprintln!("Error: {}", format_gcp_error(gcp_err)),
            None => eprintln!("Error: {err:#}"),
        }
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let json = args.json;
    let mut config = Config::load();

    // Commands that never touch the network
    match &args.command {
        Command::LookupApi { names } => return lookup_apis(names, json),
        Command::Regions => return print_regions(json),
        Command::AdminConfigs => {
            let configs = admin::list_available_configs();
            return emit(json, &configs, || configs.join("\n"));
        },
        Command::SetOrg { org } => {
            config.set_default_organization(org)?;
            println!("Default organization set to {}", org);
            return Ok(());
        },
        _ => {},
    }

    let client = match &args.access_token {
        Some(token) => GcpClient::with_credentials(
            GcpCredentials::from_static_token(token.clone()),
            Endpoints::google(),
        )?,
        None => GcpClient::new()
            .await
            .context("no Application Default Credentials; run 'gcloud auth application-default login'")?,
    };

    match args.command {
        Command::Orgs => {
            let orgs = list_organizations(&client).await?;
            emit(json, &orgs, || {
                orgs.iter().map(|o| o.to_string()).collect::<Vec<_>>().join("\n")
            })
        },
        Command::Tree { scope } => {
            let container = select_container(&client, &config, &scope).await?;
            println!("{}", container.render_tree(&client).await?);
            Ok(())
        },
        Command::Walk { scope, all } => {
            let container = select_container(&client, &config, &scope).await?;
            let mut projects = Box::pin(container.walk_projects(&client, !all));
            while let Some(project) = projects.next().await {
                let project = project?;
                if json {
                    println!("{}", serde_json::to_string(&project)?);
                } else {
                    println!(
                        "{}\t{}\t{}",
                        project.id,
                        project.lifecycle_state,
                        project.parent.resource_name()
                    );
                }
            }
            Ok(())
        },
        Command::Cd { path, org } => {
            let root = select_organization(&client, &config, org.as_deref()).await?;
            let folder = root.cd(&client, &path).await?;
            emit(json, &folder, || {
                format!("{} ({})", folder.display_name, folder.resource_name)
            })
        },
        Command::Billing { org, all } => {
            let container = select_organization(&client, &config, org.as_deref()).await?;
            let accounts = container.billing_accounts(&client, !all).await?;
            emit(json, &accounts, || {
                accounts
                    .iter()
                    .map(|a| format!("{}\t{}\t{}", a.id, a.status, a.display_name))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
        },
        Command::Roles { scope, email } => {
            let container = select_container(&client, &config, &scope).await?;
            let roles = container.list_roles(&client, email.as_deref()).await?;
            emit(json, &roles, || {
                roles
                    .iter()
                    .map(|r| format!("{}\t{}", r.name, r.title))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
        },
        Command::LookupApi { .. } | Command::Regions | Command::AdminConfigs | Command::SetOrg { .. } => {
            Ok(())
        },
    }
}

/// Organization named on the command line, else the configured default,
/// else the only visible one
async fn select_organization(
    client: &GcpClient,
    config: &Config,
    org: Option<&str>,
) -> Result<Container> {
    let wanted = org
        .map(|s| s.to_string())
        .or_else(|| config.default_organization.clone());

    match wanted.as_deref() {
        Some("none") | Some("NO_ORG") => Ok(Container::NoOrganization),
        Some(id) => Ok(Organization::lookup(client, id).await?.into()),
        None => {
            let orgs = list_organizations(client).await?;
            let real: Vec<&Container> = orgs.iter().filter(|c| c.is_real()).collect();
            match real.as_slice() {
                [only] => Ok((*only).clone()),
                [] if orgs.is_empty() => bail!("no organizations or projects are visible"),
                [] => Ok(Container::NoOrganization),
                several => bail!(
                    "several organizations are visible, pick one with --org: {}",
                    several
                        .iter()
                        .map(|c| c.to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            }
        },
    }
}

async fn select_container(client: &GcpClient, config: &Config, scope: &Scope) -> Result<Container> {
    let root = select_organization(client, config, scope.org.as_deref()).await?;
    match scope.path.as_deref() {
        Some(path) => Ok(root.resolve_path(client, path).await?.into()),
        None => Ok(root),
    }
}

fn lookup_apis(names: &[String], json: bool) -> Result<()> {
    let resolver = ApiResolver::bundled()?;

    #[derive(Serialize)]
    struct Resolved<'a> {
        query: &'a str,
        display_name: String,
        service_id: String,
    }

    let mut resolved = Vec::with_capacity(names.len());
    for name in names {
        let found = resolver.lookup(name)?;
        tracing::debug!("{} -> {} ({:?})", name, found.service_id, found.kind);
        resolved.push(Resolved {
            query: name,
            display_name: found.display_name,
            service_id: found.service_id,
        });
    }

    emit(json, &resolved, || {
        resolved
            .iter()
            .map(|r| format!("{}\t{}", r.service_id, r.display_name))
            .collect::<Vec<_>>()
            .join("\n")
    })
}

fn print_regions(json: bool) -> Result<()> {
    if json {
        let regions: Vec<_> = Region::ALL
            .iter()
            .map(|r| serde_json::json!({
                "id": r.id(),
                "continent": r.continent(),
                "description": r.description(),
            }))
            .collect();
        let multi: Vec<_> = MultiRegion::ALL
            .iter()
            .map(|m| serde_json::json!({
                "id": m.id(),
                "description": m.description(),
                "read_write_regions": m.read_write_regions().iter().map(|r| r.id()).collect::<Vec<_>>(),
                "witness_region": m.witness_region().id(),
            }))
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "regions": regions,
                "multi_regions": multi,
            }))?
        );
        return Ok(());
    }

    for region in Region::ALL {
        println!("{}\t{}\t{}", region.id(), region.continent(), region.description());
    }
    for multi in MultiRegion::ALL {
        println!("{}\tmulti-region\t{}", multi.id(), multi.description());
    }
    Ok(())
}

fn emit<T: Serialize + ?Sized>(json: bool, value: &T, text: impl FnOnce() -> String) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        let text = text();
        if !text.is_empty() {
            println!("{}", text);
        }
    }
    Ok(())
}
