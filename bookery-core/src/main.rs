use anyhow::{bail, Context, Result};
use bookery_core::config::{Config, JwtConfig};
use bookery_core::domain::{Principal, Role, StaffRole, TenantId, TenantRef, TenantSlug};
use bookery_core::jwt::TokenCodec;
use bookery_core::{server, telemetry};
use clap::{Parser, Subcommand};
use tracing::info;

/// Bookery Core - tenant resolution and session service
#[derive(Parser)]
#[command(name = "bookery-core")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Mint a session token with the configured secret, for local development
    IssueToken(IssueTokenArgs),
}

#[derive(clap::Args)]
struct IssueTokenArgs {
    /// SYSTEM_ADMIN, BUSINESS_OWNER, STAFF or CUSTOMER
    #[arg(long)]
    role: Role,

    #[arg(long)]
    email: String,

    #[arg(long)]
    name: Option<String>,

    /// Subject id, random when omitted
    #[arg(long)]
    subject: Option<String>,

    /// Required for every role except SYSTEM_ADMIN
    #[arg(long)]
    business_id: Option<TenantId>,

    #[arg(long)]
    business_slug: Option<String>,

    #[arg(long)]
    business_name: Option<String>,

    /// ADMIN or STAFF, only kept for STAFF tokens
    #[arg(long)]
    staff_role: Option<StaffRole>,

    /// Lifetime in seconds, JWT_TTL_SECS when omitted
    #[arg(long)]
    ttl_secs: Option<i64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve().await,
        Command::IssueToken(args) => issue_token(args),
    }
}

async fn serve() -> Result<()> {
    let config = Config::from_env()?;
    let prometheus = telemetry::init(&config.telemetry)?;

    info!("Starting Bookery Core Service");
    info!("HTTP server listening on {}", config.http_addr());

    server::run(config, prometheus).await
}

fn issue_token(args: IssueTokenArgs) -> Result<()> {
    let jwt = JwtConfig::from_env()?;
    let codec = TokenCodec::new(&jwt);

    let tenant = match (args.role, args.business_id, args.business_slug) {
        (Role::SystemAdmin, _, _) => None,
        (_, Some(id), Some(slug)) => Some(TenantRef {
            id,
            name: args.business_name,
            slug: TenantSlug::parse(&slug).context("Invalid --business-slug")?,
        }),
        (role, _, _) => bail!("{} tokens need --business-id and --business-slug", role),
    };

    let principal = Principal {
        subject_id: args
            .subject
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        email: args.email,
        name: args.name,
        role: args.role,
        tenant,
        staff_role: args.staff_role.filter(|_| args.role == Role::Staff),
        is_admin: args.role == Role::SystemAdmin,
    };

    let ttl = args
        .ttl_secs
        .map(chrono::Duration::seconds)
        .unwrap_or_else(|| codec.session_ttl());
    let token = codec.encode(&principal, ttl)?;
    println!("{}", token);
    Ok(())
}
