use anyhow::{bail, Context, Result};
use chrono::{Duration as ChronoDuration, Utc};
use clap::{Parser, Subcommand};
use claimsync_core::config::Config;
use claimsync_core::core_model::Address;
use claimsync_core::core_session::{Role, Session, SessionUser, WalletPreference};
use claimsync_core::core_sync::{
    NewIdentity, NoticeStatus, SyncReport, WorkflowError, WorkflowResult,
};
use claimsync_core::logging::{init_logging_with_config, LogConfig, LogLevel};
use claimsync_core::simulation::SimulatedEnvironment;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "claimsync")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Override the configured log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Enable JSON formatted logging
    #[arg(long)]
    json_logs: bool,

    /// Configuration file. Without one, defaults and CLAIMSYNC_* variables apply.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Inspect or generate configuration
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Run a scripted admin session against an in-process registry
    Simulate {
        /// Delay before the indexer writes each mirror row, in milliseconds
        #[arg(long, default_value_t = 0)]
        indexer_lag_ms: u64,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write the default configuration
    Init {
        #[arg(default_value = "claimsync.toml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Load and validate a configuration file
    Check { path: PathBuf },
    /// Print the effective configuration
    Show,
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => Config::from_env().context("reading configuration from environment")?,
    };
    Ok(config)
}

fn log_config(args: &Args, config: &Config) -> Result<LogConfig> {
    let mut log = LogConfig::try_from(&config.logging)?;
    if let Some(level) = &args.log_level {
        let level: LogLevel = level.parse()?;
        log = LogConfig::new(level)
            .with_timestamp(config.logging.with_timestamp)
            .with_target(config.logging.with_target)
            .json_format(config.logging.json_format);
    }
    Ok(log.json_format(args.json_logs || config.logging.json_format))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // `config init` must work even when the target file is broken.
    if let Some(Command::Config(ConfigCommand::Init { path, force })) = &args.command {
        return init_config(path, *force);
    }

    let config = load_config(args.config.as_deref())?;
    init_logging_with_config(log_config(&args, &config)?)?;
    if config.metrics.enabled {
        claimsync_core::metrics::init_metrics();
    }

    match args.command {
        Some(Command::Config(ConfigCommand::Check { path })) => {
            Config::from_file(&path).with_context(|| format!("checking {}", path.display()))?;
            println!("{}: ok", path.display());
        }
        Some(Command::Config(ConfigCommand::Show)) => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Some(Command::Config(ConfigCommand::Init { .. })) => {}
        Some(Command::Simulate { indexer_lag_ms }) => {
            simulate(&config, Duration::from_millis(indexer_lag_ms)).await?;
        }
        None => {
            info!("No command specified. Use --help for usage information.");
        }
    }

    Ok(())
}

fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    Config::default()
        .save_to_file(path)
        .with_context(|| format!("writing {}", path.display()))?;
    println!("wrote {}", path.display());
    Ok(())
}

/// Keep going when only the mirror lagged; the journal holds the write.
fn diverged<T>(result: WorkflowResult<SyncReport<T>>) -> Result<Option<T>> {
    match result {
        Ok(report) => Ok(Some(report.value)),
        Err(e @ WorkflowError::MirrorConsistency { .. }) => {
            warn!(error = %e, "continuing with a diverged mirror");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Central authority signing with a private wallet. Custody stubs in the
/// simulation do not reach the registry.
fn simulation_session() -> Session {
    let user = SessionUser {
        id: "simulated-admin".to_string(),
        username: "admin".to_string(),
        wallet_address: Some(Address::from_low_u64(0xad)),
        wallet_id: None,
        wallet_preference: WalletPreference::Private,
        roles: vec![Role::CentralAuthority.as_str().to_string()],
    };
    Session::new(user, "simulated-token", Utc::now() + ChronoDuration::hours(1))
}

async fn simulate(config: &Config, indexer_lag: Duration) -> Result<()> {
    let env = SimulatedEnvironment::start(
        config.sync.clone(),
        indexer_lag,
        &config.custody.function_prefix,
    );
    let workflow = env.workflow(simulation_session())?;

    let mut notices = workflow.notices().subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(notice) = notices.recv().await {
            match notice.status {
                NoticeStatus::Pending => info!(subject = %notice.subject, "{}", notice.message),
                NoticeStatus::Succeeded => info!(subject = %notice.subject, "{}", notice.message),
                NoticeStatus::Failed => warn!(subject = %notice.subject, "{}", notice.message),
            }
        }
    });

    diverged(workflow.create_claim_topic("KYC Tier 1").await)?;
    diverged(workflow.create_claim_topic("AML Screened").await)?;
    let topics = env.chain.get_claim_topics().await?;
    let &[kyc, aml] = topics.as_slice() else {
        bail!("expected two claim topics on the simulated registry");
    };

    let issuer = Address::from_low_u64(0x155).to_string();
    diverged(
        workflow
            .create_trusted_issuer("Simulated Verifier", &issuer, &[kyc])
            .await,
    )?;
    diverged(
        workflow
            .update_trusted_issuer("Simulated Verifier", &issuer, &[kyc, aml])
            .await,
    )?;

    let owner = Address::from_low_u64(0xa11ce);
    let created = workflow
        .create_digital_identity(NewIdentity {
            display_name: "Alice Example".to_string(),
            wallet_address: owner.to_string(),
            account_number: "SIM-0001".to_string(),
            from_pending: false,
        })
        .await?;
    info!(identity = %created.value.identity, "identity registered");

    diverged(workflow.edit_claims(&owner.to_string(), &[kyc, aml]).await)?;
    if let Some(edit) = diverged(workflow.edit_claims(&owner.to_string(), &[aml]).await)? {
        info!(removed = ?edit.removed, added = ?edit.added, "claims edited");
    }

    if !workflow.journal().is_empty() {
        warn!(pending = workflow.journal().len(), "mirror diverged; reconciling");
        tokio::time::sleep(indexer_lag).await;
        let summary = workflow.reconcile().await?.value;
        if summary.remaining > 0 {
            error!(remaining = summary.remaining, "mirror still diverged");
        }
    }

    for issuer in workflow.queries().trusted_issuers().await? {
        println!(
            "issuer {} ({}) topics {:?}",
            issuer.value.issuer,
            issuer.value.verifier_name,
            issuer.value.topics()
        );
    }
    for identity in workflow.queries().active_identities().await? {
        println!(
            "identity {} {:?} claims {:?}",
            identity.profile.value.address,
            identity.profile.value.display_name,
            identity.profile.value.claims
        );
    }

    drop(workflow);
    tokio::task::yield_now().await;
    printer.abort();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_simulate() {
        let args =
            Args::try_parse_from(["claimsync", "simulate", "--indexer-lag-ms", "250"]).unwrap();
        assert!(matches!(
            args.command,
            Some(Command::Simulate { indexer_lag_ms: 250 })
        ));
    }

    #[test]
    fn test_parse_config_check_with_global_config() {
        let args =
            Args::try_parse_from(["claimsync", "config", "check", "a.toml", "--config", "b.toml"])
                .unwrap();
        assert_eq!(args.config, Some(PathBuf::from("b.toml")));
        assert!(matches!(
            args.command,
            Some(Command::Config(ConfigCommand::Check { .. }))
        ));
    }

    #[test]
    fn test_init_config_refuses_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("claimsync.toml");

        init_config(&path, false).unwrap();
        assert_eq!(Config::from_file(&path).unwrap(), Config::default());
        assert!(init_config(&path, false).is_err());
        init_config(&path, true).unwrap();
    }

    #[test]
    fn test_log_level_flag_overrides_config() {
        let args =
            Args::try_parse_from(["claimsync", "--log-level", "debug", "--json-logs"]).unwrap();
        let log = log_config(&args, &Config::default()).unwrap();
        assert!(log.directive().starts_with("debug"));
    }

    #[test]
    fn test_simulation_session_is_admin() {
        let session = simulation_session();
        assert!(session.has_role(&Role::CentralAuthority));
        assert_eq!(session.wallet_preference, WalletPreference::Private);
    }
}
