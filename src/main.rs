// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! `buildpack-ci`: run buildpack integration scenarios against a platform

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use buildpack_harness::names::validate_name;
use buildpack_harness::{BuildpackSource, HarnessConfig, HttpFetcher, ShellSession, World};
use clap::{Parser, Subcommand, ValueEnum};
use conjur_api::ConjurClient;
use conjur_buildpack_ci::{AppKind, Scenario};
use secrecy::ExposeSecret;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "buildpack-ci", version, about)]
struct Cli {
    /// TOML file with harness settings; environment variables take precedence
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Push a sample app and check that it receives its secrets
    Run {
        #[arg(long, value_enum)]
        app: AppKind,

        #[arg(long, value_enum, default_value_t = BuildpackArg::Offline)]
        buildpack: BuildpackArg,

        /// Use a buildpack that is already uploaded instead of running upload.sh
        #[arg(long)]
        skip_install: bool,

        /// Name of the already uploaded buildpack, required for an offline
        /// push with --skip-install; it is not deleted on teardown
        #[arg(long, requires = "skip_install")]
        buildpack_name: Option<String>,

        /// Leave the organization and buildpack in place
        #[arg(long)]
        keep: bool,
    },
    /// Delete an organization (and optionally a buildpack) left by an earlier run
    Teardown {
        #[arg(long)]
        org: String,

        #[arg(long)]
        buildpack: Option<String>,
    },
    /// Load a policy file into a policy branch as the Conjur admin
    LoadPolicy {
        #[arg(long, default_value = "root")]
        id: String,

        file: PathBuf,
    },
    /// Rotate a role's API key and print the new key
    RotateKey { role: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BuildpackArg {
    Offline,
    Online,
}

impl From<BuildpackArg> for BuildpackSource {
    fn from(arg: BuildpackArg) -> Self {
        match arg {
            BuildpackArg::Offline => BuildpackSource::Offline,
            BuildpackArg::Online => BuildpackSource::Online,
        }
    }
}

fn build_world(config_file: Option<&std::path::Path>) -> Result<World> {
    let mut config = HarnessConfig::load(config_file)?;
    config.ci_dir = std::path::absolute(&config.ci_dir)
        .with_context(|| format!("Invalid CI directory: {}", config.ci_dir.display()))?;

    let executor = Arc::new(ShellSession::new(&config.ci_dir));
    let conjur = Arc::new(
        ConjurClient::new(
            &config.conjur_appliance_url,
            &config.conjur_account,
            config.conjur_insecure,
        )
        .context("Failed to create Conjur client")?,
    );
    Ok(World::new(config, executor, conjur))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();

    let cli = Cli::parse();
    if let Commands::Run {
        buildpack: BuildpackArg::Offline,
        skip_install: true,
        buildpack_name: None,
        ..
    } = &cli.command
    {
        bail!("--skip-install with an offline buildpack needs --buildpack-name");
    }
    let world = build_world(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            app,
            buildpack,
            skip_install,
            buildpack_name,
            keep,
        } => {
            if let Some(name) = &buildpack_name {
                world.use_existing_buildpack(name)?;
            }
            let fetcher = Arc::new(HttpFetcher::new()?);
            let mut scenario = Scenario::new(&world, fetcher);
            let outcome = scenario.run(app, buildpack.into(), !skip_install).await;
            if let Err(e) = &outcome {
                error!("Scenario failed: {:#}", e);
            }

            if keep {
                info!("Keeping resources created by this run");
            } else {
                match scenario.teardown().await {
                    Ok(report) => info!("Teardown complete: {:?}", report),
                    // A scenario failure takes precedence over a teardown failure
                    Err(e) if outcome.is_err() => error!("{:#}", e),
                    Err(e) => return Err(e),
                }
            }
            outcome
        }
        Commands::Teardown { org, buildpack } => {
            let provisioner = world.provisioner();
            provisioner
                .delete_organization(validate_name(&org)?)
                .await?
                .warn_on_failure("cf delete-org");
            if let Some(buildpack) = buildpack {
                provisioner
                    .delete_buildpack(validate_name(&buildpack)?)
                    .await?
                    .warn_on_failure("cf delete-buildpack");
            }
            Ok(())
        }
        Commands::LoadPolicy { id, file } => {
            let policy = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("Failed to read policy file: {}", file.display()))?;
            let result = world.load_policy(&id, &policy).await?;
            info!("Loaded policy '{}' at version {}", id, result.version);
            Ok(())
        }
        Commands::RotateKey { role } => {
            let session = world.session_for_role(&role, None).await?;
            println!("{}", session.api_key().expose_secret());
            Ok(())
        }
    }
}
