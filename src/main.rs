//! Cumulus CLI entrypoint.
//!
//! This is the main entrypoint for the cumulus command-line tool.

use std::path::PathBuf;
use std::process::ExitCode;

use cumulus::archive::Archiver;
use cumulus::cfn::{load_aws_config, CfnClient, ChangeSetRunner, DriftDetector, SystemClock};
use cumulus::cli::{Cli, Commands, OutputFormatter, UpsertArgs};
use cumulus::config::{PollSettings, SettingsLoader};
use cumulus::converger::{ConvergeOutcome, Converger};
use cumulus::error::Result;
use cumulus::params::{ParameterResolver, SsmSecretStore, TerminalPrompt};
use cumulus::template;
use cumulus::OperationPlan;

use chrono::Utc;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// How many stack events to show when a convergence fails.
const FAILURE_EVENT_LIMIT: usize = 25;

/// Tag stamped on every converged stack with the run's code version.
const CODE_VERSION_TAG: &str = "cumulus:code-version";

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Main async entry point. Returns whether the run was happy; the exit
/// code follows from that.
async fn run(cli: Cli) -> Result<bool> {
    let formatter = OutputFormatter::new();

    match cli.command {
        Commands::Upsert(args) => cmd_upsert(args, &formatter).await,
        Commands::Delete {
            stack,
            region,
            profile,
        } => cmd_delete(&stack, region.as_deref(), profile.as_deref()).await,
        Commands::List { region, profile } => {
            cmd_list(region.as_deref(), profile.as_deref(), &formatter).await
        }
        Commands::Drift {
            stack,
            region,
            profile,
        } => {
            cmd_drift(
                &stack,
                region.as_deref(),
                profile.as_deref(),
                cli.verbose,
                &formatter,
            )
            .await
        }
        Commands::Resources {
            stack,
            region,
            profile,
        } => cmd_resources(&stack, region.as_deref(), profile.as_deref(), &formatter).await,
    }
}

/// Create or update a stack.
async fn cmd_upsert(args: UpsertArgs, formatter: &OutputFormatter) -> Result<bool> {
    if let Some(dir) = &args.work_directory {
        std::env::set_current_dir(dir)?;
    }

    // Settings, fully validated before anything touches the network.
    let loader = SettingsLoader::new().with_base_path(
        args.config
            .parent()
            .unwrap_or_else(|| std::path::Path::new(".")),
    );
    loader.load_dotenv()?;

    let mut settings = loader.load_file(&args.config)?;
    if let Some(stack) = args.stack {
        settings.environment.stack_name = Some(stack);
    }
    settings.validate()?;

    let stack_name = settings.stack_name().to_string();
    let version = args
        .version
        .unwrap_or_else(|| Utc::now().timestamp().to_string());
    let poll = PollSettings::from_env();

    // Render when meta parameters are configured, then classify.
    let template_path = if settings.meta_parameters.is_empty() {
        PathBuf::from(settings.template())
    } else {
        template::render(settings.template(), &settings.meta_parameters)?
    };
    let descriptor = template::classify(&template_path)?;

    let aws = load_aws_config(
        settings.environment.region.as_deref(),
        settings.environment.profile.as_deref(),
    )
    .await;
    let cfn = CfnClient::new(&aws);
    let clock = SystemClock;

    // Resolve parameters and check required coverage before any
    // control-plane call.
    let secrets = SsmSecretStore::new(&aws);
    let prompt = TerminalPrompt;
    let resolver = ParameterResolver::new(&secrets, &prompt);
    let parameters = resolver.resolve(&descriptor, &settings.parameters).await?;
    let stack_parameters = parameters.stack_parameters(&descriptor)?;

    let mut tags: Vec<(String, String)> = settings
        .tags
        .iter()
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    tags.push((String::from(CODE_VERSION_TAG), version.clone()));

    // Artifacts must land in the archive before the control plane can be
    // pointed at them.
    let archiver = Archiver::new(&aws, settings.bucket());
    let receipt = archiver
        .archive(&stack_name, &version, &descriptor, &parameters)
        .await?;

    let converger = Converger::new(&cfn, &clock, poll);
    let mode = converger.plan_mode(&stack_name).await?;
    info!("operation mode for {stack_name}: {mode}");

    let plan = OperationPlan::new(mode, receipt.template_url, stack_parameters, tags);

    if args.dry_run {
        let runner = ChangeSetRunner::new(&cfn, &clock, poll);
        let preview = runner.preview(&stack_name, &plan).await?;
        eprintln!("{}", formatter.format_change_preview(&preview));
        return Ok(preview.computed());
    }

    match converger.converge(&stack_name, &plan, !args.no_poll).await? {
        ConvergeOutcome::Converged => {
            info!("stack {mode} finished successfully");
            match cfn.list_stack_resources(&stack_name).await {
                Ok(resources) => {
                    eprintln!("{}", formatter.format_resources(&stack_name, &resources));
                }
                Err(e) => warn!("there was a problem printing stack resources: {e}"),
            }
            Ok(true)
        }
        ConvergeOutcome::Started => {
            info!("stack {mode} started; not polling");
            Ok(true)
        }
        ConvergeOutcome::Failed => {
            error!("stack {mode} did not go well");
            match cfn.recent_stack_events(&stack_name, FAILURE_EVENT_LIMIT).await {
                Ok(events) => eprintln!("{}", formatter.format_events(&stack_name, &events)),
                Err(e) => warn!("there was a problem printing stack events: {e}"),
            }
            Ok(false)
        }
    }
}

/// Delete a stack.
async fn cmd_delete(stack: &str, region: Option<&str>, profile: Option<&str>) -> Result<bool> {
    let aws = load_aws_config(region, profile).await;
    let cfn = CfnClient::new(&aws);
    let clock = SystemClock;

    let converger = Converger::new(&cfn, &clock, PollSettings::from_env());
    converger.delete(stack).await
}

/// List the stacks in the region.
async fn cmd_list(
    region: Option<&str>,
    profile: Option<&str>,
    formatter: &OutputFormatter,
) -> Result<bool> {
    let aws = load_aws_config(region, profile).await;
    let cfn = CfnClient::new(&aws);

    let stacks = cfn.list_stacks().await?;
    eprintln!("{}", formatter.format_stack_list(&stacks));

    Ok(true)
}

/// Produce a drift report for a stack.
async fn cmd_drift(
    stack: &str,
    region: Option<&str>,
    profile: Option<&str>,
    verbose: bool,
    formatter: &OutputFormatter,
) -> Result<bool> {
    let aws = load_aws_config(region, profile).await;
    let cfn = CfnClient::new(&aws);
    let clock = SystemClock;

    let detector = DriftDetector::new(&cfn, &clock, PollSettings::from_env(), verbose);
    let outcome = detector.determine_drift(stack).await?;

    eprintln!("{}", formatter.format_drift(stack, &outcome));

    Ok(outcome.in_sync())
}

/// List the resources of a stack.
async fn cmd_resources(
    stack: &str,
    region: Option<&str>,
    profile: Option<&str>,
    formatter: &OutputFormatter,
) -> Result<bool> {
    let aws = load_aws_config(region, profile).await;
    let cfn = CfnClient::new(&aws);

    let resources = cfn.list_stack_resources(stack).await?;
    eprintln!("{}", formatter.format_resources(stack, &resources));

    Ok(true)
}
