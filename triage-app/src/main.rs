use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command};
use guidance::Guidance;
use shell::LineReader;
use triage_common::TriageError;
use triage_common::observability::init_logging;
use triage_config::{ConfigError, TriageConfig, TriageConfigLoader, default_config_path};
use triage_core::validate::validate;
use triage_core::{Consultant, Origin, Requester, RetryPolicy};
use triage_llm::ensure_llm_ready;
use triage_runtime::{TriageHandle, TriageRuntime};

mod cli;
mod guidance;
mod render;
mod samples;
mod shell;

const EXIT_INVALID_INPUT: u8 = 2;
const EXIT_INTERRUPTED: u8 = 130;

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "triage.fatal");
            render::fatal(&format!("{err:#}"), &remediation(&err));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    // A missing .env is normal.
    dotenv::dotenv().ok();

    if let Some(Command::Samples { list: true, .. }) = &cli.command {
        samples::list();
        return Ok(ExitCode::SUCCESS);
    }

    let config = load_config(&cli)?;

    let mut log_config = config.logging.to_log_config();
    if cli.verbose {
        log_config.emit_stderr = true;
        log_config.default_filter = "debug".to_string();
    }
    let log_path = init_logging(log_config)?;

    let llm_config = config.llm_config()?;
    tracing::info!(
        provider = llm_config.provider_name(),
        log = %log_path.display(),
        "triage.start"
    );

    let requester = Requester::new(RetryPolicy::new(
        config.retry.max_retries,
        config.retry.base_delay(),
    ));
    let options = config.generation_options();

    let runtime = TriageRuntime::build("triage", None)?;
    let handle = runtime.handle();
    let result = runtime.block_on(async {
        let client = ensure_llm_ready(&llm_config)
            .await
            .context("failed to initialise the consultation service")?;
        let consultant = Consultant::new(client, requester, options);
        handle.listen_for_interrupts();
        dispatch(cli.command, &consultant, &handle, llm_config.provider_name()).await
    });

    runtime.shutdown(Duration::from_millis(100));
    result
}

fn load_config(cli: &Cli) -> Result<TriageConfig> {
    let mut loader = TriageConfigLoader::new();
    if let Some(path) = cli.config.as_ref() {
        loader = loader.with_file(path);
    } else if let Some(path) = default_config_path() {
        loader = loader.with_file(path);
    }
    Ok(loader.load()?.with_overrides(cli.provider, cli.model.clone()))
}

async fn dispatch(
    command: Option<Command>,
    consultant: &Consultant,
    handle: &TriageHandle,
    provider: &str,
) -> Result<ExitCode> {
    match command.unwrap_or(Command::Chat) {
        Command::Chat => {
            render::welcome(provider, consultant.model_name());
            let mut input = LineReader::stdin();
            shell::run(consultant, handle, &mut input).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Ask { symptoms, json } => ask(consultant, handle, &symptoms.join(" "), json).await,
        Command::Samples { quick, name, .. } => {
            let cases = samples::select(quick, &name);
            if cases.is_empty() {
                anyhow::bail!("no sample case named {name:?}; see `triage samples --list`");
            }
            samples::run(consultant, handle, &cases).await;
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn ask(
    consultant: &Consultant,
    handle: &TriageHandle,
    raw: &str,
    json: bool,
) -> Result<ExitCode> {
    let symptoms = match validate(raw) {
        Ok(symptoms) => symptoms,
        Err(err) => {
            eprintln!("{err}\n{}", err.hint());
            return Ok(ExitCode::from(EXIT_INVALID_INPUT));
        }
    };

    let scope = handle.scope();
    let result = consultant.consult(&symptoms, scope.token()).await;
    drop(scope);

    let Ok(consultation) = result else {
        render::interrupted();
        return Ok(ExitCode::from(EXIT_INTERRUPTED));
    };

    if json {
        println!("{}", render::json_report(&consultation)?);
    } else {
        println!("{}", render::card(&consultation));
        if let Origin::Fallback { reason } = &consultation.origin {
            print!("{}", render::guidance(&Guidance::for_failure(&reason.to_string(), 1)));
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn remediation(err: &anyhow::Error) -> Vec<String> {
    if let Some(config_err) = err.downcast_ref::<ConfigError>() {
        return config_err.remediation();
    }
    match err.downcast_ref::<TriageError>() {
        Some(TriageError::Http(_)) => vec![
            "Check your internet connection".to_string(),
            "For the ollama provider, start the server with `ollama serve`".to_string(),
            "Run again with --verbose for details".to_string(),
        ],
        Some(_) => vec![
            "Verify the API key and model for the configured provider".to_string(),
            "Run again with --verbose for details".to_string(),
        ],
        None => Vec::new(),
    }
}
