//! Entrypoint.

use std::{io, process::ExitCode};

use clap::Parser;
use config::{ApplyOpts, Command, Opts, ReportFormat};
use dotenvy::dotenv;
use provision::{
    DesiredState, ProvisionError, Provisioner, Settings,
    report::{render_json, render_text},
    summarize,
};
use runtime::shutdown::ShutdownSignal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> eyre::Result<ExitCode> {
    if let Ok(custom_env_file) = std::env::var("ENV_FILE") {
        dotenvy::from_filename(custom_env_file)?;
    } else {
        // Try the default .env file, and ignore if it doesn't exist.
        dotenv().ok();
    }

    let opts = Opts::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    match opts.command {
        Command::Apply(apply) => apply_monitors(apply).await,
    }
}

async fn apply_monitors(opts: ApplyOpts) -> eyre::Result<ExitCode> {
    info!(
        config = %opts.config.display(),
        base_url = %opts.service.base_url,
        "Monitor provisioner starting"
    );
    let shutdown = ShutdownSignal::new()?.with_optional_deadline(opts.deadline());

    let desired = match DesiredState::load(&opts.config) {
        Ok(desired) => desired,
        Err(e) => return Ok(abort(e.into())),
    };
    let provisioner = match Provisioner::from_settings(settings(&opts)) {
        Ok(provisioner) => provisioner,
        Err(e) => return Ok(abort(e)),
    };
    let results = match provisioner.run(&desired, shutdown).await {
        Ok(results) => results,
        Err(e) => return Ok(abort(e)),
    };

    let summary = summarize(&results);
    let mut stdout = io::stdout().lock();
    match opts.format {
        ReportFormat::Text => render_text(&results, &summary, &mut stdout)?,
        ReportFormat::Json => render_json(&results, &summary, &mut stdout)?,
    }

    info!(
        total = summary.total,
        created = summary.created,
        already_exists = summary.already_exists,
        failed = summary.failed,
        "Provisioning finished"
    );
    Ok(exit_code(summary.exit_code()))
}

fn settings(opts: &ApplyOpts) -> Settings {
    Settings {
        base_url: opts.service.base_url.clone(),
        token: opts.service.token.clone(),
        request_timeout: opts.service.request_timeout(),
        ready_max_attempts: opts.readiness.max_attempts(),
        ready_interval: opts.readiness.interval(),
        dry_run: opts.dry_run,
    }
}

fn abort(err: ProvisionError) -> ExitCode {
    error!(error = %err, "Provisioning aborted");
    exit_code(err.exit_code())
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
