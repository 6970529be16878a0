#![deny(clippy::all)]
mod airflow;
mod args;
mod bootstrap;
mod cloud;
mod commands;
mod config;
mod errors;
mod experiment;
mod printer;
mod progress;
mod prompt;
mod scaffold;
mod selector;
mod utils;

use anyhow::{Context, Result};
use fuga_client::{retry::RetryConfig, ApiEndpoints, Client, Config as ClientConfig, Token};
use log::{debug, error, warn};
use std::{env, io, path::PathBuf, process};
use structopt::{clap::Shell as ClapShell, StructOpt};
use url::Url;

use crate::{
    args::{Args, Command, Shell},
    commands::{
        config as config_command, deploy, environment, experiment as experiment_command, init,
        pod_operator::{self, Docker},
    },
    config::{
        default_config_path, find_fuga_home, FugaConfig, ACCESS_TOKEN, COMPOSER_ENDPOINT,
        RESOURCE_MANAGER_ENDPOINT, STORAGE_ENDPOINT,
    },
    errors::{
        find_credential_error, report_credential_error, CredentialError,
        CREDENTIAL_ERROR_EXIT_CODE,
    },
    printer::Printer,
    prompt::TerminalPrompt,
    utils::{init_env_logger, process::gcloud_access_token},
};

const GCLOUD_EXECUTABLE: &str = "gcloud";

fn run(args: Args) -> Result<()> {
    let config_path = find_configuration(&args)?;
    let mut config = FugaConfig::from_process_env(config_path)?;
    let printer = Printer::new(args.output);
    let mut prompt = TerminalPrompt;
    let working_dir = env::current_dir().context("Could not get the current directory")?;

    match &args.command {
        Command::Completion { shell } => {
            let mut app = Args::clap();
            let clap_shell = match shell {
                Shell::Zsh => ClapShell::Zsh,
                Shell::Bash => ClapShell::Bash,
            };
            app.gen_completions_to("fuga", clap_shell, &mut io::stdout());
            Ok(())
        }
        Command::Config { config_args } => config_command::run(config_args, &mut config, &printer),
        Command::Init { init_args } => {
            let client = client_from_args(&args, &config, None)?;
            init::run(init_args, &client, &mut config, &mut prompt, &working_dir).map(|_| ())
        }
        Command::Environment { environment_args } => {
            let client = client_from_args(&args, &config, None)?;
            environment::run(environment_args, &client, &mut config, &mut prompt, &printer)
        }
        Command::Experiment { experiment_args } => experiment_command::run(
            experiment_args,
            || client_from_args(&args, &config, Some(RetryConfig::default())),
            &config,
            &mut prompt,
            &working_dir,
        ),
        Command::PodOperator { pod_operator_args } => {
            pod_operator::run(pod_operator_args, &config, &Docker, &working_dir)
        }
        Command::Deploy { deploy_args } => {
            let client = client_from_args(&args, &config, Some(RetryConfig::default()))?;
            deploy::run(
                deploy_args,
                &client,
                &config,
                &mut prompt,
                &Docker,
                &working_dir,
            )
        }
    }
}

fn client_from_args(
    args: &Args,
    config: &FugaConfig,
    retry_config: Option<RetryConfig>,
) -> Result<Client> {
    let token = match args
        .token
        .clone()
        .or_else(|| config.get(ACCESS_TOKEN).map(str::to_owned))
    {
        Some(token) => token,
        None => {
            debug!("No access token configured, asking gcloud for one.");
            gcloud_access_token(GCLOUD_EXECUTABLE).map_err(|error| CredentialError {
                message: format!("Could not obtain an access token from gcloud: {error:#}"),
            })?
        }
    };

    let mut endpoints = ApiEndpoints::default();
    for (key, endpoint) in [
        (RESOURCE_MANAGER_ENDPOINT, &mut endpoints.resource_manager),
        (STORAGE_ENDPOINT, &mut endpoints.storage),
        (COMPOSER_ENDPOINT, &mut endpoints.composer),
    ] {
        if let Some(url) = config.get(key) {
            *endpoint = Url::parse(url)
                .with_context(|| format!("Invalid `{key}` in configuration: `{url}`"))?;
            debug!("Using endpoint `{}` from `{}`.", endpoint, key);
        }
    }

    Client::new(ClientConfig {
        endpoints,
        token: Token(token),
        proxy: args.proxy.clone(),
        retry_config,
    })
    .context("Failed to initialise the HTTP client.")
}

fn find_configuration(args: &Args) -> Result<PathBuf> {
    let config_path = if let Some(config_path) = args.config.clone() {
        if !config_path.exists() {
            warn!(
                "Configuration file `{}` doesn't exist.",
                config_path.display()
            );
        }
        config_path
    } else {
        default_config_path(&find_fuga_home()?)
    };
    Ok(config_path)
}

fn main() {
    let args = Args::from_args();
    init_env_logger(args.verbose);

    if let Err(error) = run(args) {
        if let Some(credential_error) = find_credential_error(&error) {
            report_credential_error(credential_error);
            process::exit(CREDENTIAL_ERROR_EXIT_CODE);
        }

        error!("An error occurred:");
        for cause in error.chain() {
            error!(" |- {cause}");
        }

        #[cfg(feature = "backtrace")]
        {
            error!("{}", error.backtrace());
        }

        process::exit(1);
    }
}
