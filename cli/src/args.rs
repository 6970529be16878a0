use crate::{
    commands::{
        config::ConfigArgs, deploy::DeployArgs, environment::EnvironmentArgs,
        experiment::ExperimentArgs, init::InitArgs, pod_operator::PodOperatorArgs,
    },
    printer::OutputFormat,
};
use anyhow::{anyhow, Error, Result};
use std::{path::PathBuf, str::FromStr};
use structopt::StructOpt;
use url::Url;

/// fuga scaffolds machine learning experiments and deploys them to Cloud Composer.
#[derive(Debug, StructOpt)]
#[structopt(
    name = "fuga",
    global_settings = &[
        structopt::clap::AppSettings::ColoredHelp,
        structopt::clap::AppSettings::InferSubcommands,
    ]
)]
pub struct Args {
    #[structopt(long = "config-file", parse(from_os_str))]
    /// Path to the configuration file. Defaults to $FUGA_HOME/config.yml (~/.fuga/config.yml).
    pub config: Option<PathBuf>,

    #[structopt(short = "v", long = "verbose")]
    /// Enable more verbose logging.
    pub verbose: bool,

    #[structopt(long = "token")]
    /// Google Cloud access token to use. Overrides `access_token` from the configuration
    /// and the token printed by `gcloud auth print-access-token`.
    pub token: Option<String>,

    #[structopt(long = "proxy")]
    /// URL for an HTTP proxy that will be used for all requests if specified
    pub proxy: Option<Url>,

    #[structopt(short = "o", long = "output", default_value = "table")]
    /// Output format for printed resources. One of: table, json
    pub output: OutputFormat,

    #[structopt(subcommand)]
    pub command: Command,
}

#[derive(Debug, StructOpt)]
pub enum Command {
    #[structopt(name = "completion")]
    /// Output shell completion code for the specified shell (bash or zsh)
    Completion { shell: Shell },

    #[structopt(name = "config")]
    /// Inspect and edit the fuga configuration
    Config {
        #[structopt(subcommand)]
        config_args: ConfigArgs,
    },

    #[structopt(name = "init")]
    /// Set up the fuga environment and create a first experiment
    Init {
        #[structopt(flatten)]
        init_args: InitArgs,
    },

    #[structopt(name = "environment")]
    /// Manage the GCP project, GCS bucket and Composer environment used by fuga
    Environment {
        #[structopt(subcommand)]
        environment_args: EnvironmentArgs,
    },

    #[structopt(name = "experiment")]
    /// Create and deploy experiments
    Experiment {
        #[structopt(subcommand)]
        experiment_args: ExperimentArgs,
    },

    #[structopt(name = "pod-operator")]
    /// Create and deploy the docker images run by KubernetesPodOperators
    PodOperator {
        #[structopt(subcommand)]
        pod_operator_args: PodOperatorArgs,
    },

    #[structopt(name = "deploy")]
    /// Deploy the current experiment and all of its pod operators
    Deploy {
        #[structopt(flatten)]
        deploy_args: DeployArgs,
    },
}

#[derive(Debug)]
pub enum Shell {
    Bash,
    Zsh,
}

impl FromStr for Shell {
    type Err = Error;

    fn from_str(string: &str) -> Result<Self> {
        match string {
            "bash" => Ok(Shell::Bash),
            "zsh" => Ok(Shell::Zsh),
            _ => Err(anyhow!("unknown shell: '{}'", string)),
        }
    }
}
