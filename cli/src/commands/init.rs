use anyhow::Result;
use std::path::{Path, PathBuf};
use structopt::StructOpt;

use crate::{
    bootstrap::EnvironmentBootstrapper,
    cloud::CloudApi,
    commands::experiment::{new_experiment, NewExperimentArgs},
    config::FugaConfig,
    prompt::PromptProvider,
};

#[derive(Debug, StructOpt)]
pub struct InitArgs {
    /// Name of the experiment to create once the environment is set up
    experiment_name: String,

    #[structopt(long = "template", short = "t")]
    /// Template name, template directory or git URL of a template repository
    template: Option<String>,
}

/// `fuga environment init` followed by `fuga experiment new`.
pub fn run(
    args: &InitArgs,
    api: &dyn CloudApi,
    config: &mut FugaConfig,
    prompt: &mut dyn PromptProvider,
    working_dir: &Path,
) -> Result<PathBuf> {
    EnvironmentBootstrapper {
        api,
        config: &mut *config,
        prompt,
    }
    .run()?;

    new_experiment(
        &NewExperimentArgs {
            name: args.experiment_name.clone(),
            template: args.template.clone(),
            output_dir: None,
            force: false,
        },
        config,
        working_dir,
    )
}
