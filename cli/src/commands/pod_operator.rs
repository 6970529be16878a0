use anyhow::{anyhow, Result};
use colored::Colorize;
use log::info;
use std::path::{Path, PathBuf};
use structopt::StructOpt;

use crate::{
    airflow::ExperimentNames,
    config::{FugaConfig, BUCKET_NAME, PROJECT_ID},
    experiment::Experiment,
    scaffold::{pod_operator_context, resolve_template, TemplateKind},
    utils::process::{docker_build, docker_push},
};

pub const DEFAULT_TAG: &str = "latest";

#[derive(Debug, StructOpt)]
pub enum PodOperatorArgs {
    #[structopt(name = "new")]
    /// Add a new pod operator to the current experiment
    New {
        /// Name of the pod operator
        name: String,

        #[structopt(long = "template", short = "t")]
        /// Template name, template directory or git URL of a template repository
        template: Option<String>,

        #[structopt(long = "force", short = "f")]
        /// Render into the pod operator directory even if it already exists
        force: bool,
    },

    #[structopt(name = "deploy")]
    /// Build the pod operator's docker image and push it to Container Registry
    Deploy {
        /// Name of the pod operator
        name: String,

        #[structopt(long = "tag", default_value = "latest")]
        /// Tag of the pushed image
        tag: String,
    },
}

/// Builds and publishes container images.
pub trait ImageBuilder {
    fn build(&self, image: &str, context_dir: &Path) -> Result<()>;

    fn push(&self, image: &str) -> Result<()>;
}

/// The local `docker` command line.
pub struct Docker;

impl ImageBuilder for Docker {
    fn build(&self, image: &str, context_dir: &Path) -> Result<()> {
        docker_build(image, context_dir)
    }

    fn push(&self, image: &str) -> Result<()> {
        docker_push(image)
    }
}

pub fn run(
    args: &PodOperatorArgs,
    config: &FugaConfig,
    builder: &dyn ImageBuilder,
    working_dir: &Path,
) -> Result<()> {
    let experiment = Experiment::discover(working_dir)?;
    match args {
        PodOperatorArgs::New {
            name,
            template,
            force,
        } => {
            new_pod_operator(config, &experiment, name, template.as_deref(), *force)?;
        }
        PodOperatorArgs::Deploy { name, tag } => {
            deploy(config, builder, &experiment, name, tag)?;
        }
    }
    Ok(())
}

fn experiment_names(config: &FugaConfig, experiment: &Experiment) -> Result<ExperimentNames> {
    let required = config.require(&[PROJECT_ID, BUCKET_NAME])?;
    Ok(ExperimentNames::new(
        &experiment.name,
        required[0],
        required[1],
    ))
}

pub fn new_pod_operator(
    config: &FugaConfig,
    experiment: &Experiment,
    name: &str,
    template: Option<&str>,
    force: bool,
) -> Result<PathBuf> {
    let names = experiment_names(config, experiment)?;
    let template = resolve_template(TemplateKind::PodOperator, template, &config.templates_dir())?;
    let output_dir = experiment.pod_operators_dir().join(name);
    template.render(&pod_operator_context(&names, name), &output_dir, force)?;
    info!(
        "Created pod operator {} in `{}`. Its image will be `{}`.",
        name.bold(),
        output_dir.display(),
        names.pod_operator_image(name)
    );
    Ok(output_dir)
}

/// Build and push the image of one pod operator, returning the pushed image reference.
pub fn deploy(
    config: &FugaConfig,
    builder: &dyn ImageBuilder,
    experiment: &Experiment,
    name: &str,
    tag: &str,
) -> Result<String> {
    let names = experiment_names(config, experiment)?;
    let context_dir = experiment.pod_operators_dir().join(name);
    if !context_dir.is_dir() {
        return Err(anyhow!(
            "Pod operator `{}` does not exist in experiment `{}` (expected `{}`)",
            name,
            experiment.name,
            context_dir.display()
        ));
    }

    let image = format!("{}:{}", names.pod_operator_image(name), tag);
    info!("Building image `{}`.", image);
    builder.build(&image, &context_dir)?;
    info!("Pushing image `{}`.", image);
    builder.push(&image)?;
    info!("Deployed pod operator {}.", name.bold());
    Ok(image)
}


#[cfg(test)]
mod tests {
    use super::{testing::*, *};
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, FugaConfig, Experiment) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("fuga.yml"), "experiment_name: music_rec\n").unwrap();
        let config = FugaConfig::load(
            dir.path().join("config.yml"),
            vec![
                ("FUGA_PROJECT_ID".to_owned(), "repro-lab".to_owned()),
                ("FUGA_BUCKET_NAME".to_owned(), "fuga-data".to_owned()),
            ],
        )
        .unwrap();
        let experiment = Experiment::from_path(dir.path()).unwrap();
        (dir, config, experiment)
    }

    #[test]
    fn test_new_pod_operator() {
        let (dir, config, experiment) = setup();
        let output_dir =
            new_pod_operator(&config, &experiment, "evaluate-model", None, false).unwrap();

        assert_eq!(output_dir, dir.path().join("pod_operators/evaluate-model"));
        assert!(output_dir.join("Dockerfile").is_file());
        assert_eq!(experiment.pod_operators().unwrap(), vec!["evaluate-model"]);
        assert!(new_pod_operator(&config, &experiment, "evaluate-model", None, false).is_err());
    }

    #[test]
    fn test_deploy_builds_and_pushes() {
        let (dir, config, experiment) = setup();
        new_pod_operator(&config, &experiment, "train", None, false).unwrap();
        let builder = RecordingBuilder::default();

        let image = deploy(&config, &builder, &experiment, "train", "v2").unwrap();
        assert_eq!(image, "gcr.io/repro-lab/music_rec_train:v2");
        assert_eq!(
            builder.calls.into_inner(),
            vec![
                DockerCall::Build(image.clone(), dir.path().join("pod_operators/train")),
                DockerCall::Push(image),
            ]
        );
    }

    #[test]
    fn test_deploy_unknown_operator() {
        let (_dir, config, experiment) = setup();
        let builder = RecordingBuilder::default();
        assert!(deploy(&config, &builder, &experiment, "missing", DEFAULT_TAG).is_err());
        assert!(builder.calls.borrow().is_empty());
    }
}
