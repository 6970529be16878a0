use anyhow::Result;
use log::info;
use std::path::Path;
use structopt::StructOpt;

use crate::{
    cloud::CloudApi,
    commands::{
        experiment,
        pod_operator::{self, ImageBuilder, DEFAULT_TAG},
    },
    config::FugaConfig,
    experiment::Experiment,
    prompt::PromptProvider,
};

#[derive(Debug, StructOpt)]
pub struct DeployArgs {
    #[structopt(long = "yes", short = "y")]
    /// Upload without asking for confirmation
    yes: bool,
}

/// Deploy the experiment, then every pod operator in it.
pub fn run(
    args: &DeployArgs,
    api: &dyn CloudApi,
    config: &FugaConfig,
    prompt: &mut dyn PromptProvider,
    builder: &dyn ImageBuilder,
    working_dir: &Path,
) -> Result<()> {
    let experiment = Experiment::discover(working_dir)?;
    experiment::deploy(api, config, prompt, &experiment, args.yes)?;

    let operators = experiment.pod_operators()?;
    for operator in &operators {
        pod_operator::deploy(config, builder, &experiment, operator, DEFAULT_TAG)?;
    }
    info!(
        "Deployed experiment `{}` and {} pod operator(s).",
        experiment.name,
        operators.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cloud::testing::{environment, FakeCloud},
        commands::pod_operator::testing::{DockerCall, RecordingBuilder},
        prompt::testing::ScriptedPrompt,
    };
    use fuga_client::EnvironmentState;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    const ENVIRONMENT: &str = "projects/repro-lab/locations/us-central1/environments/composer";

    #[test]
    fn test_deploy_experiment_and_operators() {
        let dir = TempDir::new().unwrap();
        for (path, content) in [
            ("fuga.yml", "experiment_name: music_rec\n"),
            ("music_rec.py", "# dag\n"),
            ("pod_operators/train/Dockerfile", "FROM python:3.8\n"),
            ("pod_operators/evaluate/Dockerfile", "FROM python:3.8\n"),
        ] {
            let path = dir.path().join(path);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        let config = FugaConfig::load(
            dir.path().join("config.yml"),
            [
                ("FUGA_PROJECT_ID", "repro-lab"),
                ("FUGA_BUCKET_NAME", "fuga-data"),
                ("FUGA_ENVIRONMENT_PATH", ENVIRONMENT),
            ]
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string())),
        )
        .unwrap();
        let cloud = FakeCloud {
            environments: vec![environment(
                ENVIRONMENT,
                EnvironmentState::Running,
                Some("gs://composer-bucket/dags"),
            )],
            ..Default::default()
        };
        let builder = RecordingBuilder::default();

        run(
            &DeployArgs { yes: true },
            &cloud,
            &config,
            &mut ScriptedPrompt::default(),
            &builder,
            &dir.path().join("pod_operators"),
        )
        .unwrap();

        assert_eq!(cloud.uploads.borrow().len(), 3);
        let pushed: Vec<String> = builder
            .calls
            .into_inner()
            .into_iter()
            .filter_map(|call| match call {
                DockerCall::Push(image) => Some(image),
                DockerCall::Build(..) => None,
            })
            .collect();
        assert_eq!(
            pushed,
            vec![
                "gcr.io/repro-lab/music_rec_evaluate:latest",
                "gcr.io/repro-lab/music_rec_train:latest",
            ]
        );
    }
}
