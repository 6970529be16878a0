use anyhow::{anyhow, Context, Result};
use colored::Colorize;
use fuga_client::{EnvironmentPath, EnvironmentState, StorageUri};
use log::info;
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};
use structopt::StructOpt;

use crate::{
    airflow::ExperimentNames,
    cloud::CloudApi,
    commands::ensure_user_confirms,
    config::{FugaConfig, BUCKET_NAME, ENVIRONMENT_PATH, PROJECT_ID},
    experiment::{Experiment, Upload},
    progress::{Progress, UploadStatistics},
    prompt::PromptProvider,
    scaffold::{experiment_context, resolve_template, TemplateKind},
};

#[derive(Debug, StructOpt)]
pub enum ExperimentArgs {
    #[structopt(name = "new")]
    /// Create a new experiment from a template
    New(NewExperimentArgs),

    #[structopt(name = "deploy")]
    /// Upload the current experiment to the Cloud Composer DAG folder
    Deploy {
        #[structopt(long = "yes", short = "y")]
        /// Upload without asking for confirmation
        yes: bool,
    },
}

#[derive(Debug, StructOpt)]
pub struct NewExperimentArgs {
    /// Name of the experiment, used for the directory and the Airflow DAG
    pub name: String,

    #[structopt(long = "template", short = "t")]
    /// Template name, template directory or git URL of a template repository
    pub template: Option<String>,

    #[structopt(long = "output-dir", parse(from_os_str))]
    /// Directory in which the experiment directory is created [default: current directory]
    pub output_dir: Option<PathBuf>,

    #[structopt(long = "force", short = "f")]
    /// Render into the experiment directory even if it already exists
    pub force: bool,
}

/// `connect` is only called by commands that talk to Google Cloud.
pub fn run<Api, Connect>(
    args: &ExperimentArgs,
    connect: Connect,
    config: &FugaConfig,
    prompt: &mut dyn PromptProvider,
    working_dir: &Path,
) -> Result<()>
where
    Api: CloudApi,
    Connect: FnOnce() -> Result<Api>,
{
    match args {
        ExperimentArgs::New(new_args) => {
            new_experiment(new_args, config, working_dir)?;
        }
        ExperimentArgs::Deploy { yes } => {
            let experiment = Experiment::discover(working_dir)?;
            deploy(&connect()?, config, prompt, &experiment, *yes)?;
        }
    }
    Ok(())
}

/// Render the experiment template, returning the created experiment directory.
pub fn new_experiment(
    args: &NewExperimentArgs,
    config: &FugaConfig,
    working_dir: &Path,
) -> Result<PathBuf> {
    let required = config.require(&[PROJECT_ID, BUCKET_NAME])?;
    let names = ExperimentNames::new(&args.name, required[0], required[1]);

    let template = resolve_template(
        TemplateKind::Experiment,
        args.template.as_deref(),
        &config.templates_dir(),
    )?;
    let output_dir = args
        .output_dir
        .as_ref()
        .map(|output_dir| working_dir.join(output_dir))
        .unwrap_or_else(|| working_dir.to_owned())
        .join(&args.name);

    let written = template.render(&experiment_context(&names), &output_dir, args.force)?;
    info!(
        "Created experiment {} ({} files) in `{}`.",
        args.name.bold(),
        written.len(),
        output_dir.display()
    );
    Ok(output_dir)
}

/// Upload the experiment into the DAG folder of the configured Composer environment.
pub fn deploy(
    api: &dyn CloudApi,
    config: &FugaConfig,
    prompt: &mut dyn PromptProvider,
    experiment: &Experiment,
    yes: bool,
) -> Result<()> {
    let required = config.require(&[ENVIRONMENT_PATH])?;
    let environment_path: EnvironmentPath = required[0]
        .parse()
        .with_context(|| format!("Invalid `{ENVIRONMENT_PATH}` in configuration"))?;

    let environment = api.get_environment(&environment_path)?;
    if environment.state != EnvironmentState::Running {
        return Err(anyhow!(
            "Composer environment `{}` is in invalid state {}.\nYou need to wait until the environment is running or fix it if it's broken.",
            environment.name,
            environment.state
        ));
    }
    let dag_gcs_prefix = environment.config.dag_gcs_prefix.as_deref().ok_or_else(|| {
        anyhow!(
            "Composer environment `{}` has no DAG folder (`dagGcsPrefix`).",
            environment.name
        )
    })?;
    let destination = StorageUri::parse(dag_gcs_prefix).with_context(|| {
        format!("Invalid DAG folder of Composer environment `{}`", environment.name)
    })?;

    let uploads = experiment.plan_uploads(&destination.prefix)?;
    if uploads.is_empty() {
        info!("Nothing to deploy in `{}`.", experiment.root.display());
        return Ok(());
    }

    info!(
        "Following files are going to be uploaded to GCS bucket {}:",
        destination.bucket.0.bold()
    );
    for upload in &uploads {
        info!(
            "  {} -> gs://{}/{}",
            upload.local_path.display(),
            destination.bucket,
            upload.object_name
        );
    }
    ensure_user_confirms(prompt, "Do you want to continue?", yes)?;

    upload_files(api, &destination, &uploads)?;
    info!(
        "Deployed experiment {} to `{}`.",
        experiment.name.bold(),
        dag_gcs_prefix
    );
    Ok(())
}

fn upload_files(api: &dyn CloudApi, destination: &StorageUri, uploads: &[Upload]) -> Result<()> {
    let mut total_bytes = 0;
    for upload in uploads {
        total_bytes += fs::metadata(&upload.local_path)
            .with_context(|| format!("Could not read `{}`", upload.local_path.display()))?
            .len();
    }

    let statistics = Arc::new(UploadStatistics::default());
    let mut progress = Progress::for_uploads(&statistics, uploads.len(), total_bytes)?;
    for upload in uploads {
        let body = fs::read(&upload.local_path)
            .with_context(|| format!("Could not read `{}`", upload.local_path.display()))?;
        let bytes = body.len() as u64;
        api.upload_object(&destination.bucket, &upload.object_name, body)
            .with_context(|| format!("Could not upload `{}`", upload.local_path.display()))?;
        statistics.add_file(bytes);
    }
    progress.done();
    Ok(())
}
