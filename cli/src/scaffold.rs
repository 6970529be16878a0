//! Rendering experiment and pod operator skeletons from templates.
//!
//! A template is a set of files whose relative paths and contents are rendered with `tera`.
//! Templates come from `<templates_dir>/<name>`, a git repository cloned into
//! `templates_dir`, or the templates built into fuga.
use anyhow::{anyhow, Context, Result};
use log::{debug, info};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};
use tera::Tera;
use walkdir::WalkDir;

use crate::{airflow::ExperimentNames, utils::process::git_clone};

pub const DEFAULT_EXPERIMENT_TEMPLATE: &str = "default";
pub const DEFAULT_POD_OPERATOR_TEMPLATE: &str = "pod-operator";
/// Pod operator generated together with a new experiment from the built-in template.
pub const DEFAULT_OPERATOR_NAME: &str = "train";
const DEFAULT_TRAIN_TABLE: &str = "my_train_data";
const DEFAULT_OUTPUT_NAME: &str = "scores";

const BUILT_IN_EXPERIMENT: &[(&str, &str)] = &[
    ("fuga.yml", include_str!("../templates/experiment/fuga.yml")),
    (
        "{{ experiment_name }}.py",
        include_str!("../templates/experiment/dag.py"),
    ),
    (
        "sql/{{ train_table }}.sql",
        include_str!("../templates/experiment/train_data.sql"),
    ),
    ("py/lib.py", include_str!("../templates/experiment/lib.py")),
    (
        "pod_operators/{{ operator_name }}/Dockerfile",
        include_str!("../templates/pod_operator/Dockerfile"),
    ),
    (
        "pod_operators/{{ operator_name }}/main.py",
        include_str!("../templates/pod_operator/main.py"),
    ),
    (
        "pod_operators/{{ operator_name }}/requirements.txt",
        include_str!("../templates/pod_operator/requirements.txt"),
    ),
];

const BUILT_IN_POD_OPERATOR: &[(&str, &str)] = &[
    (
        "Dockerfile",
        include_str!("../templates/pod_operator/Dockerfile"),
    ),
    ("main.py", include_str!("../templates/pod_operator/main.py")),
    (
        "requirements.txt",
        include_str!("../templates/pod_operator/requirements.txt"),
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    Experiment,
    PodOperator,
}

impl TemplateKind {
    pub fn default_name(self) -> &'static str {
        match self {
            TemplateKind::Experiment => DEFAULT_EXPERIMENT_TEMPLATE,
            TemplateKind::PodOperator => DEFAULT_POD_OPERATOR_TEMPLATE,
        }
    }

    fn built_in_files(self) -> &'static [(&'static str, &'static str)] {
        match self {
            TemplateKind::Experiment => BUILT_IN_EXPERIMENT,
            TemplateKind::PodOperator => BUILT_IN_POD_OPERATOR,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct TemplateFile {
    path: String,
    content: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct Template {
    pub name: String,
    files: Vec<TemplateFile>,
}

/// Variables available to templates.
pub type TemplateContext = BTreeMap<String, String>;

impl Template {
    pub fn built_in(kind: TemplateKind) -> Self {
        Self {
            name: kind.default_name().to_owned(),
            files: kind
                .built_in_files()
                .iter()
                .map(|(path, content)| TemplateFile {
                    path: (*path).to_owned(),
                    content: content.as_bytes().to_vec(),
                })
                .collect(),
        }
    }

    pub fn from_directory(directory: impl AsRef<Path>) -> Result<Self> {
        let directory = directory.as_ref();
        let mut files = Vec::new();
        let walker = WalkDir::new(directory)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.file_name() != ".git");
        for entry in walker {
            let entry =
                entry.with_context(|| format!("Could not read template `{}`", directory.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(directory)
                .with_context(|| format!("Bad template path `{}`", entry.path().display()))?;
            let path = relative
                .components()
                .map(|component| component.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let content = fs::read(entry.path())
                .with_context(|| format!("Could not read `{}`", entry.path().display()))?;
            files.push(TemplateFile { path, content });
        }

        if files.is_empty() {
            return Err(anyhow!(
                "Template directory `{}` contains no files",
                directory.display()
            ));
        }
        Ok(Self {
            name: directory.display().to_string(),
            files,
        })
    }

    /// Render every file into `output_dir`. Nothing is written unless all files render.
    pub fn render(
        &self,
        context: &TemplateContext,
        output_dir: &Path,
        force: bool,
    ) -> Result<Vec<PathBuf>> {
        if output_dir.exists() && !force {
            return Err(anyhow!(
                "Output directory `{}` already exists. Use `--force` to overwrite it.",
                output_dir.display()
            ));
        }

        debug!(
            "Rendering template `{}` into `{}`",
            self.name,
            output_dir.display()
        );
        let tera_context = tera::Context::from_serialize(context)
            .context("Could not build template context")?;
        let render = |text: &str, file: &str| {
            Tera::one_off(text, &tera_context, false).with_context(|| {
                format!(
                    "Invalid template variable in `{}` (available: {})",
                    file,
                    context.keys().cloned().collect::<Vec<_>>().join(", ")
                )
            })
        };

        let mut rendered = Vec::with_capacity(self.files.len());
        for file in &self.files {
            let path = render(&file.path, &file.path)?;
            let content = match std::str::from_utf8(&file.content) {
                Ok(text) => render(text, &file.path)?.into_bytes(),
                Err(_) => {
                    debug!("Copying binary template file `{}` as is", file.path);
                    file.content.clone()
                }
            };
            rendered.push((output_dir.join(path), content));
        }

        let mut written = Vec::with_capacity(rendered.len());
        for (path, content) in rendered {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Could not create `{}`", parent.display()))?;
            }
            fs::write(&path, content)
                .with_context(|| format!("Could not write `{}`", path.display()))?;
            written.push(path);
        }
        Ok(written)
    }
}

fn is_git_url(template: &str) -> bool {
    ["https://", "http://", "git://", "ssh://", "git@"]
        .iter()
        .any(|scheme| template.starts_with(scheme))
        || template.ends_with(".git")
}

fn repository_name(url: &str) -> &str {
    let name = url
        .trim_end_matches('/')
        .rsplit(|c: char| c == '/' || c == ':')
        .next()
        .unwrap_or(url);
    name.strip_suffix(".git").unwrap_or(name)
}

/// Find the template named `requested` (or the default one for `kind`).
pub fn resolve_template(
    kind: TemplateKind,
    requested: Option<&str>,
    templates_dir: &Path,
) -> Result<Template> {
    let requested = requested.unwrap_or_else(|| kind.default_name());

    if is_git_url(requested) {
        let destination = templates_dir.join(repository_name(requested));
        if destination.is_dir() {
            info!(
                "Using template `{}` cloned before into `{}`.",
                requested,
                destination.display()
            );
        } else {
            fs::create_dir_all(templates_dir).with_context(|| {
                format!("Could not create `{}`", templates_dir.display())
            })?;
            info!("Cloning template `{}`.", requested);
            git_clone(requested, &destination)?;
        }
        return Template::from_directory(&destination);
    }

    let installed = templates_dir.join(requested);
    if installed.is_dir() {
        return Template::from_directory(&installed);
    }
    if requested == kind.default_name() {
        return Ok(Template::built_in(kind));
    }
    let local = Path::new(requested);
    if local.is_dir() {
        return Template::from_directory(local);
    }
    Err(anyhow!(
        "Could not find template `{}` in `{}`",
        requested,
        templates_dir.display()
    ))
}

pub fn experiment_context(names: &ExperimentNames) -> TemplateContext {
    let mut context = pod_operator_context(names, DEFAULT_OPERATOR_NAME);
    let table = DEFAULT_TRAIN_TABLE;
    for (key, value) in [
        ("dag_id", names.dag_id()),
        ("dataset", names.dataset()),
        ("create_dataset_task_id", names.create_dataset_task_id()),
        ("train_table", table.to_owned()),
        ("bq_to_bq_task_id", names.bq_to_bq_task_id(table)),
        ("destination_table", names.destination_table(table)),
        ("export_task_id", names.export_task_id(table)),
        ("export_source_table", names.export_source_table(table)),
        ("export_uri", names.export_uri(table)),
        ("output_key", names.output_key(DEFAULT_OUTPUT_NAME)),
    ] {
        context.insert(key.to_owned(), value);
    }
    context
}

pub fn pod_operator_context(names: &ExperimentNames, operator_name: &str) -> TemplateContext {
    [
        ("experiment_name", names.experiment_name.clone()),
        ("project_id", names.project_id.clone()),
        ("bucket_name", names.bucket_name.clone()),
        ("operator_name", operator_name.to_owned()),
        ("image", names.pod_operator_image(operator_name)),
        ("task_id", names.pod_operator_task_id(operator_name)),
        ("pod_name", names.pod_name(operator_name)),
    ]
    .into_iter()
    .map(|(key, value)| (key.to_owned(), value))
    .collect()
}
