use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};
use walkdir::WalkDir;

pub const EXPERIMENT_FILE_NAME: &str = "fuga.yml";
pub const MAX_SEARCH_DEPTH: usize = 4;

/// Directories of an experiment that are uploaded to the Composer DAG folder.
pub const DEPLOYED_DIRECTORIES: [&str; 3] = ["py", "sql", "pod_operators"];
pub const POD_OPERATORS_DIRECTORY: &str = "pod_operators";

static IGNORED_PATHS: Lazy<Vec<Regex>> =
    Lazy::new(|| vec![Regex::new(r".*/\.git/.*").expect("Ignore pattern is valid")]);

#[derive(Debug, Clone, Deserialize)]
struct ExperimentFile {
    experiment_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Experiment {
    pub name: String,
    pub root: PathBuf,
}

/// A local file and the object name it is uploaded to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub local_path: PathBuf,
    pub object_name: String,
}

impl Experiment {
    pub fn from_path(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let path = root.join(EXPERIMENT_FILE_NAME);
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Could not read `{}`", path.display()))?;
        let file: ExperimentFile = serde_yaml::from_str(&content)
            .with_context(|| format!("Invalid experiment file `{}`", path.display()))?;
        Ok(Self {
            name: file.experiment_name,
            root: root.to_owned(),
        })
    }

    /// The experiment containing `start`.
    pub fn discover(start: impl AsRef<Path>) -> Result<Self> {
        Self::from_path(find_experiment_root(start, MAX_SEARCH_DEPTH)?)
    }

    pub fn dag_file(&self) -> PathBuf {
        self.root.join(format!("{}.py", self.name))
    }

    pub fn pod_operators_dir(&self) -> PathBuf {
        self.root.join(POD_OPERATORS_DIRECTORY)
    }

    /// Names of the pod operators found in the experiment, sorted.
    pub fn pod_operators(&self) -> Result<Vec<String>> {
        let dir = self.pod_operators_dir();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&dir)
            .with_context(|| format!("Could not list `{}`", dir.display()))?
        {
            let entry = entry.with_context(|| format!("Could not list `{}`", dir.display()))?;
            if entry.path().is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Map the experiment's deployable files to object names under `prefix`.
    pub fn plan_uploads(&self, prefix: &str) -> Result<Vec<Upload>> {
        let mut uploads = Vec::new();
        let dag_file = self.dag_file();
        if dag_file.is_file() {
            uploads.push(self.upload(prefix, dag_file)?);
        }

        for directory in DEPLOYED_DIRECTORIES {
            let directory = self.root.join(directory);
            if !directory.is_dir() {
                continue;
            }
            for entry in WalkDir::new(&directory).sort_by_file_name() {
                let entry = entry
                    .with_context(|| format!("Could not walk `{}`", directory.display()))?;
                if !entry.file_type().is_file() || is_ignored(entry.path()) {
                    continue;
                }
                uploads.push(self.upload(prefix, entry.into_path())?);
            }
        }
        Ok(uploads)
    }

    fn upload(&self, prefix: &str, local_path: PathBuf) -> Result<Upload> {
        let relative = local_path.strip_prefix(&self.root).with_context(|| {
            format!(
                "`{}` is outside of the experiment directory",
                local_path.display()
            )
        })?;
        let relative: Vec<String> = relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy().into_owned())
            .collect();

        let mut object_name = prefix.trim_matches('/').to_owned();
        for segment in std::iter::once(&self.name).chain(relative.iter()) {
            if !object_name.is_empty() {
                object_name.push('/');
            }
            object_name.push_str(segment);
        }
        Ok(Upload {
            local_path,
            object_name,
        })
    }
}

fn is_ignored(path: &Path) -> bool {
    let path = path.to_string_lossy();
    IGNORED_PATHS.iter().any(|pattern| pattern.is_match(&path))
}

/// Nearest directory, starting at `start` and going up at most `max_depth` parents, that
/// contains `fuga.yml`.
pub fn find_experiment_root(start: impl AsRef<Path>, max_depth: usize) -> Result<PathBuf> {
    let start = start.as_ref();
    start
        .ancestors()
        .take(max_depth + 1)
        .find(|directory| directory.join(EXPERIMENT_FILE_NAME).is_file())
        .map(Path::to_path_buf)
        .ok_or_else(|| {
            anyhow!(
                "`{}` is not inside a fuga experiment: could not find `{}` in it or its {} closest ancestors",
                start.display(),
                EXPERIMENT_FILE_NAME,
                max_depth
            )
        })
}
