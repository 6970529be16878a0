use anyhow::{Context, Result};
use colored::Colorize;
use fuga_client::{Bucket, BucketName, Environment, EnvironmentPath, Project, ProjectId};
use log::info;

use crate::{
    cloud::{BucketCollection, CloudApi, EnvironmentCollection, ProjectCollection},
    config::{FugaConfig, BUCKET_NAME, ENVIRONMENT_PATH, PROJECT_ID},
    prompt::PromptProvider,
    selector::{ResourceCollection, ResourceSelector, Selectable},
};

/// Resolve one configuration key: look the configured resource up directly, or let the
/// user select one from `collection` and persist its id immediately.
pub fn resolve_stage<C, L>(
    config: &mut FugaConfig,
    key: &str,
    lookup: L,
    collection: &C,
    prompt: &mut dyn PromptProvider,
) -> Result<C::Item>
where
    C: ResourceCollection,
    L: FnOnce(&str) -> Result<C::Item>,
{
    if let Some(configured) = config.get(key) {
        let configured = configured.to_owned();
        info!("Using {} `{}` from configuration.", collection.name(), configured);
        return lookup(&configured);
    }

    let resource = ResourceSelector::new(prompt).select(collection)?;
    config.set(key, resource.id()).with_context(|| {
        format!("Could not save `{key}` to `{}`", config.path().display())
    })?;
    info!(
        "Selected {} {}, saved as `{}`.",
        collection.name(),
        resource.display_name().bold(),
        key
    );
    Ok(resource)
}

#[derive(Debug, Clone)]
pub struct BootstrappedEnvironment {
    pub project: Project,
    pub bucket: Bucket,
    pub environment: Environment,
}

/// Walks project, bucket and Composer environment selection in order.
pub struct EnvironmentBootstrapper<'a> {
    pub api: &'a dyn CloudApi,
    pub config: &'a mut FugaConfig,
    pub prompt: &'a mut dyn PromptProvider,
}

impl EnvironmentBootstrapper<'_> {
    pub fn run(self) -> Result<BootstrappedEnvironment> {
        let api = self.api;

        let project = resolve_stage(
            self.config,
            PROJECT_ID,
            |id| api.get_project(&ProjectId(id.to_owned())),
            &ProjectCollection { api },
            self.prompt,
        )?;

        let bucket = resolve_stage(
            self.config,
            BUCKET_NAME,
            |name| api.get_bucket(&BucketName(name.to_owned())),
            &BucketCollection {
                api,
                project_id: &project.project_id,
            },
            self.prompt,
        )?;

        let environment = resolve_stage(
            self.config,
            ENVIRONMENT_PATH,
            |path| {
                let path: EnvironmentPath = path.parse().with_context(|| {
                    format!("Invalid `{ENVIRONMENT_PATH}` in configuration")
                })?;
                api.get_environment(&path)
            },
            &EnvironmentCollection {
                api,
                project_id: &project.project_id,
                location: bucket.location.to_lowercase(),
            },
            self.prompt,
        )?;

        info!("fuga environment is initialized. Now you can proceed to create experiments by running `fuga experiment new`");
        Ok(BootstrappedEnvironment {
            project,
            bucket,
            environment,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cloud::testing::{bucket, environment, project, Call, FakeCloud},
        config::read_fuga_config,
        errors::find_credential_error,
        prompt::testing::ScriptedPrompt,
    };
    use fuga_client::EnvironmentState;
    use pretty_assertions::assert_eq;
    use std::{cell::RefCell, fs};
    use tempfile::TempDir;

    const ENVIRONMENT: &str = "projects/lab-two/locations/asia-northeast1/environments/composer";

    fn three_projects() -> FakeCloud {
        FakeCloud {
            projects: vec![
                project("lab-one", "Lab One"),
                project("lab-two", "Lab Two"),
                project("lab-three", "Lab Three"),
            ],
            environments: vec![
                environment(
                    "projects/lab-two/locations/us-east1/environments/other",
                    EnvironmentState::Running,
                    None,
                ),
                environment(ENVIRONMENT, EnvironmentState::Running, None),
            ],
            ..Default::default()
        }
    }

    fn empty_config(dir: &TempDir) -> FugaConfig {
        FugaConfig::load(dir.path().join("config.yml"), Vec::new()).unwrap()
    }

    #[test]
    fn test_full_selection() {
        let dir = TempDir::new().unwrap();
        let mut config = empty_config(&dir);
        let cloud = three_projects();
        // project 2; create a bucket in asia-northeast1 (location 16); environment 1
        let mut prompt = ScriptedPrompt::with_choices([2, 0, 16, 1]).then_texts(["fuga-data"]);

        let bootstrapped = EnvironmentBootstrapper {
            api: &cloud,
            config: &mut config,
            prompt: &mut prompt,
        }
        .run()
        .unwrap();

        assert_eq!(bootstrapped.project.project_id.0, "lab-two");
        assert_eq!(bootstrapped.bucket.location, "ASIA-NORTHEAST1");
        assert_eq!(bootstrapped.environment.name.0, ENVIRONMENT);
        assert_eq!(
            cloud.calls(),
            vec![
                Call::ListProjects,
                Call::ListBuckets("lab-two".to_owned()),
                Call::CreateBucket(
                    "lab-two".to_owned(),
                    "fuga-data".to_owned(),
                    "asia-northeast1".to_owned()
                ),
                Call::ListEnvironments("lab-two".to_owned(), "asia-northeast1".to_owned()),
            ]
        );

        // The project menu offers creation plus the three projects, the environment menu
        // cannot create.
        assert_eq!(prompt.menus[0].entries.len(), 4);
        assert_eq!(prompt.menus[3].entries.len(), 1);
        assert!(prompt.menus[3].notice.is_some());

        let persisted = read_fuga_config(dir.path().join("config.yml")).unwrap();
        assert_eq!(persisted.len(), 3);
        assert_eq!(persisted[PROJECT_ID], "lab-two");
        assert_eq!(persisted[BUCKET_NAME], "fuga-data");
        assert_eq!(persisted[ENVIRONMENT_PATH], ENVIRONMENT);
    }

    #[test]
    fn test_configured_stages_are_not_listed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yml");
        let original = "# picked by hand\nproject_id: lab-two\nbucket_name: 'fuga-data'\n";
        fs::write(&path, original).unwrap();
        let mut config = FugaConfig::load(&path, Vec::new()).unwrap();

        let cloud = FakeCloud {
            buckets: RefCell::new(vec![bucket("fuga-data", "ASIA-NORTHEAST1")]),
            ..three_projects()
        };
        let mut prompt = ScriptedPrompt::with_choices([1]);

        EnvironmentBootstrapper {
            api: &cloud,
            config: &mut config,
            prompt: &mut prompt,
        }
        .run()
        .unwrap();

        assert_eq!(
            cloud.calls(),
            vec![
                Call::GetProject("lab-two".to_owned()),
                Call::GetBucket("fuga-data".to_owned()),
                Call::ListEnvironments("lab-two".to_owned(), "asia-northeast1".to_owned()),
            ]
        );
        assert_eq!(prompt.menus.len(), 1);

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            format!("{original}environment_path: {ENVIRONMENT}\n")
        );
    }

    #[test]
    fn test_fully_configured_leaves_file_untouched() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yml");
        let original = format!(
            "project_id:   lab-two   # comment\nbucket_name: fuga-data\nenvironment_path: {ENVIRONMENT}\n"
        );
        fs::write(&path, &original).unwrap();
        let mut config = FugaConfig::load(&path, Vec::new()).unwrap();
        let cloud = FakeCloud {
            buckets: RefCell::new(vec![bucket("fuga-data", "ASIA-NORTHEAST1")]),
            ..three_projects()
        };
        let mut prompt = ScriptedPrompt::default();

        EnvironmentBootstrapper {
            api: &cloud,
            config: &mut config,
            prompt: &mut prompt,
        }
        .run()
        .unwrap();

        assert!(prompt.menus.is_empty());
        assert_eq!(fs::read_to_string(&path).unwrap(), original);
    }

    #[test]
    fn test_overrides_are_not_persisted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yml");
        let mut config = FugaConfig::load(
            &path,
            vec![("FUGA_PROJECT_ID".to_owned(), "lab-two".to_owned())],
        )
        .unwrap();
        let cloud = FakeCloud {
            buckets: RefCell::new(vec![bucket("fuga-data", "ASIA-NORTHEAST1")]),
            ..three_projects()
        };
        let mut prompt = ScriptedPrompt::with_choices([1, 1]);

        EnvironmentBootstrapper {
            api: &cloud,
            config: &mut config,
            prompt: &mut prompt,
        }
        .run()
        .unwrap();

        let persisted = read_fuga_config(&path).unwrap();
        assert_eq!(persisted.get(PROJECT_ID), None);
        assert_eq!(persisted[BUCKET_NAME], "fuga-data");
        assert_eq!(persisted[ENVIRONMENT_PATH], ENVIRONMENT);
    }

    #[test]
    fn test_credential_error_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let mut config = empty_config(&dir);
        let cloud = FakeCloud {
            deny_credentials: true,
            ..three_projects()
        };
        let mut prompt = ScriptedPrompt::default();

        let error = EnvironmentBootstrapper {
            api: &cloud,
            config: &mut config,
            prompt: &mut prompt,
        }
        .run()
        .unwrap_err();

        assert!(find_credential_error(&error).is_some());
        assert_eq!(cloud.calls(), vec![Call::ListProjects]);
        assert!(!dir.path().join("config.yml").exists());
    }

    #[test]
    fn test_failure_keeps_earlier_stages() {
        let dir = TempDir::new().unwrap();
        let mut config = empty_config(&dir);
        // lab-one has no environments in any location.
        let cloud = FakeCloud {
            buckets: RefCell::new(vec![bucket("fuga-data", "US-EAST1")]),
            ..three_projects()
        };
        let mut prompt = ScriptedPrompt::with_choices([1, 1]);

        let error = EnvironmentBootstrapper {
            api: &cloud,
            config: &mut config,
            prompt: &mut prompt,
        }
        .run()
        .unwrap_err();

        assert!(error.to_string().starts_with("No Cloud Composer environment is available."));
        let persisted = read_fuga_config(dir.path().join("config.yml")).unwrap();
        assert_eq!(persisted[PROJECT_ID], "lab-one");
        assert_eq!(persisted[BUCKET_NAME], "fuga-data");
        assert_eq!(persisted.get(ENVIRONMENT_PATH), None);
    }
}
