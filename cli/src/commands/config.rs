use anyhow::{anyhow, Context, Result};
use log::{info, warn};
use structopt::StructOpt;

use crate::{
    config::{override_variable, ConfigEntry, FugaConfig, ValueSource, ACCESS_TOKEN},
    printer::Printer,
};

#[derive(Debug, StructOpt)]
pub enum ConfigArgs {
    #[structopt(name = "ls")]
    /// List configured values and where they come from
    List {
        #[structopt(long = "tokens")]
        /// Show access tokens (by default tokens are hidden).
        tokens: bool,
    },

    #[structopt(name = "get")]
    /// Print the value of a configuration key
    Get {
        /// The configuration key, e.g. `project_id`
        key: String,
    },

    #[structopt(name = "set")]
    /// Set a configuration key in the fuga config file
    Set {
        /// The configuration key, e.g. `bucket_name`
        key: String,

        /// The new value
        value: String,
    },
}

pub fn run(args: &ConfigArgs, config: &mut FugaConfig, printer: &Printer) -> Result<()> {
    match args {
        ConfigArgs::List { tokens } => {
            let entries = list_entries(config, *tokens);
            if entries.is_empty() {
                info!(
                    "Nothing is configured in `{}`. Run `fuga environment init` to get started.",
                    config.path().display()
                );
            } else {
                printer.print_resources(&entries)?;
            }
        }
        ConfigArgs::Get { key } => {
            let value = config.get(key).ok_or_else(|| {
                anyhow!(
                    "`{}` is not set in `{}` nor in `{}`",
                    key,
                    config.path().display(),
                    override_variable(key)
                )
            })?;
            println!("{value}");
        }
        ConfigArgs::Set { key, value } => {
            config.set(key, value.as_str()).with_context(|| {
                format!("Could not save `{key}` to `{}`", config.path().display())
            })?;
            info!("Saved `{}` to `{}`.", key, config.path().display());
            if config.source(key) == Some(ValueSource::Env) {
                warn!(
                    "`{}` is set in the environment, which takes precedence over the saved value.",
                    override_variable(key)
                );
            }
        }
    }
    Ok(())
}

fn list_entries(config: &FugaConfig, tokens: bool) -> Vec<ConfigEntry> {
    config
        .entries()
        .into_iter()
        .map(|mut entry| {
            if entry.key == ACCESS_TOKEN && !tokens {
                entry.value = "<Hidden>".to_owned();
            }
            entry
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::read_fuga_config;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn config_with(dir: &TempDir, variables: &[(&str, &str)]) -> FugaConfig {
        FugaConfig::load(
            dir.path().join("config.yml"),
            variables
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string())),
        )
        .unwrap()
    }

    #[test]
    fn test_set_persists_value() {
        let dir = TempDir::new().unwrap();
        let mut config = config_with(&dir, &[]);
        run(
            &ConfigArgs::Set {
                key: "bucket_name".to_owned(),
                value: "fuga-data".to_owned(),
            },
            &mut config,
            &Printer::default(),
        )
        .unwrap();

        let saved = read_fuga_config(dir.path().join("config.yml")).unwrap();
        assert_eq!(saved.get("bucket_name").map(String::as_str), Some("fuga-data"));
    }

    #[test]
    fn test_get_missing_key() {
        let dir = TempDir::new().unwrap();
        let mut config = config_with(&dir, &[]);
        let error = run(
            &ConfigArgs::Get {
                key: "project_id".to_owned(),
            },
            &mut config,
            &Printer::default(),
        )
        .unwrap_err();
        assert!(error.to_string().contains("FUGA_PROJECT_ID"));
    }

    #[test]
    fn test_list_hides_tokens() {
        let dir = TempDir::new().unwrap();
        let mut config = config_with(&dir, &[("FUGA_PROJECT_ID", "repro-lab")]);
        config.set(ACCESS_TOKEN, "ya29.secret").unwrap();

        let hidden = list_entries(&config, false);
        assert_eq!(
            hidden,
            vec![
                ConfigEntry {
                    key: "access_token".to_owned(),
                    value: "<Hidden>".to_owned(),
                    source: ValueSource::File,
                },
                ConfigEntry {
                    key: "project_id".to_owned(),
                    value: "repro-lab".to_owned(),
                    source: ValueSource::Env,
                },
            ]
        );

        let shown = list_entries(&config, true);
        assert_eq!(shown[0].value, "ya29.secret");
    }
}
