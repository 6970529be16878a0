use colored::Colorize;
use prettytable::{format, row, Row, Table};
use serde::Serialize;

use anyhow::{anyhow, Context, Error, Result};
use std::{
    io::{self, Write},
    str::FromStr,
};

use crate::{
    commands::environment::EnvironmentSummary,
    config::{ConfigEntry, ValueSource},
};

pub fn print_resources_as_json<Resource>(
    resources: impl IntoIterator<Item = Resource>,
    mut writer: impl Write,
) -> Result<()>
where
    Resource: Serialize,
{
    for resource in resources {
        serde_json::to_writer(&mut writer, &resource)
            .context("Could not serialise resource.")
            .and_then(|_| writeln!(writer).context("Failed to write JSON resource to writer."))?;
    }
    Ok(())
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    #[default]
    Table,
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(string: &str) -> Result<Self> {
        if string == "table" {
            Ok(OutputFormat::Table)
        } else if string == "json" {
            Ok(OutputFormat::Json)
        } else {
            Err(anyhow!("unknown output format: '{}'", string))
        }
    }
}

/// Represents a resource that is able to be displayed as a table.
///
/// The implementation must implement `to_table_headers` to return headers for the resource type,
/// and `to_table_row`, which should return a data row for the given resource instance.
pub trait DisplayTable {
    fn to_table_headers() -> Row;

    fn to_table_row(&self) -> Row;
}

impl DisplayTable for ConfigEntry {
    fn to_table_headers() -> Row {
        row![bFg => "Key", "Value", "Source"]
    }

    fn to_table_row(&self) -> Row {
        row![
            self.key,
            self.value,
            match self.source {
                ValueSource::File => "file".normal(),
                ValueSource::Env => "env".yellow(),
            }
        ]
    }
}

impl DisplayTable for EnvironmentSummary {
    fn to_table_headers() -> Row {
        row![bFg => "Project", "Bucket", "Location", "Environment", "State", "DAG folder"]
    }

    fn to_table_row(&self) -> Row {
        row![
            self.project_id,
            self.bucket_name,
            self.bucket_location,
            self.environment_name,
            self.state,
            match &self.dag_gcs_prefix {
                Some(prefix) => prefix.as_str().into(),
                None => "missing".dimmed(),
            }
        ]
    }
}

/// Helper trait to allow collection of resources to be converted into a table.
pub trait IntoTable {
    fn into_table(self) -> Table;
}

/// All iterators of resources can be converted into a table.
impl<'a, Iterable, Item: 'a> IntoTable for Iterable
where
    Iterable: IntoIterator<Item = &'a Item>,
    Item: DisplayTable,
{
    fn into_table(self) -> Table {
        let mut table = new_table();
        table.set_titles(Item::to_table_headers());
        for resource in self.into_iter() {
            table.add_row(resource.to_table_row());
        }
        table
    }
}

fn new_table() -> Table {
    let mut table = Table::new();
    let format = format::FormatBuilder::new()
        .column_separator(' ')
        .borders(' ')
        .separators(&[], format::LineSeparator::new('-', '+', '+', '+'))
        .padding(0, 1)
        .build();
    table.set_format(format);
    table
}

fn print_table<T: IntoTable>(resources: T) {
    let table = resources.into_table();
    table.printstd();
}

/// Print resources using the selected output format.
///
/// Resources passed to the printer must be able to be formatted using all supported
/// `OutputFormat`s.
#[derive(Default, Debug)]
pub struct Printer {
    output: OutputFormat,
}

impl Printer {
    pub fn new(output: OutputFormat) -> Self {
        Self { output }
    }

    pub fn print_resources<T, Resource>(&self, resources: T) -> Result<()>
    where
        T: IntoIterator<Item = Resource> + IntoTable,
        Resource: Serialize,
    {
        match self.output {
            OutputFormat::Table => print_table(resources),
            OutputFormat::Json => print_resources_as_json(resources, io::stdout().lock())?,
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_output_format() {
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("table".parse::<OutputFormat>().unwrap(), OutputFormat::Table);
        assert!("yaml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_config_entries_as_json() {
        let entries = vec![ConfigEntry {
            key: "project_id".to_owned(),
            value: "repro-lab".to_owned(),
            source: ValueSource::Env,
        }];
        let mut output = Vec::new();
        print_resources_as_json(&entries, &mut output).unwrap();
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "{\"key\":\"project_id\",\"value\":\"repro-lab\",\"source\":\"env\"}\n"
        );
    }

    #[test]
    fn test_config_entries_as_table() {
        let entries = vec![ConfigEntry {
            key: "bucket_name".to_owned(),
            value: "fuga-data".to_owned(),
            source: ValueSource::File,
        }];
        let table = entries.iter().into_table();
        assert_eq!(table.len(), 1);
    }
}
