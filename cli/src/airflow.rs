//! Identifiers of the Airflow objects generated for an experiment.
//!
//! Generated DAG files and `pod-operator deploy` must agree on these names, so they are
//! derived in one place.
use serde::Serialize;

/// Airflow macro for the execution date, rendered by Airflow rather than by fuga.
pub const DS_NODASH: &str = "{{ ds_nodash }}";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExperimentNames {
    pub experiment_name: String,
    pub project_id: String,
    pub bucket_name: String,
}

impl ExperimentNames {
    pub fn new(
        experiment_name: impl Into<String>,
        project_id: impl Into<String>,
        bucket_name: impl Into<String>,
    ) -> Self {
        Self {
            experiment_name: experiment_name.into(),
            project_id: project_id.into(),
            bucket_name: bucket_name.into(),
        }
    }

    pub fn dag_id(&self) -> String {
        format!("{}_dag", self.experiment_name)
    }

    pub fn dataset(&self) -> String {
        format!("{}_database", self.experiment_name)
    }

    pub fn create_dataset_task_id(&self) -> String {
        format!("{}.create_dataset", self.experiment_name)
    }

    pub fn bq_to_bq_task_id(&self, table: &str) -> String {
        format!("{}.{}.bq_to_bq", self.experiment_name, table)
    }

    /// Date-partitioned destination of a bq to bq transfer.
    pub fn destination_table(&self, table: &str) -> String {
        format!(
            "{}:{}.{}{}",
            self.project_id,
            self.dataset(),
            table,
            DS_NODASH
        )
    }

    pub fn export_task_id(&self, table: &str) -> String {
        format!("{}.{}.export", self.experiment_name, table)
    }

    pub fn export_source_table(&self, table: &str) -> String {
        format!(
            "{}.{}.{}{}",
            self.project_id,
            self.dataset(),
            table,
            DS_NODASH
        )
    }

    /// Object key (inside the experiment bucket) of an exported table.
    pub fn exported_table_key(&self, table: &str) -> String {
        format!(
            "{}/exported_tables/{}/{}/out.csv.gzip",
            self.experiment_name, table, DS_NODASH
        )
    }

    pub fn export_uri(&self, table: &str) -> String {
        format!("gs://{}/{}", self.bucket_name, self.exported_table_key(table))
    }

    /// Object key under which a step saves its output.
    pub fn output_key(&self, name: &str) -> String {
        format!("{}/output/{}/{}.csv", self.experiment_name, DS_NODASH, name)
    }

    pub fn pod_operator_image(&self, operator_name: &str) -> String {
        format!(
            "gcr.io/{}/{}_{}",
            self.project_id, self.experiment_name, operator_name
        )
    }

    /// Task ids may not contain `-`.
    pub fn pod_operator_task_id(&self, operator_name: &str) -> String {
        format!(
            "{}_{}",
            self.experiment_name.replace('-', "_"),
            operator_name.replace('-', "_")
        )
    }

    /// Kubernetes pod names may not contain `_`.
    pub fn pod_name(&self, operator_name: &str) -> String {
        format!(
            "{}--{}",
            self.experiment_name.replace('_', "-"),
            operator_name.replace('_', "-")
        )
    }
}
