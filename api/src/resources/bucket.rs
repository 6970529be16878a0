use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub struct BucketName(pub String);

impl Display for BucketName {
    fn fmt(&self, formatter: &mut Formatter) -> FmtResult {
        write!(formatter, "{}", self.0)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    pub id: String,
    pub name: BucketName,
    /// Upper case location code, e.g. `ASIA-NORTHEAST1` or `US`.
    pub location: String,
    #[serde(default)]
    pub storage_class: Option<String>,
    #[serde(default)]
    pub project_number: Option<String>,
    #[serde(default)]
    pub time_created: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ListBucketsResponse {
    #[serde(default)]
    pub items: Vec<Bucket>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NewBucket<'request> {
    pub name: &'request BucketName,
    pub location: &'request str,
}

/// A `gs://<bucket>/<prefix>` location, as found in a Composer `dagGcsPrefix`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageUri {
    pub bucket: BucketName,
    pub prefix: String,
}

impl StorageUri {
    pub fn parse(uri: &str) -> Result<Self> {
        let bad_uri = || Error::BadStorageUri {
            uri: uri.to_owned(),
        };
        let rest = uri.strip_prefix("gs://").ok_or_else(bad_uri)?;
        let (bucket, prefix) = rest.split_once('/').unwrap_or((rest, ""));
        if bucket.is_empty() {
            return Err(bad_uri());
        }
        Ok(Self {
            bucket: BucketName(bucket.to_owned()),
            prefix: prefix.trim_end_matches('/').to_owned(),
        })
    }

    /// Object name for `relative_path` below this location.
    pub fn object_name(&self, relative_path: &str) -> String {
        if self.prefix.is_empty() {
            relative_path.to_owned()
        } else {
            format!("{}/{}", self.prefix, relative_path)
        }
    }
}
