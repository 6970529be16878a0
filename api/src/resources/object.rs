use serde::{Deserialize, Serialize};

use crate::resources::bucket::BucketName;

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Object {
    pub name: String,
    pub bucket: BucketName,
    // The JSON API encodes 64 bit integers as strings.
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct UploadQuery<'request> {
    #[serde(rename = "uploadType")]
    pub upload_type: &'static str,
    pub name: &'request str,
}
