use serde::{Deserialize, Serialize};

/// A secret credential scoped to a project, used by backup producers to upload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccessKey {
    pub id: i64,
    pub label: String,
    pub key: String,
}

#[derive(Debug, Serialize)]
pub(super) struct AccessKeyCreateParams<'a> {
    pub label: &'a str,
}
