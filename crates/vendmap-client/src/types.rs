//! Response bodies that have no counterpart in `vendmap-core`.

use serde::Deserialize;
use vendmap_core::Building;

#[derive(Debug, Clone, Deserialize)]
pub struct MapKey {
    pub key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BuildingSearch {
    pub suggestions: Vec<Building>,
    #[serde(rename = "match")]
    pub exact: Option<Building>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CurrentUser {
    pub id: Option<i64>,
    pub email: String,
    pub username: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Health {
    pub status: String,
    pub database: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Message {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorDetail {
    pub message: String,
}

/// An image to attach to a create request.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    /// Read an image from disk, keeping its file name for the server's
    /// extension check.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ClientError::Io`] if the file cannot be read.
    pub async fn from_path(path: &std::path::Path) -> Result<Self, crate::ClientError> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("image")
            .to_owned();
        Ok(Self { file_name, bytes })
    }
}
