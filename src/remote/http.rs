use super::traits::{DirectoryError, LogDirectory, LogFileDescriptor, RawChunk};
use crate::config::types::SourceConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

type Result<T> = std::result::Result<T, DirectoryError>;

/// HTTP client for a gateway exposing the managed database's log-file API as JSON.
#[derive(Debug)]
pub struct HttpLogDirectory {
    base_url: String,
    region: String,
    client: reqwest::Client,
}

impl HttpLogDirectory {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            base_url: config.endpoint.trim_end_matches('/').to_string(),
            region: config.region.clone(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get<T>(&self, path: &str, query: &[(&str, &str)]) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, path);
        let response = self.client.get(&url).query(query).send().await?;

        if !response.status().is_success() {
            return Err(DirectoryError::Remote {
                status: response.status().as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl LogDirectory for HttpLogDirectory {
    async fn list_log_files(
        &self,
        source_id: &str,
        since_ms: i64,
        max_records: usize,
    ) -> Result<Vec<LogFileDescriptor>> {
        let since = since_ms.to_string();
        let max = max_records.to_string();

        let response: DescribeLogFilesResponse = self
            .get(
                "log-files",
                &[
                    ("region", self.region.as_str()),
                    ("db_instance_identifier", source_id),
                    ("file_last_written", since.as_str()),
                    ("max_records", max.as_str()),
                ],
            )
            .await?;

        tracing::trace!(
            source_id = %source_id,
            since_ms = since_ms,
            files = response.log_files.len(),
            "Listed log files"
        );

        Ok(response.log_files)
    }

    async fn download_portion(
        &self,
        source_id: &str,
        file_name: &str,
        marker: &str,
    ) -> Result<RawChunk> {
        let response: DownloadPortionResponse = self
            .get(
                "log-file-portion",
                &[
                    ("region", self.region.as_str()),
                    ("db_instance_identifier", source_id),
                    ("log_file_name", file_name),
                    ("marker", marker),
                ],
            )
            .await?;

        Ok(RawChunk {
            data: response.log_file_data.unwrap_or_default(),
            // An absent or empty marker means "no progress"; resume where we were.
            next_marker: response
                .marker
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| marker.to_string()),
            has_more: response.additional_data_pending,
        })
    }
}

// ===== Response Types =====

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescribeLogFilesResponse {
    #[serde(rename = "DescribeDBLogFiles", default)]
    pub log_files: Vec<LogFileDescriptor>,
    #[serde(rename = "Marker", default)]
    pub marker: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadPortionResponse {
    #[serde(rename = "LogFileData", default)]
    pub log_file_data: Option<String>,
    #[serde(rename = "Marker", default)]
    pub marker: Option<String>,
    #[serde(rename = "AdditionalDataPending", default)]
    pub additional_data_pending: bool,
}
