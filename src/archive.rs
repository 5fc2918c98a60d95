//! Artifact archival to S3.
//!
//! The control plane reads templates from the object store, so before
//! any stack submission the resolved template and the resolved parameter
//! set are uploaded under a timestamped, versioned key path. A failure
//! here aborts the run before anything reaches the control plane; the
//! stack must never reference an artifact that was not stored.

use aws_sdk_s3::primitives::ByteStream;
use chrono::{DateTime, Utc};
use tracing::info;

use crate::error::{CloudError, Result};
use crate::params::ParameterSet;
use crate::template::{TemplateDescriptor, TemplateEncoding};

/// Receipt for one archived template/parameter pair.
#[derive(Debug, Clone)]
pub struct ArchiveReceipt {
    /// HTTPS URL of the archived template, handed to the control plane.
    pub template_url: String,
    /// Object key of the archived template.
    pub template_key: String,
    /// Object key of the archived parameter set.
    pub properties_key: String,
}

/// Uploads convergence artifacts to the archive bucket.
#[derive(Debug)]
pub struct Archiver {
    /// S3 client.
    client: aws_sdk_s3::Client,
    /// Archive bucket.
    bucket: String,
}

impl Archiver {
    /// Creates an archiver from a shared AWS configuration.
    #[must_use]
    pub fn new(config: &aws_config::SdkConfig, bucket: &str) -> Self {
        Self {
            client: aws_sdk_s3::Client::new(config),
            bucket: bucket.to_string(),
        }
    }

    /// Uploads the template and parameter set, returning the receipt.
    ///
    /// # Errors
    ///
    /// Returns an error if the template file no longer exists on disk or
    /// either upload fails.
    pub async fn archive(
        &self,
        stack_name: &str,
        version: &str,
        descriptor: &TemplateDescriptor,
        parameters: &ParameterSet,
    ) -> Result<ArchiveReceipt> {
        let (template_key, properties_key) =
            craft_keys(stack_name, version, descriptor.encoding, Utc::now());

        if !descriptor.path.is_file() {
            return Err(CloudError::archive(format!(
                "{} is not actually a file",
                descriptor.path.display()
            ))
            .into());
        }

        let properties = serde_json::to_string_pretty(parameters)
            .map_err(|e| CloudError::archive(format!("cannot serialize parameters: {e}")))?;

        info!(
            "copying parameters to s3://{}/{properties_key}",
            self.bucket
        );
        self.put_object(&properties_key, properties.into_bytes().into())
            .await?;

        info!(
            "copying {} to s3://{}/{template_key}",
            descriptor.path.display(),
            self.bucket
        );
        let body = ByteStream::from_path(&descriptor.path).await.map_err(|e| {
            CloudError::archive(format!(
                "cannot read {}: {e}",
                descriptor.path.display()
            ))
        })?;
        self.put_object(&template_key, body).await?;

        let template_url = format!(
            "https://s3.amazonaws.com/{}/{template_key}",
            self.bucket
        );
        info!("template url: {template_url}");

        Ok(ArchiveReceipt {
            template_url,
            template_key,
            properties_key,
        })
    }

    /// Puts one object into the archive bucket.
    async fn put_object(&self, key: &str, body: ByteStream) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|e| CloudError::archive(format!("S3 put error: {e}")))?;

        Ok(())
    }
}

/// Crafts the timestamped object keys for one archive run.
fn craft_keys(
    stack_name: &str,
    version: &str,
    encoding: TemplateEncoding,
    now: DateTime<Utc>,
) -> (String, String) {
    let stub = format!(
        "templates/{stack_name}/{version}/{}",
        now.format("%Y/%m/%d/%H:%M:%S")
    );

    let template_key = format!("{stub}/stack.{}", encoding.file_suffix());
    let properties_key = format!("{stub}/stack.properties");

    (template_key, properties_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_craft_keys_layout() {
        let now = Utc.with_ymd_and_hms(2024, 3, 7, 9, 5, 2).unwrap();
        let (template_key, properties_key) =
            craft_keys("web-tier", "1709", TemplateEncoding::Yaml, now);

        assert_eq!(
            template_key,
            "templates/web-tier/1709/2024/03/07/09:05:02/stack.yaml"
        );
        assert_eq!(
            properties_key,
            "templates/web-tier/1709/2024/03/07/09:05:02/stack.properties"
        );
    }

    #[test]
    fn test_craft_keys_json_suffix() {
        let now = Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 59).unwrap();
        let (template_key, _) = craft_keys("api", "v2", TemplateEncoding::Json, now);
        assert!(template_key.ends_with("/stack.json"));
    }
}
