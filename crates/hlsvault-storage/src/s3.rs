use crate::object::BucketConnector;
use crate::traits::{StorageError, StorageResult};
use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_config::retry::{RetryConfig, RetryMode};
use aws_config::BehaviorVersion;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use aws_sdk_s3::Client;
use object_store::aws::AmazonS3Builder;
use object_store::ObjectStore;
use std::sync::Arc;

/// Bucket connector for S3 and S3-compatible providers (MinIO etc.)
///
/// Buckets are provisioned with the AWS SDK; reads and writes go through
/// `object_store`. Credentials come from the standard AWS environment.
#[derive(Clone)]
pub struct S3Connector {
    client: Client,
    region: String,
    endpoint_url: Option<String>,
}

impl S3Connector {
    /// # Arguments
    /// * `region` - AWS region (or region identifier for S3-compatible providers)
    /// * `endpoint_url` - Optional custom endpoint, e.g. "http://localhost:9000" for MinIO
    pub async fn new(region: String, endpoint_url: Option<String>) -> StorageResult<Self> {
        let region_provider =
            RegionProviderChain::first_try(aws_config::Region::new(region.clone()));

        let retry_config = RetryConfig::standard()
            .with_max_attempts(5)
            .with_retry_mode(RetryMode::Adaptive);

        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(region_provider)
            .retry_config(retry_config.clone())
            .load()
            .await;

        let client = if let Some(ref endpoint) = endpoint_url {
            let mut s3_config_builder = aws_sdk_s3::Config::builder()
                .endpoint_url(endpoint)
                .region(config.region().cloned())
                .retry_config(retry_config)
                .behavior_version(BehaviorVersion::latest());
            if let Some(provider) = config.credentials_provider() {
                s3_config_builder = s3_config_builder.credentials_provider(provider);
            }
            // Path-style addressing is required by MinIO.
            s3_config_builder = s3_config_builder.force_path_style(true);
            Client::from_conf(s3_config_builder.build())
        } else {
            Client::new(&config)
        };

        Ok(S3Connector {
            client,
            region,
            endpoint_url,
        })
    }
}

#[async_trait]
impl BucketConnector for S3Connector {
    async fn provision(&self, bucket: &str) -> StorageResult<()> {
        let mut request = self.client.create_bucket().bucket(bucket);

        // us-east-1 and custom endpoints reject an explicit location constraint.
        if self.endpoint_url.is_none() && self.region != "us-east-1" {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }

        match request.send().await {
            Ok(_) => {
                tracing::info!(bucket = %bucket, "Created bucket");
                Ok(())
            }
            Err(err) => {
                let already_there = err
                    .as_service_error()
                    .map(|e| e.is_bucket_already_owned_by_you() || e.is_bucket_already_exists())
                    .unwrap_or(false);
                if already_there {
                    tracing::info!(bucket = %bucket, "Bucket already exists");
                    Ok(())
                } else {
                    tracing::error!(bucket = %bucket, error = ?err, "Failed to create bucket");
                    Err(StorageError::Unavailable(format!(
                        "Failed to create bucket {}: {}",
                        bucket, err
                    )))
                }
            }
        }
    }

    fn open(&self, bucket: &str) -> StorageResult<Arc<dyn ObjectStore>> {
        let mut builder = AmazonS3Builder::from_env()
            .with_region(self.region.clone())
            .with_bucket_name(bucket);

        if let Some(ref endpoint) = self.endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(allow_http)
                .with_virtual_hosted_style_request(false);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(Arc::new(store))
    }
}
