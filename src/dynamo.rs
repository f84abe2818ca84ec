//! DynamoDB client construction for the event webhook.
//!
//! Builds an `aws_sdk_dynamodb::Client` from the static credentials, region,
//! optional named profile and optional endpoint override in [`AppConfig`].

use anyhow::Result;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::config::Credentials;
use tracing::info;

use crate::config::AppConfig;

const CREDENTIALS_PROVIDER_NAME: &str = "events-config";

/// Errors that can occur while building the DynamoDB client.
#[derive(Debug, thiserror::Error)]
pub enum DynamoError {
    #[error("AWS credentials are incomplete; both access key id and secret access key are required")]
    MissingCredentials,
    #[error("AWS region is not configured")]
    MissingRegion,
}

/// Initializes a DynamoDB client with the given configuration.
///
/// No request is sent; connectivity problems surface on first use.
///
/// # Examples
///
/// ```no_run
/// use event_webhook::{config::ConfigLoader, dynamo::init_client};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let config = ConfigLoader::new().load()?;
///     let client = init_client(&config).await?;
///     // Hand the client to a DynamoTableClient...
///     Ok(())
/// }
/// ```
pub async fn init_client(cfg: &AppConfig) -> Result<Client> {
    let (Some(access_key_id), Some(secret_access_key)) =
        (&cfg.aws_access_key_id, &cfg.aws_secret_access_key)
    else {
        return Err(DynamoError::MissingCredentials.into());
    };
    let region = cfg.aws_region.clone().ok_or(DynamoError::MissingRegion)?;

    let credentials = Credentials::new(
        access_key_id,
        secret_access_key,
        None,
        None,
        CREDENTIALS_PROVIDER_NAME,
    );

    let mut loader = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(region.clone()))
        .credentials_provider(credentials);
    if let Some(profile) = &cfg.aws_profile {
        loader = loader.profile_name(profile);
    }
    let sdk_config = loader.load().await;

    let mut builder = aws_sdk_dynamodb::config::Builder::from(&sdk_config);
    if let Some(endpoint) = &cfg.dynamo_endpoint {
        builder = builder.endpoint_url(endpoint);
    }

    info!(
        region = %region,
        endpoint = cfg.dynamo_endpoint.as_deref().unwrap_or("default"),
        "Configured DynamoDB client"
    );

    Ok(Client::from_conf(builder.build()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AppConfig {
        AppConfig {
            aws_access_key_id: Some("AKIDEXAMPLE".to_string()),
            aws_secret_access_key: Some("secret".to_string()),
            aws_region: Some("eu-west-1".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn missing_credentials_are_rejected() {
        let cfg = AppConfig {
            aws_secret_access_key: None,
            ..config()
        };

        let result = init_client(&cfg).await;
        assert!(matches!(
            result.unwrap_err().downcast::<DynamoError>(),
            Ok(DynamoError::MissingCredentials)
        ));
    }

    #[tokio::test]
    async fn missing_region_is_rejected() {
        let cfg = AppConfig {
            aws_region: None,
            ..config()
        };

        let result = init_client(&cfg).await;
        assert!(matches!(
            result.unwrap_err().downcast::<DynamoError>(),
            Ok(DynamoError::MissingRegion)
        ));
    }

    #[tokio::test]
    async fn uses_configured_region() {
        let cfg = AppConfig {
            dynamo_endpoint: Some("http://localhost:8000".to_string()),
            ..config()
        };

        let client = init_client(&cfg).await.expect("client builds");
        assert_eq!(
            client.config().region(),
            Some(&Region::new("eu-west-1"))
        );
    }
}
