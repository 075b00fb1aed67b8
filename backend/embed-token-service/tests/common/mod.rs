#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, Utc};
use mockall::mock;
use secrecy::SecretString;
use std::sync::Arc;
use uuid::Uuid;

use embed_token_service::config::{Config, EmbedConfig, PowerBiConfig, ServerConfig};
use embed_token_service::{
    AccessToken, CredentialAcquirer, EmbedError, EmbedTokenResult, EmbedTokenService,
    ReportDescriptor, ReportResolver, ServiceCredential, TokenExchanger, TokenRequest,
};

pub const WORKSPACE_ID: &str = "f089354e-8366-4e18-aea3-4cb4a3a50b48";
pub const REPORT_ID: &str = "5b218778-e7a5-4d73-8187-f10824047715";
pub const DATASET_ID: &str = "cfafbeb1-8037-4d0c-896e-a46fb27ff229";
pub const EMBED_URL: &str =
    "https://app.powerbi.com/reportEmbed?reportId=5b218778-e7a5-4d73-8187-f10824047715";
pub const EMBED_TOKEN: &str = "H4sIAAAAAAAEACWWxQ7sCBJE";
pub const TENANT_ID: &str = "contoso.onmicrosoft.com";

mock! {
    pub Acquirer {}

    #[async_trait]
    impl CredentialAcquirer for Acquirer {
        async fn acquire(
            &self,
            credential: &ServiceCredential,
            scope: &str,
        ) -> Result<AccessToken, EmbedError>;
    }
}

mock! {
    pub Resolver {}

    #[async_trait]
    impl ReportResolver for Resolver {
        async fn resolve_report(
            &self,
            token: &AccessToken,
            workspace_id: &str,
            report_id: &str,
        ) -> Result<ReportDescriptor, EmbedError>;
    }
}

mock! {
    pub Exchanger {}

    #[async_trait]
    impl TokenExchanger for Exchanger {
        async fn generate_token(
            &self,
            token: &AccessToken,
            request: &TokenRequest,
        ) -> Result<EmbedTokenResult, EmbedError>;
    }
}

pub fn test_config() -> Config {
    Config {
        powerbi: PowerBiConfig {
            tenant_id: TENANT_ID.to_string(),
            client_id: "00000000-0000-0000-0000-0000000000aa".to_string(),
            client_secret: SecretString::from("client-secret-value"),
            workspace_id: WORKSPACE_ID.to_string(),
            report_id: REPORT_ID.to_string(),
            authority_host: "https://login.microsoftonline.com".to_string(),
            api_base_url: "https://api.powerbi.com".to_string(),
            scope: "https://analysis.windows.net/powerbi/api/.default".to_string(),
        },
        embed: EmbedConfig::default(),
        server: ServerConfig::default(),
    }
}

pub fn rls_config() -> Config {
    let mut config = test_config();
    config.embed.require_user_id = true;
    config
}

pub fn access_token() -> AccessToken {
    AccessToken::new("eyJ0eXAiOiJKV1QiLCJhbGciOi", Utc::now() + Duration::hours(1))
}

pub fn report_descriptor() -> ReportDescriptor {
    ReportDescriptor {
        report_id: Uuid::parse_str(REPORT_ID).unwrap(),
        dataset_id: DATASET_ID.to_string(),
        embed_url: EMBED_URL.to_string(),
        workspace_id: Uuid::parse_str(WORKSPACE_ID).unwrap(),
    }
}

pub fn embed_token() -> EmbedTokenResult {
    EmbedTokenResult {
        token: EMBED_TOKEN.to_string(),
        token_id: Some("49ae3742-54c0-4c29-af52-619ff93b5c80".to_string()),
        expiration: Some(Utc::now() + Duration::hours(1)),
    }
}

/// Acquirer that succeeds once per call.
pub fn ok_acquirer(times: usize) -> MockAcquirer {
    let mut acquirer = MockAcquirer::new();
    acquirer
        .expect_acquire()
        .times(times)
        .returning(|_, _| Ok(access_token()));
    acquirer
}

pub fn ok_resolver(times: usize) -> MockResolver {
    let mut resolver = MockResolver::new();
    resolver
        .expect_resolve_report()
        .times(times)
        .returning(|_, _, _| Ok(report_descriptor()));
    resolver
}

pub fn ok_exchanger(times: usize) -> MockExchanger {
    let mut exchanger = MockExchanger::new();
    exchanger
        .expect_generate_token()
        .times(times)
        .returning(|_, _| Ok(embed_token()));
    exchanger
}

pub fn service(
    config: &Config,
    acquirer: MockAcquirer,
    resolver: MockResolver,
    exchanger: MockExchanger,
) -> Arc<EmbedTokenService> {
    Arc::new(EmbedTokenService::new(
        config,
        Arc::new(acquirer),
        Arc::new(resolver),
        Arc::new(exchanger),
    ))
}
