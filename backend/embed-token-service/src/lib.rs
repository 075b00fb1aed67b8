//! Embed Token Service - issues short-lived Power BI embed tokens
//!
//! This service provides:
//! - Azure AD client-credentials authentication as a service principal
//! - Report metadata lookup in a Power BI workspace
//! - Optional row-level security identities per caller
//! - Embed token generation for the front-end

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod services;
pub mod telemetry;

pub use config::Config;
pub use error::{EmbedError, Result};
pub use models::{
    AccessToken, EmbedTokenResponse, EmbedTokenResult, Identity, ReportDescriptor, RlsIdentity,
    ServiceCredential, TokenRequest,
};
pub use services::{
    CredentialAcquirer, EmbedTokenService, IdentityScoper, PipelineStage, ReportResolver,
    TokenExchanger, UpstreamCall,
};
