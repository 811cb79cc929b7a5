//! Code signing credentials for `xcodebuild`.
//!
//! The build treats signing as an opaque step: a [`CodesignProvider`]
//! prepares whatever assets it needs and hands back optional
//! [`AuthParams`], which are passed to xcodebuild untouched.

use std::path::PathBuf;

use tracing::info;

use crate::types::BuildError;

/// App Store Connect API key authentication passed to xcodebuild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthParams {
    pub key_id: String,
    pub issuer_id: String,
    pub key_path: PathBuf,
}

impl AuthParams {
    /// Command line arguments enabling automatic provisioning with this key.
    pub fn args(&self) -> Vec<String> {
        vec![
            "-allowProvisioningUpdates".to_string(),
            "-authenticationKeyPath".to_string(),
            self.key_path.display().to_string(),
            "-authenticationKeyID".to_string(),
            self.key_id.clone(),
            "-authenticationKeyIssuerID".to_string(),
            self.issuer_id.clone(),
        ]
    }
}

/// Prepares code signing and returns the credentials xcodebuild needs, if any.
pub trait CodesignProvider {
    fn prepare_signing(&self) -> Result<Option<AuthParams>, BuildError>;
}

/// Automatic code signing turned off; the project's own settings apply.
#[derive(Debug, Clone, Copy, Default)]
pub struct SigningDisabled;

impl CodesignProvider for SigningDisabled {
    fn prepare_signing(&self) -> Result<Option<AuthParams>, BuildError> {
        info!("Automatic code signing is disabled, skipped downloading code sign assets");
        Ok(None)
    }
}

/// Signing with an App Store Connect API key stored on disk.
#[derive(Debug, Clone)]
pub struct ApiKeySigning {
    pub key_id: String,
    pub issuer_id: String,
    pub key_path: PathBuf,
}

impl CodesignProvider for ApiKeySigning {
    fn prepare_signing(&self) -> Result<Option<AuthParams>, BuildError> {
        info!("Preparing code signing with App Store Connect API key {}", self.key_id);

        if self.key_id.trim().is_empty() || self.issuer_id.trim().is_empty() {
            return Err(BuildError::Signing(
                "API key ID and issuer ID are both required for API key signing".to_string(),
            ));
        }
        if !self.key_path.is_file() {
            return Err(BuildError::Signing(format!(
                "API key file not found at {:?}.\n\n\
                 Download the .p8 key from App Store Connect and point api_key_path at it.",
                self.key_path
            )));
        }

        Ok(Some(AuthParams {
            key_id: self.key_id.clone(),
            issuer_id: self.issuer_id.clone(),
            key_path: self.key_path.clone(),
        }))
    }
}
