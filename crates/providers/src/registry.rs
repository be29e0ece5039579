//! Provider registry.
//!
//! Builds a [`ProviderRotation`] from a [`ProvidersConfig`] plus a set
//! of caller-supplied `LlmProvider` instances keyed by `kind`. This
//! crate does not prescribe a wire protocol, so unlike a production
//! gateway it never constructs HTTP clients itself — the caller (the
//! demo binary, or a test) hands in already-built providers (a real
//! adapter, or a [`crate::testing::ScriptedProvider`] double).

use std::collections::HashMap;
use std::sync::Arc;

use tl_domain::config::ProvidersConfig;
use tl_domain::error::{Error, Result};

use crate::rotation::{ProviderProfile, ProviderRotation};
use crate::traits::LlmProvider;

/// Records a profile that could not be matched to a supplied provider.
#[derive(Debug, Clone)]
pub struct ProviderInitError {
    pub profile_name: String,
    pub kind: String,
    pub error: String,
}

/// Mask substrings that look like API keys or bearer tokens in an
/// error message, so raw secrets never leak into logs or dashboards.
pub fn mask_secrets(msg: &str) -> String {
    let mut result = msg.to_string();
    for word in msg.split(|c: char| c.is_whitespace() || c == '\'' || c == '"' || c == ',') {
        let trimmed = word.trim();
        if trimmed.len() >= 20
            && trimmed
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            let masked = if trimmed.len() > 8 {
                format!("{}...{}", &trimmed[..4], &trimmed[trimmed.len() - 4..])
            } else {
                "***masked***".to_string()
            };
            result = result.replace(trimmed, &masked);
        }
    }
    result
}

pub struct ProviderRegistry {
    rotation: ProviderRotation,
    init_errors: Vec<ProviderInitError>,
}

impl ProviderRegistry {
    /// Build the registry, matching each configured profile to a
    /// provider instance in `providers_by_kind`. Profiles whose `kind`
    /// has no matching entry are skipped and recorded in
    /// [`Self::init_errors`] rather than aborting construction.
    pub fn build(
        config: &ProvidersConfig,
        providers_by_kind: &HashMap<String, Arc<dyn LlmProvider>>,
    ) -> Result<Self> {
        let mut profiles = Vec::new();
        let mut init_errors = Vec::new();

        for pc in &config.profiles {
            match providers_by_kind.get(&pc.kind) {
                Some(provider) => {
                    tracing::info!(profile = %pc.name, kind = %pc.kind, "registered provider profile");
                    profiles.push(ProviderProfile {
                        name: pc.name.clone(),
                        priority: pc.priority,
                        circuit: ProviderRotation::breaker_for(&config.circuit, &pc.name),
                        provider: provider.clone(),
                    });
                }
                None => {
                    let error = mask_secrets(&format!("no provider registered for kind \"{}\"", pc.kind));
                    tracing::warn!(profile = %pc.name, kind = %pc.kind, %error, "skipping provider profile");
                    init_errors.push(ProviderInitError {
                        profile_name: pc.name.clone(),
                        kind: pc.kind.clone(),
                        error,
                    });
                }
            }
        }

        if profiles.is_empty() && !config.profiles.is_empty() {
            return Err(Error::Config(
                "all configured provider profiles failed to resolve to a provider instance".into(),
            ));
        }

        Ok(Self {
            rotation: ProviderRotation::new(profiles),
            init_errors,
        })
    }

    pub fn rotation(&self) -> &ProviderRotation {
        &self.rotation
    }

    /// Consume the registry and hand back just the rotation it built,
    /// for callers that only needed `build`'s config-to-profile
    /// resolution and don't care about `init_errors` afterward.
    pub fn into_rotation(self) -> ProviderRotation {
        self.rotation
    }

    pub fn init_errors(&self) -> &[ProviderInitError] {
        &self.init_errors
    }
}
