use serde::Deserialize;

use crate::core::credential_format::ClaimFormatDesignation;

/// Options of an evaluation run.
///
/// Missing keys fall back to the defaults, so an empty object is a valid config.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Name of the top-level property holding the verifiable credentials.
    pub credential_collection: String,
    /// Format written into every descriptor map entry.
    pub descriptor_format: ClaimFormatDesignation,
    /// Top-level keys kept by limit disclosure on top of `id`,
    /// `credentialSubject` and `type`.
    pub mandatory_fields: Vec<String>,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            credential_collection: "verifiableCredential".into(),
            descriptor_format: ClaimFormatDesignation::LdpVc,
            mandatory_fields: vec!["@context".into(), "credentialSchema".into()],
        }
    }
}
