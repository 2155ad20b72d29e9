use serde_json::Value;
use tracing::debug;

use super::{
    presentation::payload,
    results::{CheckResult, Status},
    EvaluationContext, EvaluationStage, StageError,
};
use crate::core::{
    input_descriptor::Optionality, presentation_definition::PresentationDefinition,
};

pub const VERIFIED: &str = "subject_is_issuer verified.";
pub const NOT_VERIFIED: &str = "couldn't verify subject is issuer.";
pub const NOT_FOUND: &str =
    "couldn't find the verifiableCredential corresponding to VC in final verifiablePresentation.";

/// Checks `subject_is_issuer: required` descriptors: the issuer of each
/// submitted credential must be its subject.
#[derive(Debug, Default, Clone, Copy)]
pub struct SubjectIsIssuerEvaluation;

/// `issuer` is either the issuer's URI or an object carrying it as `id`.
pub(crate) fn issuer_id(credential: &Value) -> Option<&str> {
    match credential.get("issuer")? {
        Value::String(id) => Some(id.as_str()),
        issuer => issuer.get("id")?.as_str(),
    }
}

pub(crate) fn subject_id(credential: &Value) -> Option<&str> {
    credential.get("credentialSubject")?.get("id")?.as_str()
}

impl EvaluationStage for SubjectIsIssuerEvaluation {
    fn name(&self) -> &'static str {
        "SubjectIsIssuerEvaluation"
    }

    fn handle(
        &self,
        definition: &PresentationDefinition,
        ctx: &mut EvaluationContext<'_>,
    ) -> Result<(), StageError> {
        for (descriptor_path, descriptor) in definition.indexed_descriptors() {
            if descriptor.constraints().subject_is_issuer() != Some(Optionality::Required) {
                continue;
            }
            let Some(submission) = ctx.presentation.submission() else {
                return Err(StageError::SubmissionNotOpen);
            };

            for mapped in submission.paths_for(descriptor.id()) {
                let credential = ctx
                    .resolver
                    .resolve(ctx.presentation.document(), std::slice::from_ref(&mapped))?
                    .into_iter()
                    .next()
                    .ok_or_else(|| StageError::UnresolvedSubmissionPath(mapped.clone()))?
                    .value;

                let credential_id = credential.get("id").filter(|id| !id.is_null());
                let position = credential_id.and_then(|id| {
                    ctx.presentation
                        .credentials()
                        .iter()
                        .position(|c| c.get("id") == Some(id))
                });

                let Some(position) = position else {
                    ctx.results.push(
                        CheckResult::new(
                            self.name(),
                            descriptor_path.as_str(),
                            None,
                            Status::Error,
                            NOT_FOUND,
                        )
                        .with_payload(payload([
                            ("id", credential_id.cloned().unwrap_or(Value::Null)),
                            ("path", Value::from(mapped)),
                        ])),
                    );
                    continue;
                };

                let verified = matches!(
                    (issuer_id(&credential), subject_id(&credential)),
                    (Some(issuer), Some(subject)) if issuer == subject
                );
                debug!(
                    descriptor = descriptor.id(),
                    credential = %mapped,
                    verified,
                    "subject_is_issuer checked"
                );

                let (status, message) = if verified {
                    (Status::Info, VERIFIED)
                } else {
                    (Status::Error, NOT_VERIFIED)
                };
                ctx.results.push(CheckResult::new(
                    self.name(),
                    descriptor_path.as_str(),
                    Some(ctx.presentation.credential_path(position)),
                    status,
                    message,
                ));
            }
        }
        Ok(())
    }
}
