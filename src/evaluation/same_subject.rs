use serde_json::Value;
use tracing::debug;

use super::{
    presentation::payload,
    results::{CheckResult, Status},
    subject_is_issuer::subject_id,
    EvaluationContext, EvaluationStage, StageError,
};
use crate::core::{
    input_descriptor::SameSubject, presentation_definition::PresentationDefinition,
};

pub const VERIFIED: &str = "same_subject verified.";
pub const NOT_VERIFIED: &str = "couldn't verify same subject.";
pub const FIELD_NOT_FOUND: &str = "couldn't find the field referenced by same_subject.";

/// Checks `same_subject` relational constraints: the credentials submitted
/// for the referenced fields must all be about the same `credentialSubject.id`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SameSubjectEvaluation;

impl SameSubjectEvaluation {
    /// Submitted paths of the credentials the constraint refers to, in
    /// submission order and without repeats. Unknown field ids are reported.
    fn referenced_paths(
        &self,
        definition: &PresentationDefinition,
        descriptor_path: &str,
        constraint: &SameSubject,
        ctx: &mut EvaluationContext<'_>,
    ) -> Result<Vec<String>, StageError> {
        let submission = ctx
            .presentation
            .submission()
            .ok_or(StageError::SubmissionNotOpen)?;

        let mut paths = Vec::new();
        let mut unknown = Vec::new();
        for field_id in constraint.field_id.iter() {
            let owners = definition.descriptors_with_field(field_id);
            if owners.is_empty() {
                unknown.push(field_id);
            }
            for owner in owners {
                for path in submission.paths_for(owner.id()) {
                    if !paths.contains(&path) {
                        paths.push(path);
                    }
                }
            }
        }

        for field_id in unknown {
            ctx.results.push(
                CheckResult::new(self.name(), descriptor_path, None, Status::Error, FIELD_NOT_FOUND)
                    .with_payload(payload([("field_id", Value::from(field_id.as_str()))])),
            );
        }
        Ok(paths)
    }
}

impl EvaluationStage for SameSubjectEvaluation {
    fn name(&self) -> &'static str {
        "SameSubjectEvaluation"
    }

    fn handle(
        &self,
        definition: &PresentationDefinition,
        ctx: &mut EvaluationContext<'_>,
    ) -> Result<(), StageError> {
        for (descriptor_path, descriptor) in definition.indexed_descriptors() {
            for constraint in descriptor.constraints().same_subject() {
                let paths = self.referenced_paths(definition, &descriptor_path, constraint, ctx)?;
                if paths.is_empty() {
                    continue;
                }

                let mut subjects = Vec::with_capacity(paths.len());
                for path in &paths {
                    let credential = ctx
                        .resolver
                        .resolve(ctx.presentation.document(), std::slice::from_ref(path))?
                        .into_iter()
                        .next()
                        .ok_or_else(|| StageError::UnresolvedSubmissionPath(path.clone()))?
                        .value;
                    subjects.push(subject_id(&credential).map(str::to_owned));
                }

                let same = match subjects.split_first() {
                    Some((Some(first), rest)) => rest.iter().all(|s| s.as_ref() == Some(first)),
                    _ => false,
                };
                let (status, message) = match (same, constraint.directive.is_required()) {
                    (true, _) => (Status::Info, VERIFIED),
                    (false, true) => (Status::Error, NOT_VERIFIED),
                    (false, false) => (Status::Warn, NOT_VERIFIED),
                };
                debug!(descriptor = descriptor.id(), same, "same_subject checked");

                let details = payload([
                    (
                        "field_id",
                        constraint.field_id.iter().map(String::as_str).collect(),
                    ),
                    ("subjects", subjects.iter().cloned().map(Value::from).collect()),
                ]);
                for path in paths {
                    ctx.results.push(
                        CheckResult::new(
                            self.name(),
                            descriptor_path.as_str(),
                            Some(path),
                            status,
                            message,
                        )
                        .with_payload(details.clone()),
                    );
                }
            }
        }
        Ok(())
    }
}
