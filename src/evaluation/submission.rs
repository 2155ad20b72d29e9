use serde_json::{Map, Value};
use tracing::debug;

use super::{
    presentation::{candidate_path, payload},
    results::{CheckResult, Status},
    EvaluationContext, EvaluationStage, StageError,
};
use crate::core::{
    presentation_definition::PresentationDefinition,
    presentation_submission::{DescriptorMap, Merged},
};

pub const NOT_ELIGIBLE: &str = "The input candidate is not eligible for submission";
pub const ELIGIBLE: &str = "The input candidate is eligible for submission";

/// Builds the presentation submission from the checks recorded so far.
///
/// A candidate with any error recorded against it is excluded. Every other
/// candidate is submitted for each input descriptor that recorded a result
/// for it, and copied into the returned presentation.
#[derive(Debug, Clone)]
pub struct MarkForSubmissionEvaluation {
    submission_id: uuid::Uuid,
}

impl MarkForSubmissionEvaluation {
    /// A stage with a freshly generated submission id.
    pub fn new() -> Self {
        Self::with_id(uuid::Uuid::new_v4())
    }

    pub fn with_id(submission_id: uuid::Uuid) -> Self {
        Self { submission_id }
    }

    /// The exclusion record for a candidate, copied from the first error
    /// found for it. The original evaluator is kept in the payload.
    fn ineligible(&self, error: &CheckResult) -> CheckResult {
        let mut details = Map::new();
        details.insert("evaluator".into(), Value::from(error.evaluator.as_str()));
        match &error.payload {
            Value::Object(fields) => details.extend(fields.clone()),
            Value::Null => {}
            other => {
                details.insert("payload".into(), other.clone());
            }
        }

        CheckResult {
            evaluator: self.name().to_owned(),
            message: NOT_ELIGIBLE.to_owned(),
            payload: Value::Object(details),
            ..error.clone()
        }
    }
}

impl Default for MarkForSubmissionEvaluation {
    fn default() -> Self {
        Self::new()
    }
}

impl EvaluationStage for MarkForSubmissionEvaluation {
    fn name(&self) -> &'static str {
        "MarkForSubmissionEvaluation"
    }

    fn handle(
        &self,
        definition: &PresentationDefinition,
        ctx: &mut EvaluationContext<'_>,
    ) -> Result<(), StageError> {
        ctx.presentation.open_submission(self.submission_id);

        let candidates: Vec<(String, usize)> = ctx
            .presentation
            .candidates()
            .iter()
            .map(|c| (c.collection.to_owned(), c.index))
            .collect();

        for (collection, index) in candidates {
            let path = candidate_path(&collection, index);

            if let Some(error) = ctx.results.first_error_for(&path) {
                let excluded = self.ineligible(error);
                debug!(
                    candidate = %path,
                    reason = %error.message,
                    "candidate excluded from submission"
                );
                ctx.results.push(excluded);
                continue;
            }

            ctx.presentation.set_definition_id(definition.id())?;

            for (descriptor_path, descriptor) in definition.indexed_descriptors() {
                let recorded = ctx
                    .results
                    .for_candidate(&path)
                    .any(|r| r.input_descriptor_path == descriptor_path);
                if !recorded {
                    continue;
                }

                let position = ctx
                    .presentation
                    .submitted_position(&collection, index)
                    .ok_or_else(|| StageError::MalformedCandidate(path.clone()))?;
                let mapped = DescriptorMap::new(
                    descriptor.id(),
                    ctx.config.descriptor_format.clone(),
                    candidate_path(&collection, position),
                );

                let merged = ctx.presentation.map_descriptor(mapped, &collection, index)?;
                if merged == Merged::Nested {
                    debug!(descriptor = descriptor.id(), candidate = %path, "descriptor nested");
                }

                ctx.results.push(
                    CheckResult::new(
                        self.name(),
                        descriptor_path,
                        Some(path.clone()),
                        Status::Info,
                        ELIGIBLE,
                    )
                    .with_payload(payload([("group", Value::from(descriptor.groups().to_vec()))])),
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::EvaluationConfig,
        evaluation::{
            path::JsonPathResolver, presentation::WorkingPresentation, results::CheckResults,
            FilterEvaluation, UriEvaluation,
        },
    };
    use serde_json::json;

    fn run(definition: Value, presentation: Value) -> (CheckResults, Value) {
        let definition: PresentationDefinition = serde_json::from_value(definition).unwrap();
        let config = EvaluationConfig::default();
        let mut ctx = EvaluationContext {
            results: CheckResults::default(),
            presentation: WorkingPresentation::new(presentation, &config.credential_collection)
                .unwrap(),
            resolver: &JsonPathResolver,
            config: &config,
        };
        UriEvaluation.handle(&definition, &mut ctx).unwrap();
        FilterEvaluation.handle(&definition, &mut ctx).unwrap();
        MarkForSubmissionEvaluation::new()
            .handle(&definition, &mut ctx)
            .unwrap();
        (ctx.results, ctx.presentation.into_value().unwrap())
    }

    #[test]
    fn ineligible_candidates_are_left_out() {
        let (results, presentation) = run(
            json!({
                "id": "pd",
                "input_descriptors": [{
                    "id": "issuer",
                    "group": ["A"],
                    "constraints": { "fields": [{ "path": ["$.issuer"] }] }
                }]
            }),
            json!({ "verifiableCredential": [
                { "id": "urn:vc:0" },
                { "id": "urn:vc:1", "issuer": "did:a" }
            ] }),
        );

        let excluded = results
            .iter()
            .find(|r| r.message == NOT_ELIGIBLE)
            .unwrap();
        assert_eq!(
            excluded.verifiable_credential_path.as_deref(),
            Some("$.verifiableCredential[0]")
        );
        assert_eq!(excluded.evaluator, "MarkForSubmissionEvaluation");
        assert_eq!(
            excluded.payload,
            json!({ "evaluator": "FilterEvaluation", "result": [], "valid": false })
        );

        let eligible = results.iter().find(|r| r.message == ELIGIBLE).unwrap();
        assert_eq!(
            eligible.verifiable_credential_path.as_deref(),
            Some("$.verifiableCredential[1]")
        );
        assert_eq!(eligible.payload, json!({ "group": ["A"] }));

        // The accepted credential moves up to the first slot of the output.
        assert_eq!(
            presentation["verifiableCredential"],
            json!([{ "id": "urn:vc:1", "issuer": "did:a" }])
        );
        assert_eq!(
            presentation["presentation_submission"]["descriptor_map"],
            json!([{ "id": "issuer", "format": "ldp_vc", "path": "$.verifiableCredential[0]" }])
        );
        assert_eq!(presentation["presentation_submission"]["definition_id"], "pd");
    }

    #[test]
    fn second_match_is_nested() {
        let (_, presentation) = run(
            json!({
                "id": "pd",
                "input_descriptors": [
                    { "id": "bank", "constraints": { "fields": [{ "path": ["$.account"] }] } }
                ]
            }),
            json!({ "verifiableCredential": [
                { "id": "urn:vc:0", "account": "1" },
                { "id": "urn:vc:1", "account": "2" }
            ] }),
        );

        assert_eq!(
            presentation["presentation_submission"]["descriptor_map"],
            json!([{
                "id": "bank",
                "format": "ldp_vc",
                "path": "$.verifiableCredential[0]",
                "path_nested": { "id": "bank", "format": "ldp_vc", "path": "$.verifiableCredential[1]" }
            }])
        );
        assert_eq!(presentation["verifiableCredential"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn one_candidate_for_several_descriptors_is_copied_once() {
        let (results, presentation) = run(
            json!({
                "id": "pd",
                "input_descriptors": [{ "id": "first" }, { "id": "second" }]
            }),
            json!({ "verifiableCredential": [{ "id": "urn:vc:0" }] }),
        );

        assert_eq!(results.iter().filter(|r| r.message == ELIGIBLE).count(), 2);
        assert_eq!(presentation["verifiableCredential"], json!([{ "id": "urn:vc:0" }]));
        let map = presentation["presentation_submission"]["descriptor_map"].as_array().unwrap();
        assert_eq!(map.len(), 2);
        assert!(map.iter().all(|d| d["path"] == "$.verifiableCredential[0]"));
    }

    #[test]
    fn ineligible_copy_wraps_non_object_payload() {
        let stage = MarkForSubmissionEvaluation::new();
        let error = CheckResult::new(
            "LimitDisclosureEvaluation",
            "$.input_descriptors[0]",
            Some("$.verifiableCredential[0]".into()),
            Status::Error,
            "mandatory field not present in the verifiableCredential",
        )
        .with_payload(json!(["$.name"]));

        let copy = stage.ineligible(&error);
        assert_eq!(
            copy.payload,
            json!({ "evaluator": "LimitDisclosureEvaluation", "payload": ["$.name"] })
        );
        assert_eq!(copy.input_descriptor_path, "$.input_descriptors[0]");
        assert_eq!(copy.status, Status::Error);
    }
}
