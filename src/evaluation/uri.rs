use serde_json::Value;
use tracing::debug;

use super::{
    presentation::payload,
    results::{CheckResult, Status},
    EvaluationContext, EvaluationStage, StageError,
};
use crate::core::presentation_definition::PresentationDefinition;

pub const URI_MISMATCH: &str =
    "presentation_definition URI for the schema of the candidate input MUST be equal to one of the input_descriptors object uri values exactly.";

/// Checks that each credential declares at least one of the schema URIs an
/// input descriptor asks for.
#[derive(Debug, Default, Clone, Copy)]
pub struct UriEvaluation;

/// The schema ids a credential declares in `credentialSchema`.
///
/// The property may hold a list or a single entry, and each entry may be an
/// object with an `id` or a bare URI string.
fn credential_schema_ids(credential: &Value) -> Vec<&str> {
    fn entry_id(entry: &Value) -> Option<&str> {
        match entry {
            Value::String(uri) => Some(uri.as_str()),
            other => other.get("id").and_then(Value::as_str),
        }
    }

    match credential.get("credentialSchema") {
        Some(Value::Array(entries)) => entries.iter().filter_map(entry_id).collect(),
        Some(entry) => entry_id(entry).into_iter().collect(),
        None => Vec::new(),
    }
}

impl EvaluationStage for UriEvaluation {
    fn name(&self) -> &'static str {
        "UriEvaluation"
    }

    fn handle(
        &self,
        definition: &PresentationDefinition,
        ctx: &mut EvaluationContext<'_>,
    ) -> Result<(), StageError> {
        for (descriptor_path, descriptor) in definition.indexed_descriptors() {
            let expected = descriptor.schema_uris();
            if expected.is_empty() {
                continue;
            }

            for (i, credential) in ctx.presentation.credentials().iter().enumerate() {
                let declared = credential_schema_ids(credential);
                if declared.iter().any(|uri| expected.contains(uri)) {
                    continue;
                }

                debug!(
                    descriptor = descriptor.id(),
                    credential = i,
                    "no declared credential schema matches"
                );
                ctx.results.push(
                    CheckResult::new(
                        self.name(),
                        descriptor_path.as_str(),
                        Some(ctx.presentation.credential_path(i)),
                        Status::Error,
                        URI_MISMATCH,
                    )
                    .with_payload(payload([
                        (
                            "inputDescriptorsUris",
                            expected.iter().copied().map(Value::from).collect(),
                        ),
                        (
                            "presentationDefinitionUri",
                            declared.first().copied().map_or(Value::Null, Value::from),
                        ),
                    ])),
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
        },
    };
    use serde_json::json;

    const TYPES: &str = "https://www.w3.org/TR/vc-data-model/#types";

    fn run(schema: Value, credentials: Value) -> CheckResults {
        let definition: PresentationDefinition = serde_json::from_value(json!({
            "id": "pd",
            "input_descriptors": [{ "id": "age", "schema": schema }]
        }))
        .unwrap();
        let config = EvaluationConfig::default();
        let mut ctx = EvaluationContext {
            results: CheckResults::default(),
            presentation: WorkingPresentation::new(
                json!({ "verifiableCredential": credentials }),
                &config.credential_collection,
            )
            .unwrap(),
            resolver: &JsonPathResolver,
            config: &config,
        };
        UriEvaluation.handle(&definition, &mut ctx).unwrap();
        ctx.results
    }

    #[test]
    fn mismatch_is_reported_per_credential() {
        let results = run(
            json!([{ "uri": format!("{TYPES}1") }]),
            json!([
                { "credentialSchema": [{ "id": TYPES }] },
                { "credentialSchema": { "id": format!("{TYPES}1") } },
                { "credentialSchema": [] }
            ]),
        );

        let results: Vec<_> = results.iter().collect();
        assert_eq!(results.len(), 2);
        assert_eq!(
            serde_json::to_value(results[0]).unwrap(),
            json!({
                "input_descriptor_path": "$.input_descriptors[0]",
                "verifiable_credential_path": "$.verifiableCredential[0]",
                "evaluator": "UriEvaluation",
                "status": "error",
                "message": URI_MISMATCH,
                "payload": {
                    "inputDescriptorsUris": [format!("{TYPES}1")],
                    "presentationDefinitionUri": TYPES
                }
            })
        );
        assert_eq!(
            results[1].verifiable_credential_path.as_deref(),
            Some("$.verifiableCredential[2]")
        );
        assert_eq!(results[1].payload["presentationDefinitionUri"], Value::Null);
    }

    #[test]
    fn any_shared_uri_is_enough() {
        let extra_on_descriptor = run(
            json!([{ "uri": format!("{TYPES}1") }, { "uri": TYPES }]),
            json!([{ "credentialSchema": [{ "id": TYPES }] }]),
        );
        assert!(extra_on_descriptor.is_empty());

        let extra_on_credential = run(
            json!([{ "uri": TYPES }]),
            json!([{ "credentialSchema": [{ "id": "https://example.com/other" }, TYPES] }]),
        );
        assert!(extra_on_credential.is_empty());
    }

    #[test]
    fn descriptor_without_schema_is_skipped() {
        let results = run(json!([]), json!([{ "credentialSchema": [{ "id": TYPES }] }]));
        assert!(results.is_empty());
    }
}
