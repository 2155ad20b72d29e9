use serde_json::{json, Value};
use tracing::debug;

use super::{
    filter::{evaluate_field, FieldOutcome, VALID_CANDIDATE},
    path::{locate_mut, JsonPathMatch},
    presentation::{candidate_path, payload},
    results::{CheckResult, Status},
    EvaluationContext, EvaluationStage, FilterEvaluation, StageError,
};
use crate::core::presentation_definition::PresentationDefinition;

/// Replaces the value of every field declaring a `predicate` with the
/// boolean result of the field's filter.
///
/// Only candidates the filter stage accepted for the descriptor, and that
/// have no error recorded against them, are rewritten.
#[derive(Debug, Default, Clone, Copy)]
pub struct PredicateRelatedFieldEvaluation;

struct Substitution {
    descriptor_path: String,
    collection: String,
    index: usize,
    found: JsonPathMatch,
    holds: bool,
}

impl EvaluationStage for PredicateRelatedFieldEvaluation {
    fn name(&self) -> &'static str {
        "PredicateRelatedFieldEvaluation"
    }

    fn handle(
        &self,
        definition: &PresentationDefinition,
        ctx: &mut EvaluationContext<'_>,
    ) -> Result<(), StageError> {
        let filter_stage = FilterEvaluation.name();
        let mut substitutions = Vec::new();

        for (descriptor_path, descriptor) in definition.indexed_descriptors() {
            for field in descriptor
                .constraints()
                .fields()
                .iter()
                .filter(|f| f.predicate().is_some())
            {
                if field.filter().is_none() {
                    return Err(StageError::MissingPredicateFilter {
                        descriptor: descriptor.id().to_owned(),
                        path: field.path().head().clone(),
                    });
                }

                for candidate in ctx.presentation.candidates() {
                    let path = candidate.path();
                    if !ctx.results.has_info(&descriptor_path, &path, filter_stage)
                        || ctx.results.first_error_for(&path).is_some()
                    {
                        continue;
                    }

                    // Substitute where the filter stage found its answer.
                    let outcome =
                        evaluate_field(ctx.resolver, descriptor.id(), field, candidate.value)?;
                    let (found, holds) = match outcome {
                        FieldOutcome::Accepted(found) => (found, true),
                        FieldOutcome::Rejected(found) => (found, false),
                        FieldOutcome::Missing => continue,
                    };

                    substitutions.push(Substitution {
                        descriptor_path: descriptor_path.clone(),
                        collection: candidate.collection.to_owned(),
                        index: candidate.index,
                        found,
                        holds,
                    });
                }
            }
        }

        for Substitution {
            descriptor_path,
            collection,
            index,
            mut found,
            holds,
        } in substitutions
        {
            let target = ctx
                .presentation
                .candidate_mut(&collection, index)
                .and_then(|candidate| locate_mut(candidate, &found.path))
                .ok_or_else(|| StageError::MalformedCandidate(found.to_path_string()))?;
            *target = Value::Bool(holds);
            found.value = Value::Bool(holds);

            debug!(
                %collection,
                index,
                path = %found.to_path_string(),
                holds,
                "predicate substituted"
            );
            ctx.results.push(
                CheckResult::new(
                    self.name(),
                    descriptor_path,
                    Some(candidate_path(&collection, index)),
                    Status::Info,
                    VALID_CANDIDATE,
                )
                .with_payload(payload([
                    ("result", json!(found)),
                    ("valid", Value::Bool(true)),
                    ("value", Value::Bool(holds)),
                ])),
            );
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

    fn age_definition(field: Value) -> PresentationDefinition {
        serde_json::from_value(json!({
            "id": "pd",
            "input_descriptors": [{ "id": "age", "constraints": { "fields": [field] } }]
        }))
        .unwrap()
    }

    fn run(
        definition: &PresentationDefinition,
        presentation: Value,
    ) -> Result<(CheckResults, Value), StageError> {
        let config = EvaluationConfig::default();
        let mut ctx = EvaluationContext {
            results: CheckResults::default(),
            presentation: WorkingPresentation::new(presentation, &config.credential_collection)
                .unwrap(),
            resolver: &JsonPathResolver,
            config: &config,
        };
        FilterEvaluation.handle(definition, &mut ctx)?;
        PredicateRelatedFieldEvaluation.handle(definition, &mut ctx)?;
        Ok((ctx.results, ctx.presentation.document().clone()))
    }

    #[test]
    fn value_is_replaced_by_filter_outcome() {
        let definition = age_definition(json!({
            "path": ["$.credentialSubject.age"],
            "predicate": "required",
            "filter": { "type": "number", "minimum": 18 }
        }));
        let (results, presentation) = run(
            &definition,
            json!({ "verifiableCredential": [
                { "credentialSubject": { "id": "did:a", "age": 21 } },
                { "credentialSubject": { "id": "did:b", "age": 12 } }
            ] }),
        )
        .unwrap();

        let credentials = &presentation["verifiableCredential"];
        assert_eq!(credentials[0]["credentialSubject"]["age"], json!(true));
        // Rejected by the filter stage, so left untouched.
        assert_eq!(credentials[1]["credentialSubject"]["age"], json!(12));

        let substituted: Vec<_> = results
            .iter()
            .filter(|r| r.evaluator == "PredicateRelatedFieldEvaluation")
            .collect();
        assert_eq!(substituted.len(), 1);
        assert_eq!(
            substituted[0].payload,
            json!({
                "result": { "path": ["$", "credentialSubject", "age"], "value": true },
                "valid": true,
                "value": true
            })
        );
    }

    #[test]
    fn fields_without_predicate_are_untouched() {
        let definition = age_definition(json!({
            "path": ["$.credentialSubject.age"],
            "filter": { "type": "number" }
        }));
        let (results, presentation) = run(
            &definition,
            json!({ "verifiableCredential": [{ "credentialSubject": { "age": 21 } }] }),
        )
        .unwrap();

        assert_eq!(
            presentation["verifiableCredential"][0]["credentialSubject"]["age"],
            json!(21)
        );
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn substitutes_the_match_the_filter_accepted() {
        let definition = age_definition(json!({
            "path": ["$.scores[*]"],
            "predicate": "required",
            "filter": { "type": "number", "minimum": 18 }
        }));
        let (results, presentation) = run(
            &definition,
            json!({ "verifiableCredential": [{ "scores": [3, 40] }] }),
        )
        .unwrap();

        assert_eq!(presentation["verifiableCredential"][0]["scores"], json!([3, true]));

        let substituted: Vec<_> = results
            .iter()
            .filter(|r| r.evaluator == "PredicateRelatedFieldEvaluation")
            .collect();
        assert_eq!(substituted.len(), 1);
        assert_eq!(
            substituted[0].payload["result"],
            json!({ "path": ["$", "scores", 1], "value": true })
        );
    }

    #[test]
    fn predicate_requires_a_filter() {
        let definition = age_definition(json!({
            "path": ["$.credentialSubject.age"],
            "predicate": "preferred"
        }));
        let err = run(
            &definition,
            json!({ "verifiableCredential": [{ "credentialSubject": { "age": 21 } }] }),
        )
        .unwrap_err();
        assert!(matches!(err, StageError::MissingPredicateFilter { .. }));
    }
}
