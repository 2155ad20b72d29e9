use jsonschema::JSONSchema;
use serde_json::{json, Value};
use tracing::debug;

use super::{
    path::{JsonPathMatch, PathResolver},
    presentation::payload,
    results::{CheckResult, Status},
    EvaluationContext, EvaluationStage, StageError,
};
use crate::core::{
    input_descriptor::ConstraintsField, presentation_definition::PresentationDefinition,
};

pub const VALID_CANDIDATE: &str = "Input candidate valid for presentation submission";
pub const FAILED_FILTER: &str = "Input candidate failed filter evaluation";
pub const MISSING_PROPERTY: &str = "Input candidate does not contain property";

/// What a single constraint field found in a candidate.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum FieldOutcome {
    /// None of the field's paths resolved.
    Missing,
    /// The paths resolved but no value satisfies the filter.
    Rejected(JsonPathMatch),
    /// A value satisfies the filter, or there is no filter.
    Accepted(JsonPathMatch),
}

/// Resolve a field against a candidate and apply its filter.
///
/// The first path with any match is used. Among its matches the first one
/// passing the filter wins; if none passes, the first match is reported.
pub(crate) fn evaluate_field(
    resolver: &dyn PathResolver,
    descriptor_id: &str,
    field: &ConstraintsField,
    candidate: &Value,
) -> Result<FieldOutcome, StageError> {
    let mut matches = resolver.resolve_first(candidate, field.path())?;
    if matches.is_empty() {
        return Ok(FieldOutcome::Missing);
    }

    let Some(validator) = compile_filter(descriptor_id, field)? else {
        return Ok(FieldOutcome::Accepted(matches.swap_remove(0)));
    };

    match matches.iter().position(|m| validator.is_valid(&m.value)) {
        Some(i) => Ok(FieldOutcome::Accepted(matches.swap_remove(i))),
        None => Ok(FieldOutcome::Rejected(matches.swap_remove(0))),
    }
}

pub(crate) fn compile_filter(
    descriptor_id: &str,
    field: &ConstraintsField,
) -> Result<Option<JSONSchema>, StageError> {
    field
        .validator()
        .transpose()
        .map_err(|e| StageError::InvalidFilter {
            descriptor: descriptor_id.to_owned(),
            reason: e.to_string(),
        })
}

/// Checks every candidate of every collection against each descriptor's
/// constraint fields.
#[derive(Debug, Default, Clone, Copy)]
pub struct FilterEvaluation;

impl FilterEvaluation {
    fn field_result(
        &self,
        descriptor_path: &str,
        candidate_path: String,
        field: &ConstraintsField,
        outcome: FieldOutcome,
    ) -> CheckResult {
        let (status, message, result, valid) = match outcome {
            FieldOutcome::Accepted(found) => (Status::Info, VALID_CANDIDATE, json!(found), true),
            FieldOutcome::Rejected(found) => (Status::Error, FAILED_FILTER, json!(found), false),
            FieldOutcome::Missing if field.is_optional() => {
                (Status::Info, VALID_CANDIDATE, json!([]), true)
            }
            FieldOutcome::Missing => (Status::Error, MISSING_PROPERTY, json!([]), false),
        };

        CheckResult::new(self.name(), descriptor_path, Some(candidate_path), status, message)
            .with_payload(payload([("result", result), ("valid", Value::Bool(valid))]))
    }
}

impl EvaluationStage for FilterEvaluation {
    fn name(&self) -> &'static str {
        "FilterEvaluation"
    }

    fn handle(
        &self,
        definition: &PresentationDefinition,
        ctx: &mut EvaluationContext<'_>,
    ) -> Result<(), StageError> {
        for (descriptor_path, descriptor) in definition.indexed_descriptors() {
            let fields = descriptor.constraints().fields();

            for candidate in ctx.presentation.candidates() {
                if fields.is_empty() {
                    ctx.results.push(
                        CheckResult::new(
                            self.name(),
                            descriptor_path.as_str(),
                            Some(candidate.path()),
                            Status::Info,
                            VALID_CANDIDATE,
                        )
                        .with_payload(payload([
                            ("result", json!([])),
                            ("valid", Value::Bool(true)),
                        ])),
                    );
                    continue;
                }

                for field in fields {
                    let outcome =
                        evaluate_field(ctx.resolver, descriptor.id(), field, candidate.value)?;
                    if !matches!(outcome, FieldOutcome::Accepted(_)) {
                        debug!(
                            descriptor = descriptor.id(),
                            candidate = %candidate.path(),
                            paths = ?&field.path()[..],
                            "candidate rejected by field"
                        );
                    }
                    ctx.results.push(self.field_result(
                        &descriptor_path,
                        candidate.path(),
                        field,
                        outcome,
                    ));
                }
            }
        }
        Ok(())
    }
}
