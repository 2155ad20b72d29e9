use serde_json::{Map, Value};
use tracing::debug;

use super::{
    path::PathSegment,
    results::{CheckResult, Status},
    EvaluationContext, EvaluationStage, StageError,
};
use crate::core::{
    input_descriptor::{InputDescriptor, Optionality},
    presentation_definition::PresentationDefinition,
};

pub const MANDATORY_FIELD_MISSING: &str = "mandatory field not present in the verifiableCredential";
pub const DISCLOSURE_LIMITED: &str =
    "added variable in the limit_disclosure to the verifiableCredential";

/// Keys every disclosed credential keeps, on top of the configured mandatory ones.
const RETAINED_KEYS: [&str; 3] = ["id", "credentialSubject", "type"];

/// Prunes the submitted credentials of descriptors with
/// `limit_disclosure: required` down to the fields they declare.
#[derive(Debug, Default, Clone, Copy)]
pub struct LimitDisclosureEvaluation;

/// A submitted credential and the descriptors limiting its disclosure.
struct Target<'d> {
    mapped: String,
    location: Vec<PathSegment>,
    original: Value,
    descriptors: Vec<(String, &'d InputDescriptor)>,
}

impl LimitDisclosureEvaluation {
    /// Every submitted location of a `limit_disclosure: required` descriptor,
    /// read before any of them is pruned.
    fn targets<'d>(
        &self,
        definition: &'d PresentationDefinition,
        ctx: &EvaluationContext<'_>,
    ) -> Result<Vec<Target<'d>>, StageError> {
        let mut targets: Vec<Target<'d>> = Vec::new();

        for (descriptor_path, descriptor) in definition.indexed_descriptors() {
            if descriptor.constraints().limit_disclosure() != Some(Optionality::Required) {
                continue;
            }
            let submission = ctx
                .presentation
                .submission()
                .ok_or(StageError::SubmissionNotOpen)?;

            for mapped in submission.paths_for(descriptor.id()) {
                if let Some(target) = targets.iter_mut().find(|t| t.mapped == mapped) {
                    target.descriptors.push((descriptor_path.clone(), descriptor));
                    continue;
                }

                let located = ctx
                    .resolver
                    .resolve(ctx.presentation.document(), std::slice::from_ref(&mapped))?
                    .into_iter()
                    .next()
                    .ok_or_else(|| StageError::UnresolvedSubmissionPath(mapped.clone()))?;

                targets.push(Target {
                    mapped,
                    location: located.path,
                    original: located.value,
                    descriptors: vec![(descriptor_path.clone(), descriptor)],
                });
            }
        }
        Ok(targets)
    }

    /// The retained keys of `credential`, the base of its disclosed copy.
    fn retained(&self, ctx: &EvaluationContext<'_>, credential: &Value) -> Value {
        let mut disclosed = Map::new();
        let keys = RETAINED_KEYS
            .iter()
            .copied()
            .chain(ctx.config.mandatory_fields.iter().map(String::as_str));
        for key in keys {
            if let Some(value) = credential.get(key) {
                disclosed.insert(key.to_owned(), value.clone());
            }
        }
        Value::Object(disclosed)
    }
}

/// Write `value` into `target` at `path`, creating the containers the path
/// implies and reusing the ones already there.
fn copy_into(target: &mut Value, path: &[PathSegment], value: Value) {
    let Some((segment, rest)) = path.split_first() else {
        *target = value;
        return;
    };

    let slot = match segment {
        PathSegment::Root => target,
        PathSegment::Key(key) => {
            if !target.is_object() {
                *target = Value::Object(Map::new());
            }
            let Value::Object(map) = target else {
                return;
            };
            map.entry(key.clone()).or_insert(Value::Null)
        }
        PathSegment::Index(index) => {
            if !target.is_array() {
                *target = Value::Array(Vec::new());
            }
            let Value::Array(items) = target else {
                return;
            };
            if items.len() <= *index {
                items.resize(index + 1, Value::Null);
            }
            &mut items[*index]
        }
    };
    copy_into(slot, rest, value);
}

impl EvaluationStage for LimitDisclosureEvaluation {
    fn name(&self) -> &'static str {
        "LimitDisclosureEvaluation"
    }

    fn handle(
        &self,
        definition: &PresentationDefinition,
        ctx: &mut EvaluationContext<'_>,
    ) -> Result<(), StageError> {
        for target in self.targets(definition, ctx)? {
            // Fields are read from the original credential, so descriptors
            // sharing it each add their own fields to one disclosed copy.
            let mut disclosed = self.retained(ctx, &target.original);

            for (descriptor_path, descriptor) in &target.descriptors {
                for field in descriptor.constraints().fields() {
                    let matches = ctx.resolver.resolve_first(&target.original, field.path())?;
                    if matches.is_empty() {
                        debug!(
                            descriptor = descriptor.id(),
                            credential = %target.mapped,
                            "mandatory field missing"
                        );
                        ctx.results.push(
                            CheckResult::new(
                                self.name(),
                                descriptor_path.as_str(),
                                Some(target.mapped.clone()),
                                Status::Error,
                                MANDATORY_FIELD_MISSING,
                            )
                            .with_payload(Value::from(field.path().to_vec())),
                        );
                    }
                    for found in matches {
                        copy_into(&mut disclosed, &found.path, found.value);
                    }
                }

                debug!(
                    descriptor = descriptor.id(),
                    credential = %target.mapped,
                    "disclosure limited"
                );
                ctx.results.push(CheckResult::new(
                    self.name(),
                    descriptor_path.as_str(),
                    Some(target.mapped.clone()),
                    Status::Info,
                    DISCLOSURE_LIMITED,
                ));
            }

            let slot = ctx
                .presentation
                .value_at_mut(&target.location)
                .ok_or_else(|| StageError::UnresolvedSubmissionPath(target.mapped.clone()))?;
            *slot = disclosed;
        }
        Ok(())
    }
}
