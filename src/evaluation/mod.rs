//! Evaluation of a holder's presentation against a Presentation Definition.
//!
//! The [Evaluator] runs a fixed sequence of stages over a shared
//! [EvaluationContext]. Each stage reads the definition and the working
//! presentation, appends [CheckResult]s to the log, and the later stages
//! reshape the presentation:
//!
//! 1. [UriEvaluation]: credential schemas against the descriptor's schema URIs.
//! 2. [FilterEvaluation]: field paths and JSON Schema filters, per candidate.
//! 3. [PredicateRelatedFieldEvaluation]: predicate fields replaced by booleans.
//! 4. [MarkForSubmissionEvaluation]: the presentation submission is built.
//! 5. [LimitDisclosureEvaluation]: submitted credentials pruned to declared fields.
//! 6. [SubjectIsIssuerEvaluation]: `issuer` against `credentialSubject.id`.
//! 7. [SameSubjectEvaluation]: fields required to share a subject.
//!
//! Stages communicate only through the log, matching candidates by their
//! exact `verifiable_credential_path`, so their order is significant.

use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    config::EvaluationConfig,
    core::{
        presentation_definition::PresentationDefinition,
        presentation_submission::PresentationSubmission,
    },
};

pub mod filter;
pub mod limit_disclosure;
pub mod path;
pub mod predicate;
pub mod presentation;
pub mod results;
pub mod same_subject;
pub mod subject_is_issuer;
pub mod submission;
pub mod uri;

pub use filter::FilterEvaluation;
pub use limit_disclosure::LimitDisclosureEvaluation;
pub use path::{JsonPathMatch, JsonPathResolver, PathResolver, PathSegment, ResolveError};
pub use predicate::PredicateRelatedFieldEvaluation;
pub use presentation::WorkingPresentation;
pub use results::{CheckResult, CheckResults, Status};
pub use same_subject::SameSubjectEvaluation;
pub use subject_is_issuer::SubjectIsIssuerEvaluation;
pub use submission::MarkForSubmissionEvaluation;
pub use uri::UriEvaluation;

/// State of one evaluation run, handed to each stage in turn.
pub struct EvaluationContext<'a> {
    pub results: CheckResults,
    pub presentation: WorkingPresentation,
    pub resolver: &'a dyn PathResolver,
    pub config: &'a EvaluationConfig,
}

/// A step of the evaluation pipeline.
pub trait EvaluationStage {
    /// Name written in the `evaluator` field of the results this stage records.
    fn name(&self) -> &'static str;

    fn handle(
        &self,
        definition: &PresentationDefinition,
        ctx: &mut EvaluationContext<'_>,
    ) -> Result<(), StageError>;
}

/// A fault that stops the run, as opposed to a failed check.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("input descriptor `{descriptor}` has an invalid filter: {reason}")]
    InvalidFilter { descriptor: String, reason: String },

    #[error("input descriptor `{descriptor}` declares a predicate on `{path}` without a filter")]
    MissingPredicateFilter { descriptor: String, path: String },

    #[error("submitted path `{0}` does not resolve in the presentation")]
    UnresolvedSubmissionPath(String),

    #[error("input candidate `{0}` is missing from the presentation")]
    MalformedCandidate(String),

    #[error("no presentation submission has been opened")]
    SubmissionNotOpen,
}

/// Why an evaluation produced no result.
#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    #[error("invalid presentation: {0}")]
    InvalidPresentation(String),

    #[error("unknown exception occurred: {source}")]
    Aborted {
        stage: &'static str,
        #[source]
        source: StageError,
    },

    #[error("failed to serialize the presentation submission: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// The outcome of a successful run.
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// Every check, in the order the stages recorded them.
    pub results: Vec<CheckResult>,
    /// The reshaped presentation, with its `presentation_submission`.
    pub presentation: Value,
    /// The submission embedded in `presentation`.
    pub submission: Option<PresentationSubmission>,
}

impl Evaluation {
    /// Results with [Status::Error].
    pub fn errors(&self) -> impl Iterator<Item = &CheckResult> {
        self.results.iter().filter(|r| r.is_error())
    }

    /// Results recorded by the given stage.
    pub fn by_evaluator<'a>(&'a self, evaluator: &'a str) -> impl Iterator<Item = &'a CheckResult> {
        self.results.iter().filter(move |r| r.evaluator == evaluator)
    }
}

/// Runs the evaluation stages over a presentation.
#[derive(Debug, Clone, Default)]
pub struct Evaluator<R: PathResolver = JsonPathResolver> {
    config: EvaluationConfig,
    resolver: R,
}

impl Evaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: EvaluationConfig) -> Self {
        Self {
            config,
            resolver: JsonPathResolver,
        }
    }
}

impl<R: PathResolver> Evaluator<R> {
    /// Swap the Path Resolver, keeping the configuration.
    pub fn with_resolver<S: PathResolver>(self, resolver: S) -> Evaluator<S> {
        Evaluator {
            config: self.config,
            resolver,
        }
    }

    pub fn config(&self) -> &EvaluationConfig {
        &self.config
    }

    /// The stages of one run. Built per run so each run gets its own submission id.
    fn stages(&self) -> [Box<dyn EvaluationStage>; 7] {
        [
            Box::new(UriEvaluation),
            Box::new(FilterEvaluation),
            Box::new(PredicateRelatedFieldEvaluation),
            Box::new(MarkForSubmissionEvaluation::new()),
            Box::new(LimitDisclosureEvaluation),
            Box::new(SubjectIsIssuerEvaluation),
            Box::new(SameSubjectEvaluation),
        ]
    }

    /// Evaluate `presentation` against `definition`.
    ///
    /// Failed checks are reported as error results, not as an `Err`. An `Err`
    /// means a stage could not run at all, and no partial results are returned.
    pub fn evaluate(
        &self,
        definition: &PresentationDefinition,
        presentation: Value,
    ) -> Result<Evaluation, EvaluationError> {
        let presentation =
            WorkingPresentation::new(presentation, &self.config.credential_collection)
                .ok_or_else(|| {
                    EvaluationError::InvalidPresentation("expected a JSON object".into())
                })?;

        let mut ctx = EvaluationContext {
            results: CheckResults::default(),
            presentation,
            resolver: &self.resolver,
            config: &self.config,
        };

        for stage in self.stages() {
            debug!(stage = stage.name(), definition = %definition.id(), "running evaluation stage");
            if let Err(source) = stage.handle(definition, &mut ctx) {
                warn!(stage = stage.name(), "evaluation aborted: {source}");
                return Err(EvaluationError::Aborted {
                    stage: stage.name(),
                    source,
                });
            }
            debug!(stage = stage.name(), results = ctx.results.len(), "evaluation stage done");
        }

        let submission = ctx.presentation.submission().cloned();
        Ok(Evaluation {
            results: ctx.results.into_inner(),
            presentation: ctx.presentation.into_value()?,
            submission,
        })
    }
}

/// Evaluate with the default configuration and [JsonPathResolver].
pub fn evaluate(
    definition: &PresentationDefinition,
    presentation: Value,
) -> Result<Evaluation, EvaluationError> {
    Evaluator::new().evaluate(definition, presentation)
}
