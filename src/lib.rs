//! This library evaluates Verifiable Presentations against a [DIF Presentation Exchange]
//! Presentation Definition.
//!
//! [DIF Presentation Exchange]: <https://identity.foundation/presentation-exchange/spec/v1.0.0/>
//!
//! # Usage
//!
//! ```ignore
//! use pex_evaluation::core::presentation_definition::PresentationDefinition;
//! use pex_evaluation::evaluation::Evaluator;
//!
//! let definition: PresentationDefinition = serde_json::from_str(definition_json)?;
//! let presentation: serde_json::Value = serde_json::from_str(presentation_json)?;
//!
//! let evaluation = Evaluator::new().evaluate(&definition, presentation)?;
//!
//! // Failed checks are part of the log, not errors.
//! for result in evaluation.errors() {
//!     println!("{}: {}", result.evaluator, result.message);
//! }
//!
//! // The reshaped presentation, with its `presentation_submission`.
//! let submitted = evaluation.presentation;
//! ```
//!
//! # Evaluation Overview
//!
//! An [`Evaluator`] runs seven stages in a fixed order over the presentation.
//! Each stage appends [`CheckResult`]s to a shared log, and later stages read
//! what earlier ones recorded about each input candidate:
//!
//! 1. *Schema URIs*: each credential must declare one of the descriptor's schema URIs.
//! 2. *Field filters*: each constraint field must resolve in the candidate and
//!    satisfy its JSON Schema filter.
//! 3. *Predicates*: fields declaring a `predicate` are replaced by the boolean
//!    outcome of their filter.
//! 4. *Submission*: candidates without any error are copied into the returned
//!    presentation and mapped by its [`PresentationSubmission`].
//! 5. *Limit disclosure*: submitted credentials of `limit_disclosure: required`
//!    descriptors are pruned to the declared fields.
//! 6. *Subject is issuer* and 7. *Same subject*: the relational constraints.
//!
//! The pipeline is described in the [`evaluation`] module. The Presentation
//! Exchange data model lives in [`core`], and run options in [`config`].
//!
//! Paths are JSONPath expressions, resolved with [`serde_json_path`] through
//! the [`PathResolver`] trait.
//!
//! [`Evaluator`]: crate::evaluation::Evaluator
//! [`CheckResult`]: crate::evaluation::CheckResult
//! [`PresentationSubmission`]: crate::core::presentation_submission::PresentationSubmission
//! [`PathResolver`]: crate::evaluation::PathResolver

pub mod config;
pub mod core;
pub mod evaluation;
pub mod utils;

pub use evaluation::{evaluate, Evaluation, EvaluationError, Evaluator};
pub use serde_json_path::JsonPath;
