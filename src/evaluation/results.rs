use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome level of a single check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Info,
    Warn,
    Error,
}

/// A structured outcome recorded by an evaluation stage.
///
/// The `payload` has no single schema; interpret it by `evaluator` and `message`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub input_descriptor_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verifiable_credential_path: Option<String>,
    pub evaluator: String,
    pub status: Status,
    pub message: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub payload: Value,
}

impl CheckResult {
    pub fn new(
        evaluator: &str,
        input_descriptor_path: impl Into<String>,
        verifiable_credential_path: Option<String>,
        status: Status,
        message: &str,
    ) -> Self {
        Self {
            input_descriptor_path: input_descriptor_path.into(),
            verifiable_credential_path,
            evaluator: evaluator.to_owned(),
            status,
            message: message.to_owned(),
            payload: Value::Null,
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn is_error(&self) -> bool {
        self.status == Status::Error
    }

    pub fn is_info(&self) -> bool {
        self.status == Status::Info
    }

    fn concerns(&self, candidate_path: &str) -> bool {
        self.verifiable_credential_path.as_deref() == Some(candidate_path)
    }
}

/// The append-only, ordered log shared by the evaluation stages.
///
/// Later stages find what earlier ones decided by scanning it for an exact
/// `verifiable_credential_path` match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckResults(Vec<CheckResult>);

impl CheckResults {
    pub fn push(&mut self, result: CheckResult) {
        self.0.push(result);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CheckResult> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Every result recorded about the candidate at `candidate_path`.
    pub fn for_candidate<'a>(
        &'a self,
        candidate_path: &'a str,
    ) -> impl Iterator<Item = &'a CheckResult> + 'a {
        self.0.iter().filter(move |r| r.concerns(candidate_path))
    }

    /// The earliest error recorded about the candidate at `candidate_path`.
    pub fn first_error_for(&self, candidate_path: &str) -> Option<&CheckResult> {
        self.0
            .iter()
            .find(|r| r.is_error() && r.concerns(candidate_path))
    }

    /// Whether `evaluator` recorded an info result for this descriptor and candidate.
    pub fn has_info(&self, descriptor_path: &str, candidate_path: &str, evaluator: &str) -> bool {
        self.for_candidate(candidate_path).any(|r| {
            r.is_info() && r.evaluator == evaluator && r.input_descriptor_path == descriptor_path
        })
    }

    pub fn into_inner(self) -> Vec<CheckResult> {
        self.0
    }
}

impl<'a> IntoIterator for &'a CheckResults {
    type Item = &'a CheckResult;
    type IntoIter = std::slice::Iter<'a, CheckResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wire_format() {
        let result = CheckResult::new(
            "UriEvaluation",
            "$.input_descriptors[0]",
            Some("$.verifiableCredential[0]".into()),
            Status::Error,
            "nope",
        )
        .with_payload(json!({ "inputDescriptorsUris": ["a"] }));

        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({
                "input_descriptor_path": "$.input_descriptors[0]",
                "verifiable_credential_path": "$.verifiableCredential[0]",
                "evaluator": "UriEvaluation",
                "status": "error",
                "message": "nope",
                "payload": { "inputDescriptorsUris": ["a"] }
            })
        );

        let bare = CheckResult::new(
            "SubjectIsIssuerEvaluation",
            "$.input_descriptors[1]",
            None,
            Status::Warn,
            "w",
        );
        assert_eq!(
            serde_json::to_value(&bare).unwrap(),
            json!({
                "input_descriptor_path": "$.input_descriptors[1]",
                "evaluator": "SubjectIsIssuerEvaluation",
                "status": "warn",
                "message": "w"
            })
        );
    }

    #[test]
    fn scans_match_exact_paths() {
        let mut results = CheckResults::default();
        results.push(CheckResult::new(
            "FilterEvaluation",
            "$.input_descriptors[0]",
            Some("$.verifiableCredential[1]".into()),
            Status::Info,
            "ok",
        ));
        results.push(CheckResult::new(
            "UriEvaluation",
            "$.input_descriptors[0]",
            Some("$.verifiableCredential[10]".into()),
            Status::Error,
            "bad",
        ));

        assert!(results.first_error_for("$.verifiableCredential[1]").is_none());
        assert!(results.first_error_for("$.verifiableCredential[10]").is_some());
        assert!(results.has_info(
            "$.input_descriptors[0]",
            "$.verifiableCredential[1]",
            "FilterEvaluation"
        ));
        assert!(!results.has_info(
            "$.input_descriptors[1]",
            "$.verifiableCredential[1]",
            "FilterEvaluation"
        ));
        assert_eq!(results.for_candidate("$.verifiableCredential[1]").count(), 1);
    }

    #[test]
    fn first_error_outlives_the_queried_path() {
        let mut results = CheckResults::default();
        results.push(CheckResult::new(
            "FilterEvaluation",
            "$.input_descriptors[0]",
            Some("$.verifiableCredential[0]".into()),
            Status::Error,
            "missing",
        ));

        let found = {
            let path = format!("$.verifiableCredential[{}]", 0);
            results.first_error_for(&path)
        };
        assert_eq!(found.map(|r| r.message.as_str()), Some("missing"));
    }
}
