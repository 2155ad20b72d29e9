use serde::{Serialize, Serializer};
use serde_json::Value;
use serde_json_path::{JsonPath, PathElement};

/// One step of a concrete traversal path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// The document root, `$`.
    Root,
    Key(String),
    Index(usize),
}

impl Serialize for PathSegment {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Root => serializer.serialize_str("$"),
            Self::Key(key) => serializer.serialize_str(key),
            Self::Index(index) => serializer.serialize_u64(*index as u64),
        }
    }
}

/// A value found by a path expression, along with where it was found.
///
/// Serializes as `{"path": ["$", "vc", "issuer"], "value": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonPathMatch {
    pub path: Vec<PathSegment>,
    pub value: Value,
}

impl JsonPathMatch {
    /// Format the traversal path back into a path expression, e.g.
    /// `$.verifiableCredential[0]` or `$['@context'][1]`.
    pub fn to_path_string(&self) -> String {
        let mut out = String::from("$");
        for segment in &self.path {
            match segment {
                PathSegment::Root => {}
                PathSegment::Key(key) => push_member(&mut out, key),
                PathSegment::Index(index) => {
                    out.push('[');
                    out.push_str(&index.to_string());
                    out.push(']');
                }
            }
        }
        out
    }
}

/// Append a member selector for `key`: `.key` when it is a plain name,
/// `['key']` otherwise.
pub fn push_member(out: &mut String, key: &str) {
    if is_plain_name(key) {
        out.push('.');
        out.push_str(key);
        return;
    }
    out.push_str("['");
    for c in key.chars() {
        if matches!(c, '\'' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push_str("']");
}

fn is_plain_name(key: &str) -> bool {
    let mut chars = key.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Walk a traversal path on a mutable document.
pub fn locate_mut<'v>(root: &'v mut Value, path: &[PathSegment]) -> Option<&'v mut Value> {
    path.iter().try_fold(root, |cursor, segment| match segment {
        PathSegment::Root => Some(cursor),
        PathSegment::Key(key) => cursor.get_mut(key.as_str()),
        PathSegment::Index(index) => cursor.get_mut(*index),
    })
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("invalid JSONPath expression `{path}`: {reason}")]
    InvalidPath { path: String, reason: String },
}

/// Resolves path expressions against a JSON document.
pub trait PathResolver {
    /// Resolve every expression against `root`, returning all matches in
    /// expression order. An expression without matches contributes nothing.
    fn resolve(&self, root: &Value, paths: &[String]) -> Result<Vec<JsonPathMatch>, ResolveError>;

    /// Resolve the expressions in order and return the matches of the first
    /// one that finds anything.
    fn resolve_first(
        &self,
        root: &Value,
        paths: &[String],
    ) -> Result<Vec<JsonPathMatch>, ResolveError> {
        for path in paths {
            let matches = self.resolve(root, std::slice::from_ref(path))?;
            if !matches.is_empty() {
                return Ok(matches);
            }
        }
        Ok(Vec::new())
    }
}

/// [PathResolver] backed by `serde_json_path` (RFC 9535 JSONPath).
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonPathResolver;

impl PathResolver for JsonPathResolver {
    fn resolve(&self, root: &Value, paths: &[String]) -> Result<Vec<JsonPathMatch>, ResolveError> {
        let mut matches = Vec::new();
        for expression in paths {
            let path = JsonPath::parse(expression).map_err(|e| ResolveError::InvalidPath {
                path: expression.clone(),
                reason: e.to_string(),
            })?;

            for node in path.query_located(root) {
                let segments = std::iter::once(PathSegment::Root)
                    .chain(node.location().iter().map(|element| match element {
                        PathElement::Name(name) => PathSegment::Key(name.to_string()),
                        PathElement::Index(index) => PathSegment::Index(*index),
                    }))
                    .collect();

                matches.push(JsonPathMatch {
                    path: segments,
                    value: node.node().clone(),
                });
            }
        }
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn located_matches() {
        let vc = json!({
            "vc": { "issuer": "did:example:123" },
            "credentialSubject": { "accounts": [{ "id": "1234567890" }, { "id": "0987654321" }] }
        });

        let matches = JsonPathResolver
            .resolve(&vc, &["$.vc.issuer".into(), "$.issuer".into()])
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(
            serde_json::to_value(&matches[0]).unwrap(),
            json!({ "path": ["$", "vc", "issuer"], "value": "did:example:123" })
        );

        let accounts = JsonPathResolver
            .resolve(&vc, &["$.credentialSubject.accounts[*].id".into()])
            .unwrap();
        assert_eq!(accounts.len(), 2);
        assert_eq!(
            accounts[1].path,
            vec![
                PathSegment::Root,
                PathSegment::Key("credentialSubject".into()),
                PathSegment::Key("accounts".into()),
                PathSegment::Index(1),
                PathSegment::Key("id".into()),
            ]
        );
    }

    #[test]
    fn first_resolving_expression_wins() {
        let vc = json!({ "issuer": "did:foo:123", "vc": { "issuer": "did:example:123" } });

        let matches = JsonPathResolver
            .resolve_first(&vc, &["$.missing".into(), "$.issuer".into(), "$.vc.issuer".into()])
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].value, json!("did:foo:123"));

        let none = JsonPathResolver
            .resolve_first(&vc, &["$.nope".into()])
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn invalid_expression_is_an_error() {
        let err = JsonPathResolver
            .resolve(&json!({}), &["$..[".into()])
            .unwrap_err();
        assert!(matches!(err, ResolveError::InvalidPath { .. }));
    }

    #[test]
    fn path_strings_and_mutable_lookup() {
        let mut doc = json!({ "@context": ["a", "b"], "verifiableCredential": [{ "id": "x" }] });

        let found = JsonPathResolver
            .resolve(&doc, &["$.verifiableCredential[0]".into(), "$['@context'][1]".into()])
            .unwrap();
        assert_eq!(found[0].to_path_string(), "$.verifiableCredential[0]");
        assert_eq!(found[1].to_path_string(), "$['@context'][1]");

        *locate_mut(&mut doc, &found[1].path).unwrap() = json!("c");
        assert_eq!(doc["@context"], json!(["a", "c"]));
        assert!(locate_mut(&mut doc, &[PathSegment::Root, PathSegment::Index(3)]).is_none());
    }

    #[test]
    fn quoted_members_resolve() {
        let doc = json!({ "outer-claim": [{ "id": "a" }] });

        let mut path = String::from("$");
        push_member(&mut path, "outer-claim");
        path.push_str("[0]");
        assert_eq!(path, "$['outer-claim'][0]");

        let found = JsonPathResolver.resolve(&doc, &[path.clone()]).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].to_path_string(), path);

        let mut quoted = String::new();
        push_member(&mut quoted, r"it's a \ key");
        assert_eq!(quoted, r"['it\'s a \\ key']");
    }
}
