use std::collections::HashMap;

use serde_json::{Map, Value};

use super::{
    path::{locate_mut, push_member, PathSegment},
    StageError,
};
use crate::core::presentation_submission::{DescriptorMap, Merged, PresentationSubmission};

/// The key the submission is embedded under in the returned presentation.
pub const PRESENTATION_SUBMISSION_KEY: &str = "presentation_submission";

/// An input candidate: one element of a named candidate collection.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub collection: &'a str,
    pub index: usize,
    pub value: &'a Value,
}

impl Candidate<'_> {
    /// The path check results use to reference this candidate.
    pub fn path(&self) -> String {
        candidate_path(self.collection, self.index)
    }
}

/// `$.<collection>[<index>]`, quoting the collection name when it is not a
/// plain identifier.
pub fn candidate_path(collection: &str, index: usize) -> String {
    let mut path = String::from("$");
    push_member(&mut path, collection);
    path.push_str(&format!("[{index}]"));
    path
}

/// The presentation under evaluation.
///
/// Candidate collections are the top-level properties holding a non-empty
/// array of objects, discovered once in document order. Once the submission
/// is opened, each collection is moved into a pending pool and its array in
/// the document starts over empty. It is refilled only with accepted candidates.
#[derive(Debug, Clone)]
pub struct WorkingPresentation {
    document: Value,
    credential_collection: String,
    collections: Vec<String>,
    pending: Option<Vec<Vec<Value>>>,
    accepted: HashMap<(usize, usize), usize>,
    submission: Option<PresentationSubmission>,
}

impl WorkingPresentation {
    /// Returns `None` if `document` is not a JSON object.
    pub fn new(document: Value, credential_collection: &str) -> Option<Self> {
        let collections = document
            .as_object()?
            .iter()
            .filter(|(_, value)| is_candidate_collection(value))
            .map(|(name, _)| name.clone())
            .collect();

        Some(Self {
            document,
            credential_collection: credential_collection.to_owned(),
            collections,
            pending: None,
            accepted: HashMap::new(),
            submission: None,
        })
    }

    /// The whole document, as the Path Resolver should see it.
    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Names of the candidate collections, in document order.
    pub fn collections(&self) -> &[String] {
        &self.collections
    }

    /// The current content of the credential collection.
    pub fn credentials(&self) -> &[Value] {
        self.array(&self.credential_collection)
    }

    /// Path of the `index`-th element of the credential collection.
    pub fn credential_path(&self, index: usize) -> String {
        candidate_path(&self.credential_collection, index)
    }

    /// Every input candidate, collection by collection.
    ///
    /// Before the submission is opened the candidates are read from the
    /// document. Afterwards they are read from the pending pool, so they keep
    /// their original indices.
    pub fn candidates(&self) -> Vec<Candidate<'_>> {
        self.collections
            .iter()
            .enumerate()
            .flat_map(|(c, name)| {
                self.source(c)
                    .iter()
                    .enumerate()
                    .map(move |(index, value)| Candidate {
                        collection: name,
                        index,
                        value,
                    })
            })
            .collect()
    }

    /// Mutable access to an input candidate that has not been moved out yet.
    pub fn candidate_mut(&mut self, collection: &str, index: usize) -> Option<&mut Value> {
        let c = self.collection_index(collection)?;
        match self.pending.as_mut() {
            Some(pending) => pending.get_mut(c)?.get_mut(index),
            None => self.document.get_mut(collection)?.get_mut(index),
        }
    }

    /// Mutable access to the value at a concrete path of the document.
    pub fn value_at_mut(&mut self, path: &[PathSegment]) -> Option<&mut Value> {
        locate_mut(&mut self.document, path)
    }

    pub fn submission(&self) -> Option<&PresentationSubmission> {
        self.submission.as_ref()
    }

    /// Create the submission and empty every candidate collection.
    pub fn open_submission(&mut self, id: uuid::Uuid) {
        let mut pending = Vec::with_capacity(self.collections.len());
        if let Some(document) = self.document.as_object_mut() {
            for name in &self.collections {
                let items = match document.insert(name.clone(), Value::Array(Vec::new())) {
                    Some(Value::Array(items)) => items,
                    _ => Vec::new(),
                };
                pending.push(items);
            }
        }

        self.pending = Some(pending);
        self.accepted.clear();
        self.submission = Some(PresentationSubmission::new(id, String::new(), Vec::new()));
    }

    pub fn set_definition_id(&mut self, definition_id: &str) -> Result<(), StageError> {
        self.submission
            .as_mut()
            .ok_or(StageError::SubmissionNotOpen)?
            .set_definition_id(definition_id);
        Ok(())
    }

    /// Where the candidate sits, or will sit once accepted, in the returned presentation.
    pub fn submitted_position(&self, collection: &str, index: usize) -> Option<usize> {
        let c = self.collection_index(collection)?;
        Some(match self.accepted.get(&(c, index)) {
            Some(position) => *position,
            None => self.array(collection).len(),
        })
    }

    /// Merge `descriptor` into the submission. When the submission now maps
    /// a new location, the pending candidate is copied into its collection.
    pub fn map_descriptor(
        &mut self,
        descriptor: DescriptorMap,
        collection: &str,
        index: usize,
    ) -> Result<Merged, StageError> {
        let merged = self
            .submission
            .as_mut()
            .ok_or(StageError::SubmissionNotOpen)?
            .merge(descriptor);

        if merged.accepted() {
            self.accept(collection, index)?;
        }
        Ok(merged)
    }

    fn accept(&mut self, collection: &str, index: usize) -> Result<(), StageError> {
        let missing = || StageError::MalformedCandidate(candidate_path(collection, index));

        let c = self.collection_index(collection).ok_or_else(missing)?;
        if self.accepted.contains_key(&(c, index)) {
            return Ok(());
        }

        let value = self
            .pending
            .as_ref()
            .and_then(|pending| pending.get(c)?.get(index))
            .cloned()
            .ok_or_else(missing)?;

        let Some(Value::Array(items)) = self.document.get_mut(collection) else {
            return Err(missing());
        };
        items.push(value);
        self.accepted.insert((c, index), items.len() - 1);
        Ok(())
    }

    /// The reshaped presentation, with the submission embedded.
    pub fn into_value(self) -> Result<Value, serde_json::Error> {
        let mut document = self.document;
        if let (Some(submission), Some(map)) = (self.submission, document.as_object_mut()) {
            map.insert(
                PRESENTATION_SUBMISSION_KEY.to_owned(),
                serde_json::to_value(submission)?,
            );
        }
        Ok(document)
    }

    fn collection_index(&self, collection: &str) -> Option<usize> {
        self.collections.iter().position(|name| name == collection)
    }

    fn source(&self, c: usize) -> &[Value] {
        match &self.pending {
            Some(pending) => pending.get(c).map(Vec::as_slice).unwrap_or_default(),
            None => self.array(&self.collections[c]),
        }
    }

    fn array(&self, name: &str) -> &[Value] {
        self.document
            .get(name)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

fn is_candidate_collection(value: &Value) -> bool {
    matches!(value.as_array().and_then(|items| items.first()), Some(Value::Object(_)))
}

/// Build a payload object, keeping keys in the given order.
pub(crate) fn payload<const N: usize>(entries: [(&str, Value); N]) -> Value {
    Value::Object(
        entries
            .into_iter()
            .map(|(key, value)| (key.to_owned(), value))
            .collect::<Map<String, Value>>(),
    )
}
