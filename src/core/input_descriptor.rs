use crate::utils::NonEmptyVec;

use jsonschema::{JSONSchema, ValidationError};
use serde::{Deserialize, Serialize};

/// A GroupId represents a unique identifier for a group of Input Descriptors.
pub type GroupId = String;

/// A JSONPath is a string that represents a path to a specific value within a JSON object.
///
/// For syntax details, see [https://identity.foundation/presentation-exchange/spec/v1.0.0/#jsonpath-syntax-definition](https://identity.foundation/presentation-exchange/spec/v1.0.0/#jsonpath-syntax-definition)
pub type JsonPath = String;

/// The `required` / `preferred` switch shared by several Presentation Exchange
/// features (`limit_disclosure`, `subject_is_issuer`, `predicate` and the
/// `directive` of relational constraints).
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Optionality {
    Required,
    Preferred,
}

impl Optionality {
    pub fn is_required(&self) -> bool {
        matches!(self, Self::Required)
    }
}

/// A schema the candidate credential is expected to declare in its
/// `credentialSchema` list.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchemaRef {
    pub uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
}

impl SchemaRef {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            required: None,
        }
    }
}

/// Input Descriptors are objects used to describe the information a
/// [Verifier](https://identity.foundation/presentation-exchange/spec/v1.0.0/#term:verifier) requires of a
/// [Holder](https://identity.foundation/presentation-exchange/spec/v1.0.0/#term:holder).
///
/// See: [https://identity.foundation/presentation-exchange/spec/v1.0.0/#input-descriptor-object](https://identity.foundation/presentation-exchange/spec/v1.0.0/#input-descriptor-object)
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct InputDescriptor {
    id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    group: Vec<GroupId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    schema: Vec<SchemaRef>,
    #[serde(default)]
    constraints: Constraints,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    purpose: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<serde_json::Value>,
}

impl InputDescriptor {
    /// Create a new instance of the input descriptor with the given id and constraints.
    ///
    /// The Input Descriptor Object MUST contain an id property. The value of the id
    /// property MUST be a string that does not conflict with the id of another
    /// Input Descriptor Object in the same Presentation Definition.
    pub fn new(id: String, constraints: Constraints) -> Self {
        Self {
            id,
            constraints,
            ..Default::default()
        }
    }

    /// Return the id of the input descriptor.
    pub fn id(&self) -> &str {
        self.id.as_str()
    }

    /// Return the constraints of the input descriptor.
    pub fn constraints(&self) -> &Constraints {
        &self.constraints
    }

    /// Add a schema URI the submitted credential must declare.
    pub fn add_schema(mut self, schema: SchemaRef) -> Self {
        self.schema.push(schema);
        self
    }

    /// Return the schema references of the input descriptor.
    pub fn schema(&self) -> &[SchemaRef] {
        &self.schema
    }

    /// Return a mutable reference to the schema references.
    pub fn schema_mut(&mut self) -> &mut Vec<SchemaRef> {
        &mut self.schema
    }

    /// Return the schema URIs, in declaration order.
    pub fn schema_uris(&self) -> Vec<&str> {
        self.schema.iter().map(|s| s.uri.as_str()).collect()
    }

    /// Set the group of the input descriptor.
    pub fn set_group(mut self, group: Vec<GroupId>) -> Self {
        self.group = group;
        self
    }

    /// Return the groups the input descriptor belongs to.
    pub fn groups(&self) -> &[GroupId] {
        &self.group
    }

    pub fn set_name(mut self, name: String) -> Self {
        self.name = Some(name);
        self
    }

    pub fn name(&self) -> Option<&String> {
        self.name.as_ref()
    }

    /// Set the purpose of the input descriptor.
    ///
    /// If present, the purpose MUST be a string that describes the purpose for which the
    /// [Claim](https://identity.foundation/presentation-exchange/spec/v1.0.0/#term:claim)'s
    /// data is being requested.
    pub fn set_purpose(mut self, purpose: String) -> Self {
        self.purpose = Some(purpose);
        self
    }

    pub fn purpose(&self) -> Option<&String> {
        self.purpose.as_ref()
    }

    /// Return the raw format object of the input descriptor, if any.
    pub fn format(&self) -> Option<&serde_json::Value> {
        self.format.as_ref()
    }

    /// Return the constraints field declaring the given field `id`, if any.
    pub fn field_by_id(&self, field_id: &str) -> Option<&ConstraintsField> {
        self.constraints
            .fields
            .iter()
            .find(|field| field.id.as_deref() == Some(field_id))
    }
}

/// Constraints are objects used to describe the constraints that a [Holder](https://identity.foundation/presentation-exchange/spec/v1.0.0/#term:holder) must satisfy to fulfill an Input Descriptor.
///
/// A constraint object MAY be empty, or it may include `fields`, `limit_disclosure`
/// and the relational constraint features (`subject_is_issuer`, `same_subject`, `is_holder`).
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Constraints {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    fields: Vec<ConstraintsField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit_disclosure: Option<Optionality>,
    #[serde(skip_serializing_if = "Option::is_none")]
    subject_is_issuer: Option<Optionality>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    same_subject: Vec<SameSubject>,
    // Accepted for round-tripping, holder binding needs proof verification.
    #[serde(skip_serializing_if = "Option::is_none")]
    is_holder: Option<serde_json::Value>,
}

impl Constraints {
    /// Returns an empty Constraints object.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a new field constraint to the constraints list.
    pub fn add_constraint(mut self, field: ConstraintsField) -> Self {
        self.fields.push(field);
        self
    }

    /// Returns the fields of the constraints object.
    pub fn fields(&self) -> &[ConstraintsField] {
        &self.fields
    }

    /// Set the limit disclosure value.
    ///
    /// For all Claims submitted in relation to [InputDescriptor] Objects that include a `constraints`
    /// object with a `limit_disclosure` property set to the string value `required`,
    /// ensure that the data submitted is limited to the entries specified in the `fields` property of the `constraints` object.
    ///
    /// For more information: see [https://identity.foundation/presentation-exchange/spec/v1.0.0/#limited-disclosure-submissions](https://identity.foundation/presentation-exchange/spec/v1.0.0/#limited-disclosure-submissions)
    pub fn set_limit_disclosure(mut self, limit_disclosure: Optionality) -> Self {
        self.limit_disclosure = Some(limit_disclosure);
        self
    }

    pub fn limit_disclosure(&self) -> Option<Optionality> {
        self.limit_disclosure
    }

    /// Set the `subject_is_issuer` relational constraint.
    pub fn set_subject_is_issuer(mut self, subject_is_issuer: Optionality) -> Self {
        self.subject_is_issuer = Some(subject_is_issuer);
        self
    }

    pub fn subject_is_issuer(&self) -> Option<Optionality> {
        self.subject_is_issuer
    }

    /// Add a `same_subject` relational constraint.
    pub fn add_same_subject(mut self, same_subject: SameSubject) -> Self {
        self.same_subject.push(same_subject);
        self
    }

    pub fn same_subject(&self) -> &[SameSubject] {
        &self.same_subject
    }
}

/// A `same_subject` relational constraint: the fields listed by id MUST be
/// about the same subject.
///
/// See: [https://identity.foundation/presentation-exchange/spec/v1.0.0/#relational-constraint-feature](https://identity.foundation/presentation-exchange/spec/v1.0.0/#relational-constraint-feature)
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SameSubject {
    pub field_id: NonEmptyVec<String>,
    #[serde(default = "SameSubject::default_directive")]
    pub directive: Optionality,
}

impl SameSubject {
    pub fn new(field_id: NonEmptyVec<String>, directive: Optionality) -> Self {
        Self {
            field_id,
            directive,
        }
    }

    fn default_directive() -> Optionality {
        Optionality::Required
    }
}

/// ConstraintsField objects are used to describe the constraints that a
/// [Holder](https://identity.foundation/presentation-exchange/spec/v1.0.0/#term:holder)
/// must satisfy to fulfill an Input Descriptor.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConstraintsField {
    path: NonEmptyVec<JsonPath>,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    purpose: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    predicate: Option<Optionality>,
    #[serde(skip_serializing_if = "Option::is_none")]
    optional: Option<bool>,
}

impl From<NonEmptyVec<JsonPath>> for ConstraintsField {
    fn from(path: NonEmptyVec<JsonPath>) -> Self {
        Self {
            path,
            id: None,
            purpose: None,
            filter: None,
            predicate: None,
            optional: None,
        }
    }
}

impl ConstraintsField {
    /// Create a new instance of the constraints field with the given path.
    pub fn new(path: impl Into<JsonPath>) -> ConstraintsField {
        NonEmptyVec::new(path.into()).into()
    }

    /// Add a fallback path, tried after the previous ones found nothing.
    pub fn add_path(mut self, path: impl Into<JsonPath>) -> Self {
        self.path.push(path.into());
        self
    }

    /// Return the paths of the constraints field, in evaluation order.
    pub fn path(&self) -> &NonEmptyVec<JsonPath> {
        &self.path
    }

    pub fn set_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn set_purpose(mut self, purpose: String) -> Self {
        self.purpose = Some(purpose);
        self
    }

    pub fn purpose(&self) -> Option<&String> {
        self.purpose.as_ref()
    }

    /// Set the filter of the constraints field.
    ///
    /// If present its value MUST be a JSON Schema descriptor used to filter against
    /// the values returned from evaluation of the JSONPath string expressions in the path array.
    pub fn set_filter(mut self, filter: serde_json::Value) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn filter(&self) -> Option<&serde_json::Value> {
        self.filter.as_ref()
    }

    /// Set the predicate of the constraints field.
    ///
    /// If the predicate property is present, the filter property **MUST** also be present.
    ///
    /// See: [https://identity.foundation/presentation-exchange/spec/v1.0.0/#predicate-feature](https://identity.foundation/presentation-exchange/spec/v1.0.0/#predicate-feature)
    pub fn set_predicate(mut self, predicate: Optionality) -> Self {
        self.predicate = Some(predicate);
        self
    }

    pub fn predicate(&self) -> Option<Optionality> {
        self.predicate
    }

    /// Return a JSON schema validator using the internal filter.
    ///
    /// If no filter is provided on the constraint field, this
    /// will return None.
    pub fn validator(&self) -> Option<Result<JSONSchema, ValidationError<'_>>> {
        self.filter.as_ref().map(JSONSchema::compile)
    }

    pub fn set_optional(mut self, optional: bool) -> Self {
        self.optional = Some(optional);
        self
    }

    /// Return the optional value of the constraints field.
    pub fn is_optional(&self) -> bool {
        self.optional.unwrap_or(false)
    }

    /// Inverse alias for `!is_optional()`.
    pub fn is_required(&self) -> bool {
        !self.is_optional()
    }
}
