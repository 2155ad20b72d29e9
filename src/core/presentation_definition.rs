use super::input_descriptor::*;

use serde::{Deserialize, Serialize};

/// A presentation definition is a JSON object that describes the information a [Verifier](https://identity.foundation/presentation-exchange/spec/v1.0.0/#term:verifier) requires of a [Holder](https://identity.foundation/presentation-exchange/spec/v1.0.0/#term:holder).
///
/// Presentation Definitions are composed of inputs, which describe the forms and details of the
/// proofs they require. The evaluator reads them and never modifies them.
///
/// For more information, see: [https://identity.foundation/presentation-exchange/spec/v1.0.0/#presentation-definition](https://identity.foundation/presentation-exchange/spec/v1.0.0/#presentation-definition)
#[derive(Clone, Default, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PresentationDefinition {
    id: String,
    input_descriptors: Vec<InputDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    purpose: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<serde_json::Value>,
}

impl PresentationDefinition {
    /// The Presentation Definition MUST contain an id property and at least
    /// one Input Descriptor.
    pub fn new(id: String, input_descriptor: InputDescriptor) -> Self {
        Self {
            id,
            input_descriptors: vec![input_descriptor],
            ..Default::default()
        }
    }

    /// Return the id of the presentation definition.
    pub fn id(&self) -> &String {
        &self.id
    }

    /// Add a new input descriptor to the presentation definition.
    pub fn add_input_descriptors(mut self, input_descriptor: InputDescriptor) -> Self {
        self.input_descriptors.push(input_descriptor);
        self
    }

    /// Return the input descriptors of the presentation definition.
    pub fn input_descriptors(&self) -> &Vec<InputDescriptor> {
        &self.input_descriptors
    }

    /// Return a mutable reference to the input descriptors of the presentation definition.
    pub fn input_descriptors_mut(&mut self) -> &mut Vec<InputDescriptor> {
        &mut self.input_descriptors
    }

    pub fn set_name(mut self, name: String) -> Self {
        self.name = Some(name);
        self
    }

    pub fn name(&self) -> Option<&String> {
        self.name.as_ref()
    }

    pub fn set_purpose(mut self, purpose: String) -> Self {
        self.purpose = Some(purpose);
        self
    }

    pub fn purpose(&self) -> Option<&String> {
        self.purpose.as_ref()
    }

    pub fn format(&self) -> Option<&serde_json::Value> {
        self.format.as_ref()
    }

    /// Input descriptors paired with the `$.input_descriptors[i]` path that
    /// check results use to reference them.
    pub fn indexed_descriptors(&self) -> impl Iterator<Item = (String, &InputDescriptor)> {
        self.input_descriptors
            .iter()
            .enumerate()
            .map(|(i, d)| (input_descriptor_path(i), d))
    }

    /// Find every input descriptor declaring a constraints field with the given `id`.
    pub fn descriptors_with_field(&self, field_id: &str) -> Vec<&InputDescriptor> {
        self.input_descriptors
            .iter()
            .filter(|d| d.field_by_id(field_id).is_some())
            .collect()
    }
}

/// The path of the `index`-th input descriptor, as written in check results.
pub fn input_descriptor_path(index: usize) -> String {
    format!("$.input_descriptors[{index}]")
}
