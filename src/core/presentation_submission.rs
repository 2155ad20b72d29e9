use super::{credential_format::*, input_descriptor::JsonPath};

use serde::{Deserialize, Serialize};

/// A DescriptorMapId is a unique identifier for a DescriptorMap.
pub type DescriptorMapId = String;

/// Presentation Submissions are objects embedded within target
/// [Claim](https://identity.foundation/presentation-exchange/spec/v1.0.0/#term:claim) negotiation
/// formats that express how the inputs presented as proofs to a
/// [Verifier](https://identity.foundation/presentation-exchange/spec/v1.0.0/#term:verifier) are
/// provided in accordance with the requirements specified in a Presentation Definition.
///
/// Embedded Presentation Submission objects MUST be located within target data format as
/// the value of a `presentation_submission` property.
///
/// For more information, see: [https://identity.foundation/presentation-exchange/spec/v1.0.0/#presentation-submission](https://identity.foundation/presentation-exchange/spec/v1.0.0/#presentation-submission)
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PresentationSubmission {
    id: uuid::Uuid,
    definition_id: DescriptorMapId,
    descriptor_map: Vec<DescriptorMap>,
}

/// What [`PresentationSubmission::merge`] did with a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Merged {
    /// Added as a new top-level entry.
    Appended,
    /// Linked as the deepest `path_nested` level of the entries sharing its id.
    Nested,
    /// The same id and path are already mapped.
    Duplicate,
}

impl Merged {
    /// Whether the descriptor now points at a newly submitted input.
    pub fn accepted(&self) -> bool {
        !matches!(self, Self::Duplicate)
    }
}

impl PresentationSubmission {
    /// The presentation submission MUST contain an id property. The value of this property MUST be a unique identifier, i.e. a UUID.
    ///
    /// The presentation submission object MUST contain a `definition_id` property.
    /// The value of this property MUST be the id value of a valid Presentation Definition.
    pub fn new(
        id: uuid::Uuid,
        definition_id: DescriptorMapId,
        descriptor_map: Vec<DescriptorMap>,
    ) -> Self {
        Self {
            id,
            definition_id,
            descriptor_map,
        }
    }

    /// Return the id of the presentation submission.
    pub fn id(&self) -> &uuid::Uuid {
        &self.id
    }

    /// Return the definition id of the presentation submission.
    pub fn definition_id(&self) -> &String {
        &self.definition_id
    }

    pub fn set_definition_id(&mut self, definition_id: impl Into<DescriptorMapId>) {
        self.definition_id = definition_id.into();
    }

    /// Return the descriptor map of the presentation submission.
    pub fn descriptor_map(&self) -> &Vec<DescriptorMap> {
        &self.descriptor_map
    }

    /// Every submitted path for the given input descriptor id, walking nested levels too.
    pub fn paths_for(&self, id: &str) -> Vec<JsonPath> {
        self.descriptor_map
            .iter()
            .flat_map(|d| d.levels())
            .filter(|level| level.id == id)
            .map(|level| level.path)
            .collect()
    }

    /// Merge a descriptor into the map.
    ///
    /// A descriptor whose id is already mapped at another path is nested
    /// under the existing entries for that id, instead of repeating the id at
    /// the top level.
    pub fn merge(&mut self, descriptor: DescriptorMap) -> Merged {
        let known = self
            .descriptor_map
            .iter()
            .flat_map(|d| d.levels())
            .any(|level| {
                level.id == descriptor.id
                    && level.format == descriptor.format
                    && level.path == descriptor.path
            });
        if known {
            return Merged::Duplicate;
        }

        let mut nested = false;
        for entry in self
            .descriptor_map
            .iter_mut()
            .filter(|d| d.id == descriptor.id)
        {
            entry.push_nested(descriptor.as_level());
            nested = true;
        }

        if nested {
            Merged::Nested
        } else {
            self.descriptor_map.push(descriptor);
            Merged::Appended
        }
    }
}

/// Descriptor Maps are objects used to describe the information a [Holder](https://identity.foundation/presentation-exchange/spec/v1.0.0/#term:holder) provides to a [Verifier](https://identity.foundation/presentation-exchange/spec/v1.0.0/#term:verifier).
///
/// On the wire, nesting is expressed with a recursive `path_nested` object.
/// Here it is held as the ordered list of levels below the top one.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(into = "WireDescriptor", from = "WireDescriptor")]
pub struct DescriptorMap {
    pub id: DescriptorMapId,
    pub format: ClaimFormatDesignation,
    pub path: JsonPath,
    pub path_nested: Vec<DescriptorLevel>,
}

/// One level of a descriptor map.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DescriptorLevel {
    pub id: DescriptorMapId,
    pub format: ClaimFormatDesignation,
    pub path: JsonPath,
}

impl DescriptorMap {
    /// The descriptor map MUST include an `id` property matching an Input Descriptor id,
    /// a `format` property naming a [ClaimFormatDesignation], and a `path` property
    /// locating the submitted Claim from the top-level of the object the submission
    /// is embedded within.
    pub fn new(
        id: impl Into<DescriptorMapId>,
        format: impl Into<ClaimFormatDesignation>,
        path: JsonPath,
    ) -> Self {
        Self {
            id: id.into(),
            format: format.into(),
            path,
            path_nested: Vec::new(),
        }
    }

    /// Link a level below the deepest existing one.
    pub fn push_nested(&mut self, level: DescriptorLevel) {
        self.path_nested.push(level);
    }

    /// The top level followed by every nested level, outermost first.
    pub fn levels(&self) -> impl Iterator<Item = DescriptorLevel> + '_ {
        std::iter::once(self.as_level()).chain(self.path_nested.iter().cloned())
    }

    fn as_level(&self) -> DescriptorLevel {
        DescriptorLevel {
            id: self.id.clone(),
            format: self.format.clone(),
            path: self.path.clone(),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct WireDescriptor {
    id: DescriptorMapId,
    format: ClaimFormatDesignation,
    path: JsonPath,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    path_nested: Option<Box<WireDescriptor>>,
}

impl From<DescriptorMap> for WireDescriptor {
    fn from(descriptor: DescriptorMap) -> Self {
        let path_nested = descriptor
            .path_nested
            .into_iter()
            .rev()
            .fold(None, |inner, level| {
                Some(Box::new(WireDescriptor {
                    id: level.id,
                    format: level.format,
                    path: level.path,
                    path_nested: inner,
                }))
            });

        WireDescriptor {
            id: descriptor.id,
            format: descriptor.format,
            path: descriptor.path,
            path_nested,
        }
    }
}

impl From<WireDescriptor> for DescriptorMap {
    fn from(wire: WireDescriptor) -> Self {
        let mut descriptor = DescriptorMap::new(wire.id, wire.format, wire.path);
        let mut next = wire.path_nested;
        while let Some(level) = next {
            let level = *level;
            descriptor.push_nested(DescriptorLevel {
                id: level.id,
                format: level.format,
                path: level.path,
            });
            next = level.path_nested;
        }
        descriptor
    }
}
