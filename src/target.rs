use crate::error::{Result, TargetingError};
use serde_json::Value;
use std::{
    collections::BTreeMap,
    fmt,
    hash::{Hash, Hasher},
    str::FromStr,
};

/// Names that an auxiliary attribute may not take.
pub const RESERVED_FIELDS: [&str; 8] = [
    "kind",
    "id",
    "parent_id",
    "name",
    "external_id",
    "external_name",
    "descriptive_name",
    "_metadata",
];

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum TargetKind {
    AdUnit,
    Placement,
    Geography,
    Technology,
    Custom,
    VideoContent,
    VideoPosition,
}

impl TargetKind {
    pub const ALL: [TargetKind; 7] = [
        Self::AdUnit,
        Self::Placement,
        Self::Geography,
        Self::Technology,
        Self::Custom,
        Self::VideoContent,
        Self::VideoPosition,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::AdUnit => "AdUnit",
            Self::Placement => "Placement",
            Self::Geography => "Geography",
            Self::Technology => "Technology",
            Self::Custom => "Custom",
            Self::VideoContent => "VideoContent",
            Self::VideoPosition => "VideoPosition",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TargetKind {
    type Err = TargetingError;

    fn from_str(value: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == value)
            .ok_or_else(|| TargetingError::MalformedDocument(format!("unknown target kind {value:?}")))
    }
}

/// An atomic, identity-bearing value that can be targeted by a
/// [`Criterion`](crate::Criterion).
///
/// Equality is structural over every field, including the auxiliary
/// attributes (`type`, `version`, `id_key`, `include_descendants`,
/// `adunits`, ...) that some kinds carry as arbitrary document values.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Target {
    kind: TargetKind,
    id: String,
    parent_id: Option<String>,
    name: Option<String>,
    external_id: Option<String>,
    external_name: Option<String>,
    descriptive_name: Option<String>,
    attributes: BTreeMap<String, Value>,
}

// `Value` has no `Hash`; its serialized form is stable for equal values.
impl Hash for Target {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.id.hash(state);
        self.parent_id.hash(state);
        self.name.hash(state);
        self.external_id.hash(state);
        self.external_name.hash(state);
        self.descriptive_name.hash(state);
        for (key, value) in &self.attributes {
            key.hash(state);
            value.to_string().hash(state);
        }
    }
}

impl Target {
    pub fn new(kind: TargetKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            parent_id: None,
            name: None,
            external_id: None,
            external_name: None,
            descriptive_name: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn ad_unit(id: impl Into<String>) -> Self {
        Self::new(TargetKind::AdUnit, id)
    }

    pub fn placement(id: impl Into<String>) -> Self {
        Self::new(TargetKind::Placement, id)
    }

    pub fn geography(id: impl Into<String>) -> Self {
        Self::new(TargetKind::Geography, id)
    }

    pub fn technology(id: impl Into<String>) -> Self {
        Self::new(TargetKind::Technology, id)
    }

    pub fn custom(id: impl Into<String>) -> Self {
        Self::new(TargetKind::Custom, id)
    }

    pub fn video_content(id: impl Into<String>) -> Self {
        Self::new(TargetKind::VideoContent, id)
    }

    pub fn video_position(id: impl Into<String>) -> Self {
        Self::new(TargetKind::VideoPosition, id)
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

    pub fn with_external_name(mut self, external_name: impl Into<String>) -> Self {
        self.external_name = Some(external_name.into());
        self
    }

    pub fn with_descriptive_name(mut self, descriptive_name: impl Into<String>) -> Self {
        self.descriptive_name = Some(descriptive_name.into());
        self
    }

    /// Adds an auxiliary attribute, failing when `key` names a core field.
    pub fn with_attribute(
        mut self,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<Self> {
        let key = key.into();
        if RESERVED_FIELDS.contains(&key.as_str()) {
            return Err(TargetingError::InvalidArgument(format!(
                "attribute {key:?} would shadow a core field"
            )));
        }
        self.attributes.insert(key, value.into());
        Ok(self)
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        kind: TargetKind,
        id: String,
        parent_id: Option<String>,
        name: Option<String>,
        external_id: Option<String>,
        external_name: Option<String>,
        descriptive_name: Option<String>,
        attributes: BTreeMap<String, Value>,
    ) -> Self {
        Self {
            kind,
            id,
            parent_id,
            name,
            external_id,
            external_name,
            descriptive_name,
            attributes,
        }
    }

    pub fn kind(&self) -> TargetKind {
        self.kind
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn external_id(&self) -> Option<&str> {
        self.external_id.as_deref()
    }

    pub fn external_name(&self) -> Option<&str> {
        self.external_name.as_deref()
    }

    pub fn descriptive_name(&self) -> Option<&str> {
        self.descriptive_name.as_deref()
    }

    pub fn attributes(&self) -> &BTreeMap<String, Value> {
        &self.attributes
    }

    /// Looks a field up by name: a core field first, then a string-valued
    /// auxiliary attribute.
    pub fn field(&self, name: &str) -> Option<&str> {
        match name {
            "kind" => Some(self.kind.name()),
            "id" => Some(&self.id),
            "parent_id" => self.parent_id(),
            "name" => self.name(),
            "external_id" => self.external_id(),
            "external_name" => self.external_name(),
            "descriptive_name" => self.descriptive_name(),
            other => self.attributes.get(other).and_then(Value::as_str),
        }
    }

    pub fn set_external_name(&mut self, external_name: impl Into<String>) {
        self.external_name = Some(external_name.into());
    }
}
