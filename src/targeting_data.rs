use crate::{
    criterion::Criterion,
    error::{Result, TargetingError},
};
use serde_json::{json, Map, Value};
use std::{fmt, str::FromStr};

const METADATA: &str = "_metadata";
const TARGETING_DATA_KIND: &str = "TargetingData";

/// A targeting dimension of a line item.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Dimension {
    Inventory,
    Geography,
    DayPart,
    UserDomain,
    Technology,
    VideoContent,
    VideoPosition,
    Custom,
}

impl Dimension {
    pub const ALL: [Dimension; 8] = [
        Self::Inventory,
        Self::Geography,
        Self::DayPart,
        Self::UserDomain,
        Self::Technology,
        Self::VideoContent,
        Self::VideoPosition,
        Self::Custom,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Inventory => "inventory",
            Self::Geography => "geography",
            Self::DayPart => "day_part",
            Self::UserDomain => "user_domain",
            Self::Technology => "technology",
            Self::VideoContent => "video_content",
            Self::VideoPosition => "video_position",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dimension {
    type Err = TargetingError;

    fn from_str(value: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|dimension| dimension.name() == value)
            .ok_or_else(|| {
                TargetingError::MalformedDocument(format!("unknown targeting dimension {value:?}"))
            })
    }
}

/// One optional criterion per targeting dimension.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TargetingData {
    criteria: [Option<Criterion>; 8],
}

impl TargetingData {
    pub fn with(mut self, dimension: Dimension, criterion: Criterion) -> Self {
        self.criteria[dimension as usize] = Some(criterion);
        self
    }

    pub fn get(&self, dimension: Dimension) -> Option<&Criterion> {
        self.criteria[dimension as usize].as_ref()
    }

    pub fn take(&mut self, dimension: Dimension) -> Option<Criterion> {
        self.criteria[dimension as usize].take()
    }

    /// The dimensions that carry a criterion, in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (Dimension, &Criterion)> {
        Dimension::ALL
            .into_iter()
            .filter_map(|dimension| self.get(dimension).map(|criterion| (dimension, criterion)))
    }

    /// Every dimension is emitted, `null` when it carries no criterion.
    pub fn to_doc(&self) -> Result<Value> {
        let mut doc = Map::new();
        for dimension in Dimension::ALL {
            let criterion = match self.get(dimension) {
                Some(criterion) => criterion.to_doc()?,
                None => Value::Null,
            };
            doc.insert(dimension.name().to_string(), criterion);
        }
        doc.insert(METADATA.to_string(), json!({ "kind": TARGETING_DATA_KIND }));
        Ok(Value::Object(doc))
    }

    /// Missing and `null` dimensions decode to no criterion.
    pub fn from_doc(doc: &Value) -> Result<Self> {
        let doc = doc.as_object().ok_or_else(|| {
            TargetingError::MalformedDocument("targeting document is not a mapping".to_string())
        })?;
        let kind = doc
            .get(METADATA)
            .and_then(|metadata| metadata.get("kind"))
            .and_then(Value::as_str);
        if kind != Some(TARGETING_DATA_KIND) {
            return Err(TargetingError::MalformedDocument(format!(
                "expected a {TARGETING_DATA_KIND} document, found {kind:?}"
            )));
        }

        doc.iter()
            .filter(|(key, value)| key.as_str() != METADATA && !value.is_null())
            .try_fold(Self::default(), |data, (key, value)| {
                Ok(data.with(key.parse()?, Criterion::from_doc(value)?))
            })
    }
}
