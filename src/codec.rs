//! Conversion of criteria, targets and forests to and from a nested
//! document form.
//!
//! Every criterion level and every target carries a `_metadata` entry whose
//! `kind` tells them apart:
//!
//! ```json
//! {
//!   "AND": [
//!     {"OR": [{"id": "1", "parent_id": null, ..., "_metadata": {"kind": "AdUnit"}}],
//!      "_metadata": {"kind": "Criterion"}},
//!     {"NOT": [{"OR": [...], "_metadata": {"kind": "Criterion"}}],
//!      "_metadata": {"kind": "Criterion"}}
//!   ],
//!   "_metadata": {"kind": "Criterion"}
//! }
//! ```
use crate::{
    criterion::{Criterion, Member, Operator},
    error::{Result, TargetingError},
    forest::ForestNode,
    target::{Target, RESERVED_FIELDS},
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use tracing::trace;

const METADATA: &str = "_metadata";
const CRITERION_KIND: &str = "Criterion";

#[derive(Debug, Deserialize, Serialize)]
struct Metadata {
    kind: String,
}

#[derive(Debug, Deserialize, Serialize)]
struct TargetDoc {
    id: String,
    parent_id: Option<String>,
    name: Option<String>,
    external_id: Option<String>,
    external_name: Option<String>,
    descriptive_name: Option<String>,
    #[serde(flatten)]
    attributes: BTreeMap<String, Value>,
    #[serde(rename = "_metadata")]
    metadata: Metadata,
}

impl From<&Target> for TargetDoc {
    fn from(target: &Target) -> Self {
        Self {
            id: target.id().to_string(),
            parent_id: target.parent_id().map(str::to_string),
            name: target.name().map(str::to_string),
            external_id: target.external_id().map(str::to_string),
            external_name: target.external_name().map(str::to_string),
            descriptive_name: target.descriptive_name().map(str::to_string),
            attributes: target.attributes().clone(),
            metadata: Metadata {
                kind: target.kind().name().to_string(),
            },
        }
    }
}

impl TryFrom<TargetDoc> for Target {
    type Error = TargetingError;

    fn try_from(doc: TargetDoc) -> Result<Self> {
        if let Some(key) = doc
            .attributes
            .keys()
            .find(|key| RESERVED_FIELDS.contains(&key.as_str()))
        {
            return Err(TargetingError::MalformedDocument(format!(
                "target attribute {key:?} shadows a core field"
            )));
        }
        Ok(Target::from_parts(
            doc.metadata.kind.parse()?,
            doc.id,
            doc.parent_id,
            doc.name,
            doc.external_id,
            doc.external_name,
            doc.descriptive_name,
            doc.attributes,
        ))
    }
}

#[derive(Debug, Deserialize, Serialize)]
struct ForestDoc {
    node: Option<TargetDoc>,
    #[serde(default)]
    children: Vec<ForestDoc>,
    depth: Option<usize>,
}

impl From<&ForestNode<Target>> for ForestDoc {
    fn from(node: &ForestNode<Target>) -> Self {
        Self {
            node: node.value().map(TargetDoc::from),
            children: node.children().iter().map(ForestDoc::from).collect(),
            depth: node.depth(),
        }
    }
}

impl TryFrom<ForestDoc> for ForestNode<Target> {
    type Error = TargetingError;

    fn try_from(doc: ForestDoc) -> Result<Self> {
        let value = doc.node.map(Target::try_from).transpose()?;
        let children = doc
            .children
            .into_iter()
            .map(ForestNode::<Target>::try_from)
            .collect::<Result<Vec<_>>>()?;
        Ok(ForestNode::new(value, children, doc.depth))
    }
}

fn metadata_kind(doc: &Map<String, Value>) -> Result<&str> {
    doc.get(METADATA)
        .and_then(|metadata| metadata.get("kind"))
        .and_then(Value::as_str)
        .ok_or_else(|| TargetingError::MalformedDocument(format!("missing {METADATA}.kind")))
}

impl Target {
    pub fn to_doc(&self) -> Result<Value> {
        Ok(serde_json::to_value(TargetDoc::from(self))?)
    }

    pub fn from_doc(doc: &Value) -> Result<Self> {
        let doc: TargetDoc = serde_json::from_value(doc.clone())?;
        Target::try_from(doc)
    }
}

impl Criterion {
    pub fn to_doc(&self) -> Result<Value> {
        let (operator, members) = match self {
            Criterion::Combine { members, .. } => (
                self.operator(),
                members
                    .iter()
                    .map(|member| match member {
                        Member::Target(target) => target.to_doc(),
                        Member::Criterion(criterion) => criterion.to_doc(),
                    })
                    .collect::<Result<Vec<_>>>()?,
            ),
            Criterion::Not(criterion) => (Operator::Not, vec![criterion.to_doc()?]),
        };

        let mut doc = Map::new();
        doc.insert(operator.name().to_string(), Value::Array(members));
        doc.insert(METADATA.to_string(), json!({ "kind": CRITERION_KIND }));
        Ok(Value::Object(doc))
    }

    /// Rebuilds a criterion from [`Criterion::to_doc`] output.
    ///
    /// Each member document is decoded as a criterion or a target according
    /// to its own `_metadata.kind`.
    pub fn from_doc(doc: &Value) -> Result<Self> {
        let doc = doc.as_object().ok_or_else(|| {
            TargetingError::MalformedDocument("criterion document is not a mapping".to_string())
        })?;
        let kind = metadata_kind(doc)?;
        if kind != CRITERION_KIND {
            return Err(TargetingError::MalformedDocument(format!(
                "expected a {CRITERION_KIND} document, found {kind}"
            )));
        }

        let mut entries = doc.iter().filter(|(key, _)| key.as_str() != METADATA);
        let (operator, members) = match (entries.next(), entries.next()) {
            (Some(entry), None) => entry,
            _ => {
                return Err(TargetingError::MalformedDocument(
                    "criterion document needs exactly one operator".to_string(),
                ))
            }
        };
        let operator: Operator = operator.parse()?;
        let members = members.as_array().ok_or_else(|| {
            TargetingError::MalformedDocument(format!("{operator} members are not a list"))
        })?;
        trace!(%operator, members = members.len(), "decoding criterion");

        let members = members
            .iter()
            .map(|member| {
                let object = member.as_object().ok_or_else(|| {
                    TargetingError::MalformedDocument("member document is not a mapping".to_string())
                })?;
                if metadata_kind(object)? == CRITERION_KIND {
                    Criterion::from_doc(member).map(Member::Criterion)
                } else {
                    Target::from_doc(member).map(Member::Target)
                }
            })
            .collect::<Result<Vec<_>>>()?;

        Criterion::new(members, operator)
    }
}

impl ForestNode<Target> {
    /// `{"node": <target or null>, "children": [...], "depth": <int or null>}`
    pub fn to_doc(&self) -> Result<Value> {
        Ok(serde_json::to_value(ForestDoc::from(self))?)
    }

    pub fn from_doc(doc: &Value) -> Result<Self> {
        let doc: ForestDoc = serde_json::from_value(doc.clone())?;
        ForestNode::try_from(doc)
    }
}
