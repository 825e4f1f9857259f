use crate::{
    error::{Result, TargetingError},
    target::Target,
};
use itertools::Itertools;
use std::{collections::HashSet, fmt, ops, str::FromStr};
use tracing::{debug, trace};

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Operator {
    Or,
    And,
    Not,
}

impl Operator {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Or => "OR",
            Self::And => "AND",
            Self::Not => "NOT",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Operator {
    type Err = TargetingError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "OR" => Ok(Self::Or),
            "AND" => Ok(Self::And),
            "NOT" => Ok(Self::Not),
            other => Err(TargetingError::InvalidArgument(format!(
                "invalid operator {other:?}"
            ))),
        }
    }
}

/// The operator of a [`Criterion::Combine`] node.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Connective {
    Or,
    And,
}

impl fmt::Display for Connective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(Operator::from(*self).name())
    }
}

impl From<Connective> for Operator {
    fn from(connective: Connective) -> Self {
        match connective {
            Connective::Or => Operator::Or,
            Connective::And => Operator::And,
        }
    }
}

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Member {
    Target(Target),
    Criterion(Criterion),
}

impl From<Target> for Member {
    fn from(target: Target) -> Self {
        Self::Target(target)
    }
}

impl From<Criterion> for Member {
    fn from(criterion: Criterion) -> Self {
        Self::Criterion(criterion)
    }
}

impl Member {
    fn is_target(&self) -> bool {
        matches!(self, Self::Target(_))
    }
}

/// A boolean combination of targets.
///
/// Equality is structural and order sensitive: two `OR` nodes holding the
/// same targets in a different order are different criteria.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Criterion {
    Combine {
        connective: Connective,
        members: Vec<Member>,
    },
    Not(Box<Criterion>),
}

impl From<Target> for Criterion {
    fn from(target: Target) -> Self {
        Self::any_of([target])
    }
}

impl Criterion {
    /// Builds a criterion from an explicit member list and operator.
    ///
    /// A negation wraps exactly one member; a bare target under `NOT` is
    /// wrapped in a single-element `OR` first.
    pub fn new(members: Vec<Member>, operator: Operator) -> Result<Self> {
        match operator {
            Operator::Or => Ok(Self::combined(Connective::Or, members)),
            Operator::And => Ok(Self::combined(Connective::And, members)),
            Operator::Not => {
                let member = members.into_iter().exactly_one().map_err(|rest| {
                    TargetingError::InvalidArgument(format!(
                        "NOT expects exactly one member, got {}",
                        rest.count()
                    ))
                })?;
                let negated = match member {
                    Member::Target(target) => Self::from(target),
                    Member::Criterion(criterion) => criterion,
                };
                Ok(negated.negate())
            }
        }
    }

    pub fn combined(connective: Connective, members: Vec<Member>) -> Self {
        Self::Combine {
            connective,
            members,
        }
    }

    pub fn any_of(targets: impl IntoIterator<Item = Target>) -> Self {
        Self::combined(Connective::Or, targets.into_iter().map(Member::from).collect())
    }

    pub fn all_of(targets: impl IntoIterator<Item = Target>) -> Self {
        Self::combined(Connective::And, targets.into_iter().map(Member::from).collect())
    }

    pub fn operator(&self) -> Operator {
        match self {
            Self::Combine { connective, .. } => Operator::from(*connective),
            Self::Not(_) => Operator::Not,
        }
    }

    /// The direct members of a `Combine` node, `None` for a negation.
    pub fn members(&self) -> Option<&[Member]> {
        match self {
            Self::Combine { members, .. } => Some(members),
            Self::Not(_) => None,
        }
    }

    /// Always wraps, even when `self` is already a negation.
    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Joins two criteria under `connective`, splicing their members into a
    /// single node when both sides already agree with it.
    ///
    /// A side agrees when its own connective matches or it holds at most one
    /// member. Splicing also requires the first members of both sides to be
    /// of the same kind (both targets or both criteria). Negations are never
    /// spliced through. Members are concatenated as they are, without
    /// de-duplication.
    pub fn combine(first: Criterion, second: Criterion, connective: Connective) -> Criterion {
        match (first, second) {
            (
                Self::Combine {
                    connective: left_connective,
                    members: left,
                },
                Self::Combine {
                    connective: right_connective,
                    members: right,
                },
            ) if Self::is_extendable(left_connective, &left, connective)
                && Self::is_extendable(right_connective, &right, connective)
                && Self::same_leading_kind(&left, &right) =>
            {
                trace!(%connective, left = left.len(), right = right.len(), "splicing members");
                let mut members = left;
                members.extend(right);
                Self::combined(connective, members)
            }
            (first, second) => {
                trace!(%connective, "wrapping both sides");
                Self::combined(connective, vec![first.into(), second.into()])
            }
        }
    }

    fn is_extendable(own: Connective, members: &[Member], requested: Connective) -> bool {
        own == requested || members.len() <= 1
    }

    // An empty side has no leading member and never blocks a splice.
    fn same_leading_kind(left: &[Member], right: &[Member]) -> bool {
        match (left.first(), right.first()) {
            (Some(a), Some(b)) => a.is_target() == b.is_target(),
            _ => true,
        }
    }

    /// Every target mentioned anywhere in the criterion, negated or not, in
    /// document order.
    pub fn flatten(&self) -> Vec<&Target> {
        let mut targets = vec![];
        self.collect_targets(&mut targets);
        targets
    }

    fn collect_targets<'a>(&'a self, targets: &mut Vec<&'a Target>) {
        match self {
            Self::Combine { members, .. } => {
                for member in members {
                    match member {
                        Member::Target(target) => targets.push(target),
                        Member::Criterion(criterion) => criterion.collect_targets(targets),
                    }
                }
            }
            Self::Not(criterion) => criterion.collect_targets(targets),
        }
    }

    fn collect_includes<'a>(&'a self, targets: &mut Vec<&'a Target>) {
        if let Self::Combine { members, .. } = self {
            for member in members {
                match member {
                    Member::Target(target) => targets.push(target),
                    Member::Criterion(criterion) => criterion.collect_includes(targets),
                }
            }
        }
    }

    /// Splits the targets into the ones outside of any negation and the rest.
    ///
    /// This is a heuristic rather than a boolean solver: the split is only
    /// faithful for criteria shaped like `(OR: [a, b]) AND (NOT: OR: [c, d])`.
    /// Deeper nesting can misclassify targets. Both lists are de-duplicated
    /// and keep the order of first appearance.
    pub fn includes_and_excludes(&self) -> (Vec<&Target>, Vec<&Target>) {
        let mut includes = vec![];
        self.collect_includes(&mut includes);
        let includes: Vec<&Target> = includes.into_iter().unique().collect();

        let included: HashSet<&Target> = includes.iter().copied().collect();
        let excludes = self
            .flatten()
            .into_iter()
            .unique()
            .filter(|target| !included.contains(target))
            .collect();

        (includes, excludes)
    }

    /// Removes a single-target criterion from the top level of an `AND`.
    ///
    /// `target` matches either a bare target member equal to its only
    /// target or a member equal to `target` itself. What remains is
    /// re-wrapped: nothing left gives `None`, a lone criterion is returned
    /// as is and a lone target becomes a single `OR`.
    pub fn remove_target(&self, target: &Criterion) -> Result<Option<Criterion>> {
        if self == target {
            return Ok(None);
        }

        let members = match self {
            Self::Combine {
                connective: Connective::And,
                members,
            } => members,
            _ => {
                return Err(TargetingError::InvalidStructure(format!(
                    "expected a top-level AND, found {}",
                    self.operator()
                )))
            }
        };

        let inner = match target {
            Self::Combine { members, .. } => match members.as_slice() {
                [Member::Target(inner)] => Some(inner),
                _ => None,
            },
            Self::Not(_) => None,
        }
        .ok_or_else(|| {
            TargetingError::InvalidStructure(
                "target should be a criterion holding a single target".to_string(),
            )
        })?;

        let by_criterion = members
            .iter()
            .position(|member| matches!(member, Member::Criterion(c) if c == target));
        let by_target = members
            .iter()
            .position(|member| matches!(member, Member::Target(t) if t == inner));
        let index = by_criterion.or(by_target).ok_or_else(|| {
            TargetingError::NotFound(format!("target {} is not a top-level member", inner.id()))
        })?;

        let mut remaining = members.clone();
        remaining.remove(index);
        debug!(target_id = inner.id(), index, remaining = remaining.len(), "removed target");

        match remaining.len() {
            0 => Ok(None),
            1 => match remaining.pop() {
                Some(Member::Criterion(criterion)) => Ok(Some(criterion)),
                Some(member) => Ok(Some(Self::combined(Connective::Or, vec![member]))),
                None => Ok(None),
            },
            _ => Ok(Some(Self::combined(Connective::And, remaining))),
        }
    }
}

impl ops::BitOr for Criterion {
    type Output = Criterion;

    fn bitor(self, other: Criterion) -> Criterion {
        Criterion::combine(self, other, Connective::Or)
    }
}

impl ops::BitAnd for Criterion {
    type Output = Criterion;

    fn bitand(self, other: Criterion) -> Criterion {
        Criterion::combine(self, other, Connective::And)
    }
}

impl ops::Not for Criterion {
    type Output = Criterion;

    fn not(self) -> Criterion {
        self.negate()
    }
}
