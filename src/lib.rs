//! Boolean targeting criteria over identity-bearing targets, and forests
//! built from flat parent-linked items.
//!
//! A [`Criterion`] combines [`Target`]s with `OR`, `AND` and `NOT`, splicing
//! associative chains as they are built, and can be split into included and
//! excluded targets or converted to a nested document form. A [`ForestNode`]
//! arranges targets, or any other [`TreeItem`], by their parent links.
//!
//! ```
//! use targeting_tree::{Criterion, Target};
//!
//! let home = Target::ad_unit("1").with_name("home");
//! let sports = Target::ad_unit("2").with_name("sports");
//! let news = Target::ad_unit("3").with_name("news");
//!
//! let criterion = (Criterion::from(home) | Criterion::from(sports)) & !Criterion::from(news);
//! let (includes, excludes) = criterion.includes_and_excludes();
//!
//! assert_eq!(2, includes.len());
//! assert_eq!(Some("news"), excludes[0].name());
//! ```
mod codec;
mod criterion;
mod error;
mod forest;
mod target;
mod targeting_data;

pub use crate::criterion::{Connective, Criterion, Member, Operator};
pub use crate::error::{Result, TargetingError};
pub use crate::forest::{FlattenOptions, ForestNode, TreeItem};
pub use crate::target::{Target, TargetKind};
pub use crate::targeting_data::{Dimension, TargetingData};
