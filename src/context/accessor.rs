//! Accessor declarations: the closed table of named payload slots a
//! dependency body may populate.
//!
//! A [`Vocabulary`] is built once at startup by registering every accessor
//! up front.  Each entry is either a block accessor (one callable per system
//! tag) or a list accessor (an ordered sequence of strings per system tag,
//! optionally reduced to a single element by a [`ChooseStrategy`]).

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use anyhow::Result;

use crate::error::ConfigError;
use crate::platform::SystemTag;

/// Names owned by [`super::DepContext`] and [`super::Definer`] that no
/// accessor may shadow.
pub const RESERVED_NAMES: &[&str] = &[
    "basename", "block", "chosen", "define", "host", "is_defined", "list", "name", "on",
    "payload", "reset",
];

/// Type of the callable stored in a block accessor slot.
pub type BlockFn = dyn Fn() -> Result<bool> + Send + Sync;

/// A callable stored by a block accessor (`met?`, `meet`, `setup`, …).
///
/// Cloning shares the underlying closure; [`Block::ptr_eq`] tells whether
/// two handles point at the same closure.
#[derive(Clone)]
pub struct Block(Arc<BlockFn>);

impl Block {
    /// Wrap a closure.
    pub fn new(f: impl Fn() -> Result<bool> + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Invoke the block.
    ///
    /// # Errors
    ///
    /// Returns whatever error the block itself returns.
    pub fn call(&self) -> Result<bool> {
        (self.0)()
    }

    /// Returns `true` if both handles share one closure.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Block(<fn>)")
    }
}

/// Predicate used to reduce a list accessor to a single element: the first
/// element for which it returns `true` is chosen.
#[derive(Clone)]
pub struct ChooseStrategy(Arc<dyn Fn(&str) -> bool + Send + Sync>);

impl ChooseStrategy {
    /// Wrap a predicate.
    pub fn new(f: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// First element of `values` that satisfies the predicate.
    #[must_use]
    pub fn choose(&self, values: &[String]) -> Option<String> {
        values.iter().find(|v| (self.0)(v)).cloned()
    }
}

impl fmt::Debug for ChooseStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ChooseStrategy(<fn>)")
    }
}

/// Value a list accessor takes when a body never calls it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListDefault {
    /// A fixed sequence.
    Values(Vec<String>),
    /// A one-element sequence holding the dependency's basename.
    Basename,
}

impl ListDefault {
    /// Build a fixed default from anything string-like.
    pub fn values<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Values(values.into_iter().map(Into::into).collect())
    }

    pub(crate) fn resolve(&self, basename: &str) -> Vec<String> {
        match self {
            Self::Values(v) => v.clone(),
            Self::Basename => vec![basename.to_string()],
        }
    }
}

/// The two flavours of accessor.
#[derive(Debug, Clone)]
pub enum AccessorKind {
    /// One callable per system tag.
    Block,
    /// An appendable sequence per system tag.
    List {
        /// Optional reducer picking one element lazily.
        choose: Option<ChooseStrategy>,
    },
}

impl AccessorKind {
    pub(crate) const fn label(&self) -> &'static str {
        match self {
            Self::Block => "block",
            Self::List { .. } => "list",
        }
    }
}

/// One registered accessor.
#[derive(Debug, Clone)]
pub struct Accessor {
    /// Name used inside dependency bodies.
    pub name: String,
    /// Block or list.
    pub kind: AccessorKind,
    /// Block used for the "all systems" slot unless a body overrides it.
    pub default_block: Option<Block>,
    /// Sequence used when a body never calls the accessor.
    pub default_list: Option<ListDefault>,
}

/// Which per-system slot a fragment is stored under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TagSlot {
    /// Applies on every host unless a system-specific fragment matches.
    All,
    /// Applies only on hosts whose match list contains this tag.
    System(SystemTag),
}

impl From<SystemTag> for TagSlot {
    fn from(tag: SystemTag) -> Self {
        Self::System(tag)
    }
}

impl From<&str> for TagSlot {
    fn from(tag: &str) -> Self {
        Self::System(SystemTag::new(tag))
    }
}

/// Closed table of accessor declarations, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    accessors: BTreeMap<String, Accessor>,
}

impl Vocabulary {
    /// An empty vocabulary.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a block accessor, optionally with a default block.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::AccessorCollision`] if `name` is reserved or
    /// already registered.
    pub fn accepts_block_for(
        &mut self,
        name: &str,
        default: Option<Block>,
    ) -> Result<&mut Self, ConfigError> {
        self.register(Accessor {
            name: name.to_string(),
            kind: AccessorKind::Block,
            default_block: default,
            default_list: None,
        })
    }

    /// Declare a list accessor with an optional default and choose strategy.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::AccessorCollision`] if `name` is reserved or
    /// already registered.
    pub fn accepts_list_for(
        &mut self,
        name: &str,
        default: Option<ListDefault>,
        choose: Option<ChooseStrategy>,
    ) -> Result<&mut Self, ConfigError> {
        self.register(Accessor {
            name: name.to_string(),
            kind: AccessorKind::List { choose },
            default_block: None,
            default_list: default,
        })
    }

    fn register(&mut self, accessor: Accessor) -> Result<&mut Self, ConfigError> {
        if RESERVED_NAMES.contains(&accessor.name.as_str())
            || self.accessors.contains_key(&accessor.name)
        {
            return Err(ConfigError::AccessorCollision {
                name: accessor.name,
            });
        }
        tracing::trace!("registered {} accessor '{}'", accessor.kind.label(), accessor.name);
        self.accessors.insert(accessor.name.clone(), accessor);
        Ok(self)
    }

    /// Look up an accessor by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Accessor> {
        self.accessors.get(name)
    }

    /// Whether `name` is declared.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.accessors.contains_key(name)
    }

    /// All accessors, ordered by name.
    pub fn iter(&self) -> impl Iterator<Item = &Accessor> {
        self.accessors.values()
    }

    pub(crate) fn expect_kind(
        &self,
        dep: &str,
        name: &str,
        want_block: bool,
    ) -> Result<&Accessor, ConfigError> {
        let accessor = self.get(name).ok_or_else(|| ConfigError::UnknownAccessor {
            dep: dep.to_string(),
            name: name.to_string(),
        })?;
        let is_block = matches!(accessor.kind, AccessorKind::Block);
        if is_block == want_block {
            Ok(accessor)
        } else {
            Err(ConfigError::WrongAccessorKind {
                name: name.to_string(),
                expected: accessor.kind.label(),
            })
        }
    }
}
