//! Per-dependency payload resolution.
//!
//! A dependency body is a closure that receives a [`Definer`] and records
//! per-system fragments into the accessors declared by a [`Vocabulary`].
//! [`DepContext::define`] runs the body exactly once and caches the resulting
//! [`Payload`]; the typed readers ([`DepContext::block`],
//! [`DepContext::list`], [`DepContext::chosen`]) then pick the fragment for
//! the current host:
//!
//! 1. the first tag in [`HostInfo::match_list`] with a stored fragment,
//! 2. otherwise the "all systems" slot,
//! 3. otherwise nothing (an empty result, never an error).
pub mod accessor;
pub mod vocab;

pub use accessor::{
    Accessor, AccessorKind, Block, ChooseStrategy, ListDefault, TagSlot, Vocabulary,
};

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::error::ConfigError;
use crate::platform::{HostInfo, SystemTag};

/// Signature of a dependency body.
pub type Body = dyn Fn(&mut Definer<'_>) -> Result<(), ConfigError> + Send + Sync;

/// Fragments recorded by one accessor.
#[derive(Debug, Clone)]
enum Fragments {
    Blocks(HashMap<TagSlot, Block>),
    List(HashMap<TagSlot, Vec<String>>),
}

/// Raw per-system fragments recorded by one evaluation of a dependency body.
#[derive(Debug, Clone, Default)]
pub struct Payload {
    fragments: BTreeMap<String, Fragments>,
}

impl Payload {
    /// The block stored for `name` under exactly `slot`.
    #[must_use]
    pub fn block_at(&self, name: &str, slot: &TagSlot) -> Option<&Block> {
        match self.fragments.get(name)? {
            Fragments::Blocks(map) => map.get(slot),
            Fragments::List(_) => None,
        }
    }

    /// The values stored for `name` under exactly `slot`.
    #[must_use]
    pub fn list_at(&self, name: &str, slot: &TagSlot) -> Option<&[String]> {
        match self.fragments.get(name)? {
            Fragments::List(map) => map.get(slot).map(Vec::as_slice),
            Fragments::Blocks(_) => None,
        }
    }

    /// Whether the body called `name` at all.
    #[must_use]
    pub fn was_called(&self, name: &str) -> bool {
        self.fragments.contains_key(name)
    }

    fn resolve_block(&self, name: &str, match_list: &[SystemTag]) -> Option<Block> {
        let Some(Fragments::Blocks(map)) = self.fragments.get(name) else {
            return None;
        };
        pick(map, match_list).cloned()
    }

    fn resolve_list(&self, name: &str, match_list: &[SystemTag]) -> Option<Vec<String>> {
        let Some(Fragments::List(map)) = self.fragments.get(name) else {
            return None;
        };
        Some(pick(map, match_list).cloned().unwrap_or_default())
    }
}

fn pick<'a, T>(map: &'a HashMap<TagSlot, T>, match_list: &[SystemTag]) -> Option<&'a T> {
    match_list
        .iter()
        .find_map(|tag| map.get(&TagSlot::System(tag.clone())))
        .or_else(|| map.get(&TagSlot::All))
}

/// Write handle passed to a dependency body.
///
/// Unqualified calls land in the "all systems" slot, or in the tag set by
/// an enclosing [`Definer::on`].
pub struct Definer<'a> {
    dep: &'a str,
    vocab: &'a Vocabulary,
    payload: &'a mut Payload,
    scope: TagSlot,
}

impl fmt::Debug for Definer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Definer")
            .field("dep", &self.dep)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

impl Definer<'_> {
    /// Store `block` for `name` in the current scope.
    ///
    /// # Errors
    ///
    /// Returns an error if `name` is undeclared or is a list accessor.
    pub fn block(&mut self, name: &str, block: Block) -> Result<&mut Self, ConfigError> {
        let slot = self.scope.clone();
        self.block_on(name, slot, block)
    }

    /// Store `block` for `name` under an explicit slot.
    ///
    /// # Errors
    ///
    /// Returns an error if `name` is undeclared or is a list accessor.
    pub fn block_on(
        &mut self,
        name: &str,
        on: impl Into<TagSlot>,
        block: Block,
    ) -> Result<&mut Self, ConfigError> {
        self.vocab.expect_kind(self.dep, name, true)?;
        let entry = self
            .payload
            .fragments
            .entry(name.to_string())
            .or_insert_with(|| Fragments::Blocks(HashMap::new()));
        if let Fragments::Blocks(map) = entry {
            map.insert(on.into(), block);
        }
        Ok(self)
    }

    /// Append `values` to list accessor `name` in the current scope.
    ///
    /// # Errors
    ///
    /// Returns an error if `name` is undeclared or is a block accessor.
    pub fn list<I, S>(&mut self, name: &str, values: I) -> Result<&mut Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let slot = self.scope.clone();
        self.list_on(name, slot, values)
    }

    /// Append `values` to list accessor `name` under an explicit slot.
    ///
    /// Repeated calls append; they never replace earlier values.
    ///
    /// # Errors
    ///
    /// Returns an error if `name` is undeclared or is a block accessor.
    pub fn list_on<I, S>(
        &mut self,
        name: &str,
        on: impl Into<TagSlot>,
        values: I,
    ) -> Result<&mut Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.vocab.expect_kind(self.dep, name, false)?;
        let entry = self
            .payload
            .fragments
            .entry(name.to_string())
            .or_insert_with(|| Fragments::List(HashMap::new()));
        if let Fragments::List(map) = entry {
            map.entry(on.into())
                .or_default()
                .extend(values.into_iter().map(Into::into));
        }
        Ok(self)
    }

    /// Run `f` with unqualified calls redirected to `tag`.
    ///
    /// # Errors
    ///
    /// Propagates any error returned by `f`.
    pub fn on(
        &mut self,
        tag: impl Into<SystemTag>,
        f: impl FnOnce(&mut Self) -> Result<(), ConfigError>,
    ) -> Result<&mut Self, ConfigError> {
        let previous = std::mem::replace(&mut self.scope, TagSlot::System(tag.into()));
        let result = f(self);
        self.scope = previous;
        result.map(|()| self)
    }
}

/// The payload resolver for one dependency instance.
pub struct DepContext {
    name: String,
    basename: String,
    vocab: Arc<Vocabulary>,
    host: Arc<dyn HostInfo>,
    body: Arc<Body>,
    payload: Option<Payload>,
}

impl fmt::Debug for DepContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DepContext")
            .field("name", &self.name)
            .field("basename", &self.basename)
            .field("host", &self.host)
            .field("body", &"<fn>")
            .field("defined", &self.payload.is_some())
            .finish_non_exhaustive()
    }
}

impl DepContext {
    /// Create an undefined context; the body runs on first [`Self::define`].
    pub fn new(
        name: impl Into<String>,
        vocab: Arc<Vocabulary>,
        host: Arc<dyn HostInfo>,
        body: Arc<Body>,
    ) -> Self {
        let name = name.into();
        Self {
            basename: name.clone(),
            name,
            vocab,
            host,
            body,
            payload: None,
        }
    }

    /// Override the basename used by [`ListDefault::Basename`].
    #[must_use]
    pub fn with_basename(mut self, basename: impl Into<String>) -> Self {
        self.basename = basename.into();
        self
    }

    /// Full dependency name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name without its type suffix (`rack` for `rack.gem`).
    #[must_use]
    pub fn basename(&self) -> &str {
        &self.basename
    }

    /// Whether the body has run since creation or the last [`Self::reset`].
    #[must_use]
    pub const fn is_defined(&self) -> bool {
        self.payload.is_some()
    }

    /// Evaluate the body once and return the cached payload.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] raised by the body; nothing is
    /// cached in that case.
    pub fn define(&mut self) -> Result<&Payload, ConfigError> {
        let payload = match self.payload.take() {
            Some(payload) => payload,
            None => self.evaluate()?,
        };
        Ok(self.payload.insert(payload))
    }

    /// Drop the cached payload so the next read re-runs the body.
    pub fn reset(&mut self) {
        self.payload = None;
    }

    fn evaluate(&self) -> Result<Payload, ConfigError> {
        tracing::trace!("defining {}", self.name);
        let mut payload = Payload::default();
        for accessor in self.vocab.iter() {
            if let Some(block) = &accessor.default_block {
                payload.fragments.insert(
                    accessor.name.clone(),
                    Fragments::Blocks(HashMap::from([(TagSlot::All, block.clone())])),
                );
            }
        }
        let mut definer = Definer {
            dep: &self.name,
            vocab: &self.vocab,
            payload: &mut payload,
            scope: TagSlot::All,
        };
        (self.body)(&mut definer)?;
        Ok(payload)
    }

    /// The block `name` resolves to on this host, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if `name` is not a declared block accessor or the
    /// body fails to evaluate.
    pub fn block(&mut self, name: &str) -> Result<Option<Block>, ConfigError> {
        self.vocab.expect_kind(&self.name, name, true)?;
        let match_list = self.host.match_list();
        Ok(self.define()?.resolve_block(name, &match_list))
    }

    /// The values `name` resolves to on this host.
    ///
    /// The accessor's default applies only when the body never called it;
    /// a call whose fragments match nothing on this host yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns an error if `name` is not a declared list accessor or the
    /// body fails to evaluate.
    pub fn list(&mut self, name: &str) -> Result<Vec<String>, ConfigError> {
        let default = self
            .vocab
            .expect_kind(&self.name, name, false)?
            .default_list
            .clone();
        let match_list = self.host.match_list();
        let basename = self.basename.clone();
        let resolved = self.define()?.resolve_list(name, &match_list);
        Ok(resolved.unwrap_or_else(|| {
            default
                .map(|d| d.resolve(&basename))
                .unwrap_or_default()
        }))
    }

    /// The single element of list accessor `name` picked by its choose
    /// strategy, or its first element when it has none.
    ///
    /// # Errors
    ///
    /// Same as [`Self::list`].
    pub fn chosen(&mut self, name: &str) -> Result<Option<String>, ConfigError> {
        let choose = match &self.vocab.expect_kind(&self.name, name, false)?.kind {
            AccessorKind::List { choose } => choose.clone(),
            AccessorKind::Block => None,
        };
        let values = self.list(name)?;
        Ok(match choose {
            Some(strategy) => strategy.choose(&values),
            None => values.into_iter().next(),
        })
    }
}
