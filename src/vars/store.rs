//! The per-run variable store and its default chain.
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::definition::{VarDefault, VarDefinition, VarOpts};
use super::persist::{SavedVar, SavedVars};
use super::prompt::{PromptRequest, Prompter};
use super::value::VarValue;
use crate::error::VarError;

/// Variable store for one run.
///
/// Holds the declarations and current values of this run, plus the
/// read-only snapshot saved by the previous run.  All reads are linearised
/// by `&mut self`.
pub struct VariableStore {
    defs: BTreeMap<String, VarDefinition>,
    current: BTreeMap<String, VarValue>,
    saved: SavedVars,
    prompter: Arc<dyn Prompter>,
}

impl fmt::Debug for VariableStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VariableStore")
            .field("defs", &self.defs)
            .field("current", &self.current)
            .field("saved", &self.saved)
            .field("prompter", &"<dyn Prompter>")
            .finish()
    }
}

impl VariableStore {
    /// Create a store over the previous run's snapshot.
    pub fn new(saved: SavedVars, prompter: Arc<dyn Prompter>) -> Self {
        Self {
            defs: BTreeMap::new(),
            current: BTreeMap::new(),
            saved,
            prompter,
        }
    }

    /// Set the current value of `name`, replacing any earlier one.
    pub fn set(&mut self, name: &str, value: impl Into<VarValue>) {
        self.defs.entry(name.to_string()).or_default();
        self.current.insert(name.to_string(), value.into());
    }

    /// Merge `entries` into the current mapping value of `name`.
    ///
    /// A missing or non-mapping current value is treated as empty.
    pub fn merge(&mut self, name: &str, entries: BTreeMap<String, VarValue>) {
        let mut map = match self.current.get(name) {
            Some(VarValue::Map(existing)) => existing.clone(),
            _ => BTreeMap::new(),
        };
        map.extend(entries);
        self.set(name, VarValue::Map(map));
    }

    /// Fold `opts` into the declaration of `name` and return it.
    pub fn define_var(&mut self, name: &str, opts: &VarOpts) -> &VarDefinition {
        let def = self.defs.entry(name.to_string()).or_default();
        def.merge(opts);
        def
    }

    /// Declaration of `name`, if it has been declared.
    #[must_use]
    pub fn definition(&self, name: &str) -> Option<&VarDefinition> {
        self.defs.get(name)
    }

    /// The current value of `name`, with dynamic values evaluated.
    #[must_use]
    pub fn current(&self, name: &str) -> Option<VarValue> {
        self.current.get(name).map(VarValue::resolved)
    }

    /// Every declared name, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.defs.keys().map(String::as_str)
    }

    /// The previous run's snapshot.
    #[must_use]
    pub const fn saved(&self) -> &SavedVars {
        &self.saved
    }

    /// Read `name`, declaring it with `opts` first.
    ///
    /// Returns the current value if one is set.  Otherwise the default
    /// chain's result is offered to the prompter and the answer becomes the
    /// current value, unless `opts.ask` is `Some(false)`, in which case the
    /// default chain's result is returned without being stored.
    ///
    /// # Errors
    ///
    /// Returns [`VarError::Prompt`] if the prompter fails.
    pub fn var(&mut self, name: &str, opts: VarOpts) -> Result<Option<VarValue>, VarError> {
        self.read(name, &opts, &mut Vec::new())
    }

    /// Result of the default chain for `name`, never prompting.
    ///
    /// # Errors
    ///
    /// Returns [`VarError::Prompt`] only if a referenced variable prompts,
    /// which reads through this path never do.
    pub fn default_for(&mut self, name: &str) -> Result<Option<VarValue>, VarError> {
        self.default_chain(name, &mut Vec::new())
    }

    fn read(
        &mut self,
        name: &str,
        opts: &VarOpts,
        resolving: &mut Vec<String>,
    ) -> Result<Option<VarValue>, VarError> {
        self.define_var(name, opts);
        if let Some(value) = self.current.get(name) {
            return Ok(Some(value.resolved()));
        }
        if opts.ask == Some(false) {
            return self.default_chain(name, resolving);
        }
        let default = self.default_chain(name, resolving)?;
        let request = self.request_for(name, opts, default);
        tracing::debug!("prompting for {name}");
        let answer = self
            .prompter
            .prompt(&request)
            .map_err(|source| VarError::Prompt {
                name: name.to_string(),
                source,
            })?;
        self.set(name, answer.clone());
        Ok(Some(answer))
    }

    fn request_for(&self, name: &str, opts: &VarOpts, default: Option<VarValue>) -> PromptRequest {
        let def = self.defs.get(name).cloned().unwrap_or_default();
        PromptRequest {
            name: name.to_string(),
            message: opts
                .message
                .clone()
                .unwrap_or_else(|| def.message_for(name)),
            kind: opts.kind.or(def.kind).unwrap_or_default(),
            default,
            choices: opts.choices.clone().or(def.choices),
            choice_descriptions: opts.choice_descriptions.clone().or(def.choice_descriptions),
            dynamic: def.default.as_ref().is_some_and(VarDefault::is_computed),
        }
    }

    fn default_chain(
        &mut self,
        name: &str,
        resolving: &mut Vec<String>,
    ) -> Result<Option<VarValue>, VarError> {
        let declared = self.defs.get(name).and_then(|d| d.default.clone());
        if let Some(VarDefault::Computed(f)) = &declared {
            return Ok(Some(f().resolved()));
        }
        if let Some(value) = self.saved.get(name).and_then(|s| s.value.clone()) {
            return Ok(Some(value));
        }
        match declared {
            Some(VarDefault::Reference(other)) => {
                if resolving.iter().any(|n| n == name) {
                    tracing::debug!("reference cycle through {name}; no default");
                    return Ok(None);
                }
                resolving.push(name.to_string());
                let referenced = self.read(&other, &VarOpts::new().ask(false), resolving);
                resolving.pop();
                let Some(referenced) = referenced? else {
                    return Ok(None);
                };
                let override_value = self
                    .saved
                    .get(name)
                    .and_then(|s| s.values.get(&referenced.to_string()))
                    .cloned();
                Ok(Some(override_value.unwrap_or(referenced)))
            }
            Some(VarDefault::Literal(value)) => Ok(Some(value)),
            Some(VarDefault::Computed(_)) | None => Ok(None),
        }
    }

    /// Whether a variable called `name` can ever reach the saved snapshot.
    #[must_use]
    pub fn persists(name: &str) -> bool {
        !name.contains("password")
    }

    /// Snapshot to persist for the next run.
    ///
    /// Starts from the previous snapshot and overlays this run's current
    /// values.  A variable whose default references another variable has its
    /// value filed under the referenced variable's current value instead, so
    /// the choice is replayed only when that reference matches again.
    /// Values that cannot be persisted and every variable whose name contains
    /// `password` are left out.
    #[must_use]
    pub fn for_save(&self) -> SavedVars {
        let mut snapshot = self.saved.clone();
        for (name, def) in &self.defs {
            let entry = snapshot.entry(name.clone()).or_default();
            if let Some(value) = self.current.get(name) {
                entry.value = Some(value.clone());
            }
            if let Some(VarDefault::Reference(other)) = &def.default {
                let value = entry.value.take();
                if let (Some(value), Some(key)) = (value, self.current(other)) {
                    entry.values.insert(key.to_string(), value);
                }
            }
        }
        snapshot
            .into_iter()
            .filter(|(name, _)| Self::persists(name))
            .filter_map(|(name, var)| {
                let var = SavedVar {
                    value: var.value.and_then(|v| v.persistable()),
                    values: var
                        .values
                        .into_iter()
                        .filter_map(|(k, v)| v.persistable().map(|v| (k, v)))
                        .collect(),
                };
                (var.value.is_some() || !var.values.is_empty()).then_some((name, var))
            })
            .collect()
    }
}
