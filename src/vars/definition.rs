//! Variable declarations and per-read options.
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::value::{Computed, VarValue};

/// Where a variable's default comes from.
#[derive(Clone)]
pub enum VarDefault {
    /// A fixed value.
    Literal(VarValue),
    /// Evaluated on every read that falls through to the default; never cached.
    Computed(Computed),
    /// The current value of another variable, by name.
    Reference(String),
}

impl VarDefault {
    /// Wrap a closure as a computed default.
    pub fn computed(f: impl Fn() -> VarValue + Send + Sync + 'static) -> Self {
        Self::Computed(Arc::new(f))
    }

    /// Refer to another variable's current value.
    pub fn reference(name: impl Into<String>) -> Self {
        Self::Reference(name.into())
    }

    /// Whether the default is recomputed on each read.
    #[must_use]
    pub const fn is_computed(&self) -> bool {
        matches!(self, Self::Computed(_))
    }
}

impl fmt::Debug for VarDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(v) => f.debug_tuple("Literal").field(v).finish(),
            Self::Computed(_) => f.write_str("Computed(<fn>)"),
            Self::Reference(name) => f.debug_tuple("Reference").field(name).finish(),
        }
    }
}

impl From<VarValue> for VarDefault {
    fn from(value: VarValue) -> Self {
        Self::Literal(value)
    }
}

impl From<&str> for VarDefault {
    fn from(value: &str) -> Self {
        Self::Literal(value.into())
    }
}

impl From<String> for VarDefault {
    fn from(value: String) -> Self {
        Self::Literal(value.into())
    }
}

impl From<i64> for VarDefault {
    fn from(value: i64) -> Self {
        Self::Literal(value.into())
    }
}

impl From<bool> for VarDefault {
    fn from(value: bool) -> Self {
        Self::Literal(value.into())
    }
}

/// How the prompting collaborator should read an answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PromptKind {
    /// Free text (or one of the declared choices).
    #[default]
    Value,
    /// A filesystem path that must exist.
    Path,
}

/// Options accepted by [`super::VariableStore::var`] and
/// [`super::VariableStore::define_var`].
///
/// Unset fields leave the existing declaration untouched.
#[derive(Debug, Clone, Default)]
pub struct VarOpts {
    /// Default used when nothing is set or saved.
    pub default: Option<VarDefault>,
    /// How the prompter should ask.
    pub kind: Option<PromptKind>,
    /// Prompt text.
    pub message: Option<String>,
    /// Allowed answers.
    pub choices: Option<Vec<String>>,
    /// Allowed answers with a description each.
    pub choice_descriptions: Option<BTreeMap<String, String>>,
    /// `Some(false)` disables prompting for this read.
    pub ask: Option<bool>,
}

impl VarOpts {
    /// Options that change nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default.
    #[must_use]
    pub fn with_default(mut self, default: impl Into<VarDefault>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Set the prompt kind.
    #[must_use]
    pub const fn kind(mut self, kind: PromptKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Set the prompt text.
    #[must_use]
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Restrict answers to `choices`.
    #[must_use]
    pub fn choices<I, S>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.choices = Some(choices.into_iter().map(Into::into).collect());
        self
    }

    /// Restrict answers to the keys of `descriptions`, shown with their text.
    #[must_use]
    pub fn choice_descriptions<I, K, V>(mut self, descriptions: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.choice_descriptions = Some(
            descriptions
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// Disable (or re-enable) prompting for this read.
    #[must_use]
    pub const fn ask(mut self, ask: bool) -> Self {
        self.ask = Some(ask);
        self
    }
}

/// The accumulated declaration of one variable.
#[derive(Debug, Clone, Default)]
pub struct VarDefinition {
    /// Default used when nothing is set or saved.
    pub default: Option<VarDefault>,
    /// How the prompter should ask.
    pub kind: Option<PromptKind>,
    /// Prompt text; derived from the name when unset.
    pub message: Option<String>,
    /// Allowed answers.
    pub choices: Option<Vec<String>>,
    /// Allowed answers with a description each.
    pub choice_descriptions: Option<BTreeMap<String, String>>,
}

impl VarDefinition {
    /// Fold `opts` into this declaration.
    ///
    /// Fields present in `opts` replace the current ones; absent fields are
    /// kept.  When no explicit choices exist, they are derived from the keys
    /// of `choice_descriptions`.
    pub fn merge(&mut self, opts: &VarOpts) {
        if let Some(default) = &opts.default {
            self.default = Some(default.clone());
        }
        if let Some(kind) = opts.kind {
            self.kind = Some(kind);
        }
        if let Some(message) = &opts.message {
            self.message = Some(message.clone());
        }
        if let Some(choices) = &opts.choices {
            self.choices = Some(choices.clone());
        }
        if let Some(descriptions) = &opts.choice_descriptions {
            self.choice_descriptions = Some(descriptions.clone());
        }
        if self.choices.is_none() {
            self.choices = self
                .choice_descriptions
                .as_ref()
                .map(|d| d.keys().cloned().collect());
        }
    }

    /// Prompt text: the declared message, or the name with underscores
    /// turned into spaces.
    #[must_use]
    pub fn message_for(&self, name: &str) -> String {
        self.message
            .clone()
            .unwrap_or_else(|| name.replace('_', " "))
    }
}
