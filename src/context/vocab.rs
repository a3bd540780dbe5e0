//! Built-in accessor vocabularies.
//!
//! Every dependency understands the standard vocabulary.  Templated
//! dependencies extend it with template-specific accessors, as the
//! `installer` template does below.
use super::accessor::{Block, ChooseStrategy, ListDefault, Vocabulary};
use crate::error::ConfigError;

/// Block accessors every dependency understands.
pub const STANDARD_BLOCKS: &[&str] = &["setup", "met?", "meet", "before", "after"];

/// List accessors every dependency understands.
pub const STANDARD_LISTS: &[&str] = &["requires", "requires_when_unmet"];

/// Install prefixes tried by the installer template when none are given.
pub const DEFAULT_INSTALL_PREFIXES: &[&str] = &["~/Applications", "/Applications"];

impl Vocabulary {
    /// The vocabulary shared by all dependencies.
    ///
    /// `met?` defaults to a block reporting "unmet" so that a dependency
    /// without a check is always met by running `meet`; the other blocks
    /// default to no-ops that succeed.
    ///
    /// # Errors
    ///
    /// Only fails if the built-in names collide, which would be a bug.
    pub fn standard() -> Result<Self, ConfigError> {
        let mut vocab = Self::new();
        for name in STANDARD_BLOCKS {
            let default = if *name == "met?" {
                Block::new(|| Ok(false))
            } else {
                Block::new(|| Ok(true))
            };
            vocab.accepts_block_for(name, Some(default))?;
        }
        for name in STANDARD_LISTS {
            vocab.accepts_list_for(name, None, None)?;
        }
        Ok(vocab)
    }

    /// The standard vocabulary plus the installer template's accessors.
    ///
    /// `provides` defaults to the dependency's basename and is reduced to a
    /// single binary with `available`, typically "is this on `PATH`".
    ///
    /// # Errors
    ///
    /// Only fails if the built-in names collide, which would be a bug.
    pub fn installer(available: ChooseStrategy) -> Result<Self, ConfigError> {
        let mut vocab = Self::standard()?;
        vocab
            .accepts_list_for("source", None, None)?
            .accepts_list_for("provides", Some(ListDefault::Basename), Some(available))?
            .accepts_list_for(
                "prefix",
                Some(ListDefault::values(DEFAULT_INSTALL_PREFIXES.iter().copied())),
                None,
            )?;
        Ok(vocab)
    }
}
