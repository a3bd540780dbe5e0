//! Command: inspect and edit saved variables.
use std::sync::Arc;

use anyhow::Result;

use crate::cli::VarsCommand;
use crate::run::RunContext;
use crate::vars::{DialoguerPrompter, Prompter, SavedVars, VarOpts, VarValue, VariableStore};

/// Run a `vars` subcommand with the terminal prompter.
///
/// # Errors
///
/// Returns an error if the saved snapshot cannot be read or written, or
/// prompting fails.
#[allow(clippy::print_stdout)]
pub fn run(cmd: &VarsCommand, ctx: &RunContext) -> Result<()> {
    match cmd {
        VarsCommand::List => {
            let store = ctx.load_vars(Arc::new(DialoguerPrompter))?;
            for line in render_saved(store.saved()) {
                println!("{line}");
            }
        }
        VarsCommand::Get { name, no_ask } => {
            let value = get(ctx, Arc::new(DialoguerPrompter), name, !no_ask)?;
            println!("{value}");
        }
        VarsCommand::Set { name, value } => match set(ctx, name, value)? {
            Some(stored) => ctx.log.info(&format!("{name} = {stored}")),
            None => ctx.log.warn(&format!(
                "{name} not saved: variables named like passwords are never persisted"
            )),
        },
    }
    Ok(())
}

/// One line per saved value; values keyed by a referenced variable are
/// shown as `name[key]`.
#[must_use]
pub fn render_saved(saved: &SavedVars) -> Vec<String> {
    let mut lines = Vec::new();
    for (name, var) in saved {
        if let Some(value) = &var.value {
            lines.push(format!("{name} = {value}"));
        }
        for (key, value) in &var.values {
            lines.push(format!("{name}[{key}] = {value}"));
        }
    }
    lines
}

/// Read `name`, prompting through `prompter` when `ask` is set, and save
/// the answer for the next run.
///
/// # Errors
///
/// Returns an error if the variable has no value and `ask` is off, or the
/// snapshot or prompter fails.
pub fn get(
    ctx: &RunContext,
    prompter: Arc<dyn Prompter>,
    name: &str,
    ask: bool,
) -> Result<VarValue> {
    let mut store = ctx.load_vars(prompter)?;
    let Some(value) = store.var(name, VarOpts::new().ask(ask))? else {
        anyhow::bail!("'{name}' has no saved value");
    };
    if ask {
        ctx.save_vars(&store)?;
    }
    Ok(value)
}

/// Save `raw` as the value of `name`, typed like the previously saved value.
///
/// Returns `None` without touching the snapshot when `name` is one that is
/// never persisted.
///
/// # Errors
///
/// Returns an error if the snapshot cannot be read or written.
pub fn set(ctx: &RunContext, name: &str, raw: &str) -> Result<Option<VarValue>> {
    if !VariableStore::persists(name) {
        return Ok(None);
    }
    let mut store = ctx.load_vars(Arc::new(DialoguerPrompter))?;
    let previous = store.saved().get(name).and_then(|s| s.value.clone());
    let value = VarValue::parse_like(raw, previous.as_ref());
    store.set(name, value.clone());
    ctx.save_vars(&store)?;
    Ok(Some(value))
}
