//! Interactive prompting collaborator.
use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context as _, Result};
use dialoguer::{Input, Select};

use super::definition::PromptKind;
use super::value::VarValue;

/// Everything the prompter needs to ask for one variable.
#[derive(Debug, Clone)]
pub struct PromptRequest {
    /// Variable name.
    pub name: String,
    /// Question shown to the user.
    pub message: String,
    /// Expected answer type.
    pub kind: PromptKind,
    /// Result of the default chain, offered as the pre-selected answer.
    pub default: Option<VarValue>,
    /// Allowed answers.
    pub choices: Option<Vec<String>>,
    /// Allowed answers with a description each.
    pub choice_descriptions: Option<BTreeMap<String, String>>,
    /// Set when the default is recomputed on each read.
    pub dynamic: bool,
}

/// Reads a value from the operator.
#[cfg_attr(test, mockall::automock)]
pub trait Prompter: Send + Sync {
    /// Ask for a value.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal cannot be read (no TTY, EOF, Ctrl-C).
    fn prompt(&self, request: &PromptRequest) -> Result<VarValue>;
}

/// [`Prompter`] backed by `dialoguer` terminal widgets.
#[derive(Debug, Default, Clone, Copy)]
pub struct DialoguerPrompter;

impl Prompter for DialoguerPrompter {
    fn prompt(&self, request: &PromptRequest) -> Result<VarValue> {
        if let Some(choices) = request.choices.as_ref().filter(|c| !c.is_empty()) {
            return select(request, choices);
        }
        let mut input = Input::<String>::new().with_prompt(&request.message);
        if let Some(default) = &request.default {
            input = if request.dynamic {
                input.with_initial_text(default.to_string())
            } else {
                input.default(default.to_string())
            };
        }
        if request.kind == PromptKind::Path {
            input = input.validate_with(|answer: &String| -> Result<(), String> {
                if Path::new(answer).exists() {
                    Ok(())
                } else {
                    Err(format!("{answer} does not exist"))
                }
            });
        }
        let answer = input
            .interact_text()
            .with_context(|| format!("failed to read a value for {}", request.name))?;
        Ok(VarValue::parse_like(&answer, request.default.as_ref()))
    }
}

fn select(request: &PromptRequest, choices: &[String]) -> Result<VarValue> {
    let items: Vec<String> = choices
        .iter()
        .map(|choice| {
            request
                .choice_descriptions
                .as_ref()
                .and_then(|d| d.get(choice))
                .map_or_else(|| choice.clone(), |desc| format!("{choice} - {desc}"))
        })
        .collect();
    let default_idx = request
        .default
        .as_ref()
        .map(ToString::to_string)
        .and_then(|d| choices.iter().position(|c| *c == d))
        .unwrap_or(0);
    let idx = Select::new()
        .with_prompt(&request.message)
        .items(&items)
        .default(default_idx)
        .interact()
        .with_context(|| format!("failed to read a choice for {}", request.name))?;
    choices
        .get(idx)
        .cloned()
        .map(VarValue::Text)
        .with_context(|| format!("choice {idx} out of range for {}", request.name))
}
