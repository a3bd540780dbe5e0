#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::wildcard_imports,
    clippy::indexing_slicing
)]
//! Integration tests for variables carried between runs.
//!
//! Each "run" loads the saved snapshot through a [`RunContext`], reads
//! variables with a scripted prompter, and saves the snapshot back, the way
//! the binary does.

mod common;

use std::sync::Arc;

use common::{ScriptedPrompter, TestRun};
use rig_cli::vars::{VarDefault, VarOpts, VarValue, VariableStore, persist};

fn db_opts() -> VarOpts {
    VarOpts::new().with_default(VarDefault::reference("app_name"))
}

fn run_once(run: &TestRun, answers: Vec<VarValue>) -> (VariableStore, Arc<ScriptedPrompter>) {
    let prompter = Arc::new(ScriptedPrompter::new(answers));
    let store = run.ctx.load_vars(Arc::clone(&prompter) as _).unwrap();
    (store, prompter)
}

/// A referenced default is replayed only while the referenced value matches.
#[test]
fn referenced_answers_are_replayed_per_reference_value() {
    let run = TestRun::new();

    let (mut store, prompter) = run_once(
        &run,
        vec![VarValue::from("shop"), VarValue::from("shop_production")],
    );
    store.var("app_name", VarOpts::new()).unwrap();
    let db = store.var("db_name", db_opts()).unwrap();
    assert_eq!(db, Some(VarValue::from("shop_production")));
    // The db_name prompt offered the referenced value as its default.
    assert_eq!(prompter.requests()[1].default, Some(VarValue::from("shop")));
    run.ctx.save_vars(&store).unwrap();

    let saved = persist::load(&run.ctx.settings.vars_file()).unwrap();
    assert_eq!(saved["app_name"].value, Some(VarValue::from("shop")));
    assert_eq!(saved["db_name"].value, None);
    assert_eq!(
        saved["db_name"].values.get("shop"),
        Some(&VarValue::from("shop_production"))
    );

    // Same app: the saved per-reference answer comes back without asking.
    let (mut store, _) = run_once(&run, vec![]);
    let db = store.var("db_name", db_opts().ask(false)).unwrap();
    assert_eq!(db, Some(VarValue::from("shop_production")));

    // Different app: the reference itself becomes the default.
    let (mut store, prompter) = run_once(&run, vec![VarValue::from("blog")]);
    store.var("app_name", VarOpts::new()).unwrap();
    assert_eq!(prompter.requests()[0].default, Some(VarValue::from("shop")));
    let db = store.var("db_name", db_opts().ask(false)).unwrap();
    assert_eq!(db, Some(VarValue::from("blog")));
}

/// Secrets and values that cannot be represented on disk stay in memory.
#[test]
fn passwords_and_dynamic_values_are_not_saved() {
    let run = TestRun::new();
    let (mut store, _) = run_once(&run, vec![]);
    store.set("db_password", "hunter2");
    store.set("build_id", VarValue::dynamic(|| VarValue::Integer(7)));
    store.set("db_port", 5432_i64);
    run.ctx.save_vars(&store).unwrap();

    let saved = persist::load(&run.ctx.settings.vars_file()).unwrap();
    assert_eq!(saved.keys().collect::<Vec<_>>(), vec!["db_port"]);
    assert_eq!(saved["db_port"].value, Some(VarValue::Integer(5432)));
}

/// Computed defaults mark the prompt as dynamic and are never cached.
#[test]
fn computed_default_is_offered_as_dynamic() {
    let run = TestRun::new();
    let (mut store, prompter) = run_once(&run, vec![VarValue::from("/srv/www")]);
    let opts = VarOpts::new().with_default(VarDefault::computed(|| VarValue::from("/var/www")));

    let value = store.var("document_root", opts).unwrap();
    assert_eq!(value, Some(VarValue::from("/srv/www")));
    let request = &prompter.requests()[0];
    assert!(request.dynamic);
    assert_eq!(request.message, "document root");
    assert_eq!(request.default, Some(VarValue::from("/var/www")));
}

/// Choices fall back to the keys of their descriptions.
#[test]
fn choice_descriptions_supply_choices() {
    let run = TestRun::new();
    let (mut store, prompter) = run_once(&run, vec![VarValue::from("postgres")]);
    let opts = VarOpts::new()
        .choice_descriptions([("mysql", "MySQL 8"), ("postgres", "PostgreSQL 16")])
        .message("Which database?");

    store.var("db", opts).unwrap();
    let request = &prompter.requests()[0];
    assert_eq!(request.message, "Which database?");
    assert_eq!(
        request.choices.as_deref(),
        Some(&["mysql".to_string(), "postgres".to_string()][..])
    );
}

/// A failing prompter surfaces as an error naming the variable.
#[test]
fn prompt_failure_is_reported() {
    let run = TestRun::new();
    let (mut store, _) = run_once(&run, vec![]);
    let err = store.var("region", VarOpts::new()).unwrap_err();
    assert!(err.to_string().contains("region"));
}
