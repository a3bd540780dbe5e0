//! Command: check or install Ruby gems through the dependency pool.
use std::sync::Arc;

use anyhow::Result;

use crate::cli::{GemCommand, GemOpts};
use crate::context::Vocabulary;
use crate::dep::DepSource;
use crate::logging::Logger;
use crate::pkg::{GemBackend, PackageBackend, PackageSpec};
use crate::run::RunContext;

/// Run a `gem` subcommand against the Ruby on `PATH`.
///
/// # Errors
///
/// Returns an error if Ruby cannot be detected, the constraint is
/// malformed, or the gem is (or stays) missing.
#[allow(clippy::print_stdout)]
pub fn run(cmd: &GemCommand, ctx: &RunContext, log: &Logger) -> Result<()> {
    let backend = ctx.gem_backend()?;
    match cmd {
        GemCommand::Check(gem) => {
            for line in check(&backend, gem)? {
                println!("{line}");
            }
            Ok(())
        }
        GemCommand::Install { gem, opts, source } => {
            let source = source
                .clone()
                .map_or_else(DepSource::anonymous, DepSource::public);
            install(ctx, Arc::new(backend), gem, opts, source)?;
            super::finish(log)
        }
    }
}

/// Describe the installed gem matching `gem`.
///
/// # Errors
///
/// Returns an error if no installed version matches.
pub fn check(backend: &GemBackend, gem: &GemOpts) -> Result<Vec<String>> {
    let spec = PackageSpec::new(&gem.name, gem.constraint.as_deref())?;
    let Some(version) = backend.installed_match(&spec)? else {
        anyhow::bail!("{spec} is not installed");
    };
    let mut lines = vec![format!("{spec}: {version} installed")];
    if let Some(path) = backend.gem_path_for(&gem.name, gem.constraint.as_deref())? {
        lines.push(format!("path: {}", path.display()));
    }
    lines.push(format!("bin:  {}", backend.bin_path().display()));
    Ok(lines)
}

/// Meet the `<name>.gem` dependency for `gem`.
///
/// # Errors
///
/// Returns an error if the install fails or the gem is still missing
/// afterwards.
pub fn install(
    ctx: &RunContext,
    backend: Arc<dyn PackageBackend>,
    gem: &GemOpts,
    opts: &str,
    source: DepSource,
) -> Result<()> {
    let spec = PackageSpec::new(&gem.name, gem.constraint.as_deref())?;
    let mut pool = ctx.dep_pool(Arc::new(Vocabulary::standard()?));
    let name = pool
        .add_package(backend, spec, opts, source)
        .name()
        .to_string();
    ctx.log.stage(&format!("Meeting {name}"));
    pool.meet(&name)?;
    Ok(())
}
