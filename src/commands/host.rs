//! Command: show how this host is classified and where state lives.
use crate::platform::SystemTag;
use crate::run::RunContext;

/// Lines printed by `rig host`.
#[must_use]
pub fn describe(ctx: &RunContext) -> Vec<String> {
    let tags = ctx
        .host
        .match_list()
        .iter()
        .map(SystemTag::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    let report = &ctx.settings.report;
    vec![
        format!("system:     {}", ctx.host.system()),
        format!("match list: {tags}"),
        format!("vars:       {}", ctx.settings.vars_file().display()),
        format!("reports:    {}", ctx.settings.reports_dir().display()),
        format!(
            "collector:  {}",
            if report.enabled {
                report.collector.as_str()
            } else {
                "(disabled)"
            }
        ),
    ]
}

/// Print the host description to stdout.
#[allow(clippy::print_stdout)]
pub fn run(ctx: &RunContext) {
    for line in describe(ctx) {
        println!("{line}");
    }
}
