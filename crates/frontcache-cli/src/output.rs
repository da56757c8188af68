//! Output renderers and formatting helpers for CLI commands.

use std::fmt::Write as _;
use std::path::Path;
use std::time::Duration;

use anyhow::anyhow;
use frontcache_config::ResolvedProfile;
use frontcache_fsops::ReconcileReport;
use frontcache_policy::{FetchDecision, FetchOutcome, RecvAction, RecvOutcome};
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::client::{CliError, CliResult};

/// Print `value` as JSON, or `table` verbatim.
pub(crate) fn emit<T: Serialize>(value: &T, table: &str, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => {
            let text = serde_json::to_string_pretty(value)
                .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))?;
            println!("{text}");
        }
        OutputFormat::Table => print!("{table}"),
    }
    Ok(())
}

pub(crate) fn profile_table(raw: &str, resolved: &ResolvedProfile) -> String {
    let profile = &resolved.profile;
    let class = resolved.class.map_or_else(
        || format!("{raw} (unrecognised, default profile)"),
        |class| class.to_string(),
    );
    format!(
        "class: {class}\n\
         thread_pools: {}\n\
         thread_pool_max: {}\n\
         overflow_max: {}\n\
         cache_spec: {}\n",
        profile.thread_pools, profile.thread_pool_max, profile.overflow_max, profile.cache_spec
    )
}

pub(crate) fn written_files_table(files: &[(String, &Path, bool)]) -> String {
    let mut out = format!("{:<14} {:<10} PATH\n", "KIND", "STATUS");
    for (kind, path, written) in files {
        let status = if *written { "written" } else { "unchanged" };
        let _ = writeln!(out, "{kind:<14} {status:<10} {}", path.display());
    }
    out
}

pub(crate) fn report_table(report: &ReconcileReport) -> String {
    let mut out = String::new();
    if report.dry_run {
        out.push_str("dry run: nothing was changed\n");
    }
    if report.package_installed {
        out.push_str("package: installed\n");
    }
    section(&mut out, "directories created", &report.directories_created);
    section(&mut out, "files written", &report.files_written);
    section(&mut out, "files unchanged", &report.files_unchanged);
    section(&mut out, "proxy files relocated", &report.proxy_files_relocated);
    if report.services_restarted.is_empty() {
        out.push_str("services restarted: none\n");
    } else {
        let services: Vec<_> = report
            .services_restarted
            .iter()
            .map(|service| service.as_str())
            .collect();
        let _ = writeln!(out, "services restarted: {}", services.join(", "));
    }
    out
}

fn section(out: &mut String, title: &str, paths: &[std::path::PathBuf]) {
    if paths.is_empty() {
        let _ = writeln!(out, "{title}: none");
        return;
    }
    let _ = writeln!(out, "{title}:");
    for path in paths {
        let _ = writeln!(out, "  {}", path.display());
    }
}

pub(crate) fn recv_table(outcome: &RecvOutcome) -> String {
    let action = match &outcome.action {
        RecvAction::Lookup => "lookup".to_string(),
        RecvAction::Pass => "pass".to_string(),
        RecvAction::Redirect { location } => format!("redirect to {location}"),
        RecvAction::Purge { ban } => format!("purge (ban {ban})"),
    };
    let rules: Vec<_> = outcome
        .applied
        .iter()
        .map(|rule| format!("{rule:?}"))
        .collect();
    let mut out = format!(
        "action: {action}\ngrace: {}\nrules applied: {}\n",
        format_duration(outcome.grace),
        rules.join(", ")
    );
    let _ = writeln!(out, "{} {}", outcome.request.method, outcome.request.url);
    for (name, value) in outcome.request.headers.iter() {
        let _ = writeln!(out, "  {name}: {value}");
    }
    out
}

pub(crate) fn fetch_table(outcome: &FetchOutcome) -> String {
    let decision = match outcome.decision {
        FetchDecision::HitForPass => "hit_for_pass".to_string(),
        FetchDecision::Cache { ttl } => format!("cache for {}", format_duration(ttl)),
    };
    let mut out = format!(
        "decision: {decision}\ngrace: {}\ndecided by: {:?}\nstatus: {}\n",
        format_duration(outcome.grace),
        outcome.decided_by,
        outcome.response.status
    );
    for (name, value) in outcome.response.headers.iter() {
        let _ = writeln!(out, "  {name}: {value}");
    }
    out
}

pub(crate) fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    match secs {
        0 => "0s".to_string(),
        s if s % 86_400 == 0 => format!("{}d", s / 86_400),
        s if s % 3_600 == 0 => format!("{}h", s / 3_600),
        s if s % 60 == 0 => format!("{}m", s / 60),
        s => format!("{s}s"),
    }
}
