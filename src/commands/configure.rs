//! Command: `configure features show|enable|disable`.
use std::io::Write;

use crate::cli::FeaturesCommand;
use crate::context::Context;
use crate::error::RhcError;
use crate::features::{FeaturePreferences, ResolvedPlan, activate, resolve};
use crate::report::document::FeatureEntry;
use crate::report::{ExitStatus, ReportBuilder, Reporter};

/// Run a `configure features` subcommand.
///
/// # Errors
///
/// Returns an error if a feature id is unknown, a mandatory feature is
/// disabled, or the request contradicts itself.
pub fn run<W: Write>(
    ctx: &Context,
    command: &FeaturesCommand,
    report: &mut ReportBuilder<W>,
) -> Result<ExitStatus, RhcError> {
    let connected = ctx.is_connected();
    match command {
        FeaturesCommand::Show => {
            let prefs = ctx.preferences.load(&ctx.registry);
            report.feature_table(&entries(ctx, &prefs, connected), connected);
            Ok(ExitStatus::Success)
        }
        FeaturesCommand::Enable(args) => change(ctx, &args.features, true, connected, report),
        FeaturesCommand::Disable(args) => change(ctx, &args.features, false, connected, report),
    }
}

/// One row per registered feature, in registry order.
///
/// `enabled` is the live state on a connected host and the stored
/// preference otherwise.
#[must_use]
pub fn entries(ctx: &Context, prefs: &FeaturePreferences, connected: bool) -> Vec<FeatureEntry> {
    ctx.registry
        .iter()
        .map(|f| FeatureEntry {
            id: f.id(),
            description: f.description(),
            mandatory: f.mandatory(),
            enabled: f.is_enabled_now(ctx, prefs, connected),
        })
        .collect()
}

/// Resolve, announce and apply an enable or disable request.
///
/// # Errors
///
/// Returns an error if the request cannot be resolved.
pub fn change(
    ctx: &Context,
    ids: &[String],
    enable: bool,
    connected: bool,
    reporter: &mut dyn Reporter,
) -> Result<ExitStatus, RhcError> {
    let none: &[String] = &[];
    let plan = if enable {
        resolve(&ctx.registry, ids, none)?
    } else {
        resolve(&ctx.registry, none, ids)?
    };
    let prefs = ctx.preferences.load(&ctx.registry);

    for line in announcements(ctx, ids, &plan, &prefs, enable, connected) {
        tracing::info!("{line}");
        reporter.text(&format!("{line}\n"));
    }

    if !connected && plan.delta(&ctx.registry, &prefs).is_empty() {
        tracing::debug!("feature preferences already match the request");
        return Ok(ExitStatus::Success);
    }

    let result = activate(ctx, &plan, &prefs, connected);
    let verb = if enable { "enable" } else { "disable" };
    for (id, e) in result.errors() {
        tracing::warn!("failed to {verb} feature '{id}': {e}");
        reporter.text(&format!("Failed to {verb} feature '{id}': {e}\n"));
    }
    if let Some(e) = &result.persist_error {
        reporter.text(&format!("Failed to save feature preferences: {e}\n"));
    } else if result.persisted {
        tracing::debug!("feature preferences saved in {}", ctx.preferences.path().display());
    }

    if result.has_errors() || result.persist_error.is_some() {
        Ok(ExitStatus::Failure)
    } else {
        Ok(ExitStatus::Success)
    }
}

/// Lines describing what a request will do, requested features first, then
/// the ones pulled in through dependencies.
fn announcements(
    ctx: &Context,
    ids: &[String],
    plan: &ResolvedPlan,
    prefs: &FeaturePreferences,
    enable: bool,
    connected: bool,
) -> Vec<String> {
    let registry = &ctx.registry;
    let mut requested: Vec<&'static str> = Vec::new();
    for id in ids.iter().filter_map(|id| registry.canonical(id)) {
        if !requested.contains(&id) {
            requested.push(id);
        }
    }

    let mut lines = Vec::new();
    for &id in &requested {
        let now = registry
            .get(id)
            .is_some_and(|f| f.is_enabled_now(ctx, prefs, connected));
        lines.push(match (enable, now) {
            (true, true) => format!("Feature '{id}' is already enabled"),
            (true, false) => format!("Enabling '{id}'"),
            (false, false) => format!("Feature '{id}' is already disabled"),
            (false, true) => format!("Disabling '{id}'"),
        });
    }

    let implied = registry.iter().filter(|f| {
        !f.mandatory()
            && !requested.contains(&f.id())
            && if enable {
                plan.to_enable.contains(f.id())
            } else {
                plan.to_disable.contains(f.id())
            }
    });
    for f in implied {
        if f.is_enabled_now(ctx, prefs, connected) == enable {
            continue;
        }
        if enable {
            if let Some(by) = requested
                .iter()
                .find(|r| registry.requirements_of(r).contains(f.id()))
            {
                lines.push(format!("Enabling '{}' (required by '{by}')", f.id()));
            }
        } else if let Some(req) = f.requires().iter().find(|r| plan.to_disable.contains(*r)) {
            lines.push(format!("Disabling '{}' (depends on '{req}')", f.id()));
        }
    }
    lines
}
