//! The connect sequence: subscription, then telemetry, then services.
//!
//! A failed registration skips the remaining steps; they are still recorded
//! as [`StepStatus::Skipped`] so every report lists all three.
use std::collections::BTreeMap;
use std::time::Instant;

use chrono::Utc;

use super::outcome::{ConnectionOutcome, Direction, FeatureOutcome, StepKind, StepStatus};
use crate::context::Context;
use crate::error::CollaboratorError;
use crate::features::FeaturePreferences;
use crate::features::builtin::{ANALYTICS, CONTENT, REMOTE_MANAGEMENT};
use crate::report::{Icon, Indent, Prompter, Reporter};
use crate::rhsm::{RegisterOptions, RhsmError};

/// How the host registers with subscription management.
#[derive(Clone, PartialEq, Eq)]
pub enum Registration {
    /// User name and password, with an optional organization.
    Password {
        /// Organization key; empty lets the service choose or ask.
        organization: String,
        /// Account name.
        username: String,
        /// Account password.
        password: String,
    },
    /// Activation keys within an organization.
    ActivationKeys {
        /// Organization key.
        organization: String,
        /// Activation key names.
        keys: Vec<String>,
    },
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Password {
                organization,
                username,
                ..
            } => f
                .debug_struct("Password")
                .field("organization", organization)
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Self::ActivationKeys { organization, keys } => f
                .debug_struct("ActivationKeys")
                .field("organization", organization)
                .field("keys", &keys.len())
                .finish(),
        }
    }
}

/// Everything a connect run needs besides the context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    /// Credentials.
    pub registration: Registration,
    /// Content templates to register into.
    pub content_templates: Vec<String>,
    /// Wanted features, already resolved and normalized.
    pub features: FeaturePreferences,
    /// Why features were forced off, keyed by feature id.
    pub reasons: BTreeMap<&'static str, String>,
}

impl ConnectRequest {
    fn wants(&self, id: &str) -> bool {
        self.features.is_enabled(id)
    }

    fn disabled_suffix(&self, id: &str) -> String {
        self.reasons
            .get(id)
            .map_or_else(String::new, |reason| format!(" ({reason})"))
    }
}

/// Run the connect sequence and return its outcome.
///
/// `hostname` is only used in the header. Preconditions are checked by the
/// caller.
pub fn connect(
    ctx: &Context,
    hostname: &str,
    request: &ConnectRequest,
    reporter: &mut dyn Reporter,
    prompter: &mut dyn Prompter,
) -> ConnectionOutcome {
    tracing::info!("connecting {hostname} to Red Hat");
    reporter.text(&format!(
        "Connecting {hostname} to Red Hat.\nThis might take a few seconds.\n\n"
    ));
    reporter.text(&format!(
        "{}\n\n",
        request.features.summary(&ctx.registry)
    ));

    let mut outcome = ConnectionOutcome::new(Direction::Connect);

    let start = Instant::now();
    let status = register(ctx, request, reporter, prompter);
    let registered = status.is_satisfied();
    outcome.record_feature(content_outcome(request, registered));
    outcome.record(StepKind::Subscription, status, start.elapsed());

    let start = Instant::now();
    let status = register_telemetry(ctx, request, registered, reporter);
    outcome.record_feature(feature_outcome(ANALYTICS, request, &status));
    outcome.record(StepKind::Telemetry, status, start.elapsed());

    let start = Instant::now();
    let status = activate_services(ctx, request, registered, reporter);
    outcome.record_feature(feature_outcome(REMOTE_MANAGEMENT, request, &status));
    outcome.record(StepKind::Services, status, start.elapsed());

    if registered {
        reporter.text("\nSuccessfully connected to Red Hat!\n");
        if let Err(e) = ctx.preferences.remove() {
            tracing::warn!("{e}");
        }
    }
    outcome
}

fn content_outcome(request: &ConnectRequest, registered: bool) -> FeatureOutcome {
    let enabled = request.wants(CONTENT);
    FeatureOutcome {
        id: CONTENT,
        enabled,
        successful: enabled && registered,
        skipped: false,
        error: None,
    }
}

fn feature_outcome(id: &'static str, request: &ConnectRequest, status: &StepStatus) -> FeatureOutcome {
    FeatureOutcome {
        id,
        enabled: request.wants(id),
        successful: status.is_satisfied(),
        skipped: matches!(status, StepStatus::Skipped),
        error: status.error().map(ToString::to_string),
    }
}

fn register_with(ctx: &Context, request: &ConnectRequest, options: &RegisterOptions, organization: &str) -> Result<(), RhsmError> {
    match &request.registration {
        Registration::Password {
            username, password, ..
        } => ctx
            .subscription
            .register(organization, username, password, options),
        Registration::ActivationKeys { keys, .. } => ctx
            .subscription
            .register_with_activation_keys(organization, keys, options),
    }
}

/// Register, asking for an organization once if the account needs one.
fn try_register(
    ctx: &Context,
    request: &ConnectRequest,
    reporter: &dyn Reporter,
    prompter: &mut dyn Prompter,
) -> Result<(), RhsmError> {
    let options = RegisterOptions {
        enable_content: request.wants(CONTENT),
        content_templates: request.content_templates.clone(),
    };
    let organization = match &request.registration {
        Registration::Password { organization, .. }
        | Registration::ActivationKeys { organization, .. } => organization.as_str(),
    };

    let mut spinner = reporter.spinner(
        Indent::Small,
        "Connecting to Red Hat Subscription Management...",
    );
    let first = register_with(ctx, request, &options, organization);
    let Err(e) = first else {
        return Ok(());
    };
    let Registration::Password {
        username, password, ..
    } = &request.registration
    else {
        return Err(e);
    };
    if !e.is_org_not_specified() {
        return Err(e);
    }

    tracing::info!("organization required, fetching organizations of {username}");
    let orgs = ctx.subscription.organizations(username, password)?;
    spinner.stop();
    let chosen = match prompter.organization(&orgs) {
        Ok(Some(org)) if !org.is_empty() => org,
        Ok(_) => return Err(e),
        Err(io) => {
            tracing::error!("unable to read organization: {io}");
            return Err(e);
        }
    };
    let _spinner = reporter.spinner(
        Indent::Small,
        "Connecting to Red Hat Subscription Management...",
    );
    register_with(ctx, request, &options, &chosen)
}

fn register(
    ctx: &Context,
    request: &ConnectRequest,
    reporter: &mut dyn Reporter,
    prompter: &mut dyn Prompter,
) -> StepStatus {
    tracing::info!("registering the system with Red Hat Subscription Management");
    match try_register(ctx, request, reporter, prompter) {
        Err(e) => {
            let error = CollaboratorError::new(
                StepKind::Subscription,
                "cannot connect to Red Hat Subscription Management",
                e,
            );
            tracing::error!("{error}");
            reporter.line(
                Indent::Small,
                Icon::Error,
                "Cannot connect to Red Hat Subscription Management",
            );
            tracing::warn!("skipping generation of redhat.repo (registration failed)");
            reporter.line(
                Indent::Medium,
                Icon::Error,
                "Skipping generation of Red Hat repository file",
            );
            StepStatus::Failed(error)
        }
        Ok(()) => {
            tracing::debug!("connected to Red Hat Subscription Management");
            if let Err(e) = ctx.marker.write(Utc::now()) {
                tracing::warn!("{e}");
            }
            reporter.line(
                Indent::Small,
                Icon::Ok,
                "Connected to Red Hat Subscription Management",
            );
            if request.wants(CONTENT) {
                tracing::info!("redhat.repo has been generated");
                reporter.line(
                    Indent::Medium,
                    Icon::Ok,
                    "Content ... Red Hat repository file generated",
                );
            } else {
                tracing::info!("redhat.repo not generated (content feature disabled)");
                reporter.line(
                    Indent::Medium,
                    Icon::Off,
                    "Content ... Red Hat repository file not generated",
                );
            }
            StepStatus::Succeeded
        }
    }
}

/// Run one feature's activation for a connect step, rewrapping failures
/// under `context`.
fn activate_feature(
    ctx: &Context,
    id: &str,
    step: StepKind,
    context: &str,
) -> Result<(), CollaboratorError> {
    let feature = ctx
        .registry
        .get(id)
        .ok_or_else(|| CollaboratorError::new(step, context, format!("unknown feature '{id}'")))?;
    feature
        .activate(ctx)
        .map_err(|e| CollaboratorError::new(step, context, e.cause))
}

fn register_telemetry(
    ctx: &Context,
    request: &ConnectRequest,
    registered: bool,
    reporter: &mut dyn Reporter,
) -> StepStatus {
    if !request.wants(ANALYTICS) {
        tracing::info!("connecting to Red Hat Lightspeed disabled (analytics feature disabled)");
        reporter.line(
            Indent::Medium,
            Icon::Off,
            &format!(
                "Analytics ... Connecting to Red Hat Lightspeed (formerly Insights) disabled{}",
                request.disabled_suffix(ANALYTICS)
            ),
        );
        return StepStatus::Disabled {
            reason: request.reasons.get(ANALYTICS).cloned(),
        };
    }
    if !registered {
        tracing::warn!("skipping connection to Red Hat Lightspeed (registration failed)");
        reporter.line(
            Indent::Medium,
            Icon::Error,
            "Skipping connection to Red Hat Lightspeed (formerly Insights)",
        );
        return StepStatus::Skipped;
    }

    tracing::info!("connecting to Red Hat Lightspeed");
    let spinner = reporter.spinner(
        Indent::Medium,
        "Connecting to Red Hat Lightspeed (formerly Insights)...",
    );
    let result = activate_feature(
        ctx,
        ANALYTICS,
        StepKind::Telemetry,
        "cannot connect to Red Hat Lightspeed (formerly Insights)",
    );
    drop(spinner);
    match result {
        Ok(()) => {
            reporter.line(
                Indent::Medium,
                Icon::Ok,
                "Analytics ... Connected to Red Hat Lightspeed (formerly Insights)",
            );
            StepStatus::Succeeded
        }
        Err(e) => {
            tracing::error!("{e}");
            reporter.line(
                Indent::Medium,
                Icon::Error,
                "Analytics ... Cannot connect to Red Hat Lightspeed (formerly Insights)",
            );
            StepStatus::Failed(e)
        }
    }
}

fn activate_services(
    ctx: &Context,
    request: &ConnectRequest,
    registered: bool,
    reporter: &mut dyn Reporter,
) -> StepStatus {
    let label = ctx.config.units.management_label();
    if !request.wants(REMOTE_MANAGEMENT) {
        let message = format!(
            "Starting {label} service disabled{}",
            request.disabled_suffix(REMOTE_MANAGEMENT)
        );
        tracing::info!("{message}");
        reporter.line(
            Indent::Medium,
            Icon::Off,
            &format!("Management .... {message}"),
        );
        return StepStatus::Disabled {
            reason: request.reasons.get(REMOTE_MANAGEMENT).cloned(),
        };
    }
    if !registered {
        tracing::warn!("skipping activation of {label} service (registration failed)");
        reporter.line(
            Indent::Medium,
            Icon::Error,
            &format!("Skipping activation of {label} service"),
        );
        return StepStatus::Skipped;
    }

    tracing::info!("activating {label} service");
    let spinner = reporter.spinner(
        Indent::Medium,
        &format!("Activating the {label} service"),
    );
    let result = activate_feature(
        ctx,
        REMOTE_MANAGEMENT,
        StepKind::Services,
        &format!("cannot activate the {label} service"),
    );
    drop(spinner);
    match result {
        Ok(()) => {
            reporter.line(
                Indent::Medium,
                Icon::Ok,
                &format!("Remote Management ... Activated the {label} service"),
            );
            StepStatus::Succeeded
        }
        Err(e) => {
            tracing::error!("{e}");
            reporter.line(
                Indent::Medium,
                Icon::Error,
                &format!("Remote Management ... Cannot activate the {label} service"),
            );
            StepStatus::Failed(e)
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::io;
    use std::sync::Arc;

    use mockall::predicate::eq;

    use super::*;
    use crate::context::test_helpers::{Collaborators, context_with};
    use crate::report::{NoPrompt, OutputMode, ReportBuilder};
    use crate::rhsm::{MockSubscriptionService, ORG_NOT_SPECIFIED};
    use crate::systemd::MockServiceManager;
    use crate::telemetry::{MockTelemetryClient, TelemetryError};

    fn password() -> Registration {
        Registration::Password {
            organization: String::new(),
            username: "jdoe".to_string(),
            password: "secret".to_string(),
        }
    }

    fn request(features: FeaturePreferences) -> ConnectRequest {
        ConnectRequest {
            registration: password(),
            content_templates: Vec::new(),
            features,
            reasons: BTreeMap::new(),
        }
    }

    fn ok_services() -> MockServiceManager {
        let mut services = MockServiceManager::new();
        services.expect_enable_unit().returning(|_, _, _| Ok(()));
        services.expect_start_unit().returning(|_, _| Ok(()));
        services.expect_reload().returning(|| Ok(()));
        services
    }

    fn run(collaborators: Collaborators, request: &ConnectRequest) -> (ConnectionOutcome, String, bool) {
        let (_dir, ctx) = context_with(collaborators);
        let mut report = ReportBuilder::new(Vec::new(), OutputMode::Human);
        let outcome = connect(&ctx, "node1", request, &mut report, &mut NoPrompt);
        let marker = ctx.marker.exists();
        (outcome, String::from_utf8(report.into_inner()).unwrap(), marker)
    }

    #[test]
    fn successful_connect_runs_every_step() {
        let mut rhsm = MockSubscriptionService::new();
        rhsm.expect_register()
            .withf(|org, user, pass, opts| {
                org.is_empty() && user == "jdoe" && pass == "secret" && opts.enable_content
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));
        let mut telemetry = MockTelemetryClient::new();
        telemetry.expect_register().times(1).returning(|| Ok(()));

        let (outcome, out, marker) = run(
            Collaborators {
                subscription: Arc::new(rhsm),
                telemetry: Arc::new(telemetry),
                services: Arc::new(ok_services()),
            },
            &request(FeaturePreferences::default()),
        );

        assert!(!outcome.has_errors());
        assert!(marker);
        for kind in [StepKind::Subscription, StepKind::Telemetry, StepKind::Services] {
            assert_eq!(outcome.status(kind), &StepStatus::Succeeded);
        }
        assert!(outcome.feature(CONTENT).unwrap().successful);
        insta::assert_snapshot!(out.trim(), @r"
        Connecting node1 to Red Hat.
        This might take a few seconds.

        Features preferences: [✓]content, [✓]analytics, [✓]remote-management

         [✓] Connected to Red Hat Subscription Management
          [✓] Content ... Red Hat repository file generated
          [✓] Analytics ... Connected to Red Hat Lightspeed (formerly Insights)
          [✓] Remote Management ... Activated the yggdrasil service

        Successfully connected to Red Hat!
        ");
    }

    #[test]
    fn failed_registration_skips_later_steps() {
        let mut rhsm = MockSubscriptionService::new();
        rhsm.expect_register()
            .returning(|_, _, _, _| Err(RhsmError::Bus("Invalid Credentials".to_string())));
        let mut telemetry = MockTelemetryClient::new();
        telemetry.expect_register().never();

        let (outcome, out, marker) = run(
            Collaborators {
                subscription: Arc::new(rhsm),
                telemetry: Arc::new(telemetry),
                ..Collaborators::default()
            },
            &request(FeaturePreferences::default()),
        );

        assert!(!marker);
        assert_eq!(outcome.steps().len(), 3);
        assert_eq!(outcome.status(StepKind::Telemetry), &StepStatus::Skipped);
        assert_eq!(outcome.status(StepKind::Services), &StepStatus::Skipped);
        assert!(outcome.feature(ANALYTICS).unwrap().skipped);
        assert!(outcome.feature(REMOTE_MANAGEMENT).unwrap().skipped);
        let errors: Vec<String> = outcome.errors().map(ToString::to_string).collect();
        assert_eq!(
            errors,
            vec!["cannot connect to Red Hat Subscription Management: Invalid Credentials"]
        );
        assert!(out.contains("[𐄂] Skipping connection to Red Hat Lightspeed (formerly Insights)"));
        assert!(!out.contains("Successfully connected"));
    }

    #[test]
    fn disabled_features_are_not_attempted() {
        let mut rhsm = MockSubscriptionService::new();
        rhsm.expect_register()
            .withf(|_, _, _, opts| opts.enable_content)
            .returning(|_, _, _, _| Ok(()));
        let mut prefs = FeaturePreferences::default();
        prefs.set(ANALYTICS, false);
        prefs.set(REMOTE_MANAGEMENT, false);
        let mut req = request(prefs);
        req.reasons.insert(
            REMOTE_MANAGEMENT,
            "required feature \"analytics\" is disabled".to_string(),
        );

        let (outcome, out, _) = run(
            Collaborators {
                subscription: Arc::new(rhsm),
                ..Collaborators::default()
            },
            &req,
        );

        assert!(!outcome.has_errors());
        assert_eq!(
            outcome.status(StepKind::Services),
            &StepStatus::Disabled {
                reason: Some("required feature \"analytics\" is disabled".to_string())
            }
        );
        assert!(!outcome.feature(ANALYTICS).unwrap().enabled);
        assert!(out.contains(
            "  [ ] Management .... Starting yggdrasil service disabled (required feature \"analytics\" is disabled)"
        ));
    }

    #[test]
    fn telemetry_failure_does_not_block_services() {
        let mut rhsm = MockSubscriptionService::new();
        rhsm.expect_register().returning(|_, _, _, _| Ok(()));
        let mut telemetry = MockTelemetryClient::new();
        telemetry
            .expect_register()
            .returning(|| Err(TelemetryError::NotInstalled("/usr/bin/insights-client".to_string())));

        let (outcome, _, _) = run(
            Collaborators {
                subscription: Arc::new(rhsm),
                telemetry: Arc::new(telemetry),
                services: Arc::new(ok_services()),
            },
            &request(FeaturePreferences::default()),
        );

        assert_eq!(outcome.status(StepKind::Services), &StepStatus::Succeeded);
        let analytics = outcome.feature(ANALYTICS).unwrap();
        assert!(!analytics.successful);
        assert_eq!(
            analytics.error.as_deref(),
            Some("cannot connect to Red Hat Lightspeed (formerly Insights): /usr/bin/insights-client is not installed")
        );
    }

    struct PickOrg;

    impl Prompter for PickOrg {
        fn username(&mut self) -> io::Result<String> {
            Ok(String::new())
        }

        fn password(&mut self) -> io::Result<String> {
            Ok(String::new())
        }

        fn organization(&mut self, choices: &[String]) -> io::Result<Option<String>> {
            Ok(choices.last().cloned())
        }
    }

    #[test]
    fn organization_is_asked_once() {
        let mut rhsm = MockSubscriptionService::new();
        rhsm.expect_register()
            .with(eq(""), eq("jdoe"), eq("secret"), mockall::predicate::always())
            .times(1)
            .returning(|_, _, _, _| {
                Err(RhsmError::OrgNotSpecified {
                    severity: "error".to_string(),
                    message: ORG_NOT_SPECIFIED.to_string(),
                })
            });
        rhsm.expect_organizations()
            .times(1)
            .returning(|_, _| Ok(vec!["acme".to_string(), "initech".to_string()]));
        rhsm.expect_register()
            .with(eq("initech"), eq("jdoe"), eq("secret"), mockall::predicate::always())
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let (_dir, ctx) = context_with(Collaborators {
            subscription: Arc::new(rhsm),
            ..Collaborators::default()
        });
        let mut prefs = FeaturePreferences::default();
        prefs.set(ANALYTICS, false);
        prefs.set(REMOTE_MANAGEMENT, false);
        let mut report = ReportBuilder::new(Vec::new(), OutputMode::Machine);
        let outcome = connect(&ctx, "node1", &request(prefs), &mut report, &mut PickOrg);
        assert_eq!(outcome.status(StepKind::Subscription), &StepStatus::Succeeded);
    }

    #[test]
    fn organization_prompt_without_answer_fails() {
        let mut rhsm = MockSubscriptionService::new();
        rhsm.expect_register().times(1).returning(|_, _, _, _| {
            Err(RhsmError::OrgNotSpecified {
                severity: "error".to_string(),
                message: "Organization required".to_string(),
            })
        });
        rhsm.expect_organizations()
            .returning(|_, _| Ok(vec!["acme".to_string()]));

        let (outcome, _, _) = run(
            Collaborators {
                subscription: Arc::new(rhsm),
                ..Collaborators::default()
            },
            &request(FeaturePreferences::default()),
        );
        assert_eq!(
            outcome.status(StepKind::Subscription).error().unwrap().to_string(),
            "cannot connect to Red Hat Subscription Management: error: Organization required"
        );
    }

    #[test]
    fn activation_keys_use_their_own_call() {
        let mut rhsm = MockSubscriptionService::new();
        rhsm.expect_register_with_activation_keys()
            .withf(|org, keys, opts| {
                org == "acme" && keys == ["key-1".to_string()] && opts.content_templates == ["rhel-9".to_string()]
            })
            .times(1)
            .returning(|_, _, _| Ok(()));
        let mut prefs = FeaturePreferences::default();
        prefs.set(ANALYTICS, false);
        prefs.set(REMOTE_MANAGEMENT, false);
        let req = ConnectRequest {
            registration: Registration::ActivationKeys {
                organization: "acme".to_string(),
                keys: vec!["key-1".to_string()],
            },
            content_templates: vec!["rhel-9".to_string()],
            features: prefs,
            reasons: BTreeMap::new(),
        };
        let (outcome, _, _) = run(
            Collaborators {
                subscription: Arc::new(rhsm),
                ..Collaborators::default()
            },
            &req,
        );
        assert!(!outcome.has_errors());
    }

    #[test]
    fn registration_debug_hides_password() {
        let debug = format!("{:?}", password());
        assert!(!debug.contains("secret"));
    }
}
