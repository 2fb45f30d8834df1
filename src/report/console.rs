//! [`ReportBuilder`]: the single output sink of an invocation.
use std::io::Write;

use serde::Serialize;

use crate::orchestrator::{ConnectionOutcome, Direction, SystemStatus};

use super::document::{
    ConnectDocument, DisconnectDocument, FeatureEntry, StatusDocument, to_pretty_json,
};
use super::{ExitStatus, Icon, Indent, OutputMode, Reporter, Spinner, table};

const FOOTER: &str = "Manage your connected systems: https://red.ht/connector";

/// Identity of the host as seen by the invoking process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostInfo {
    /// Host name, empty when it could not be read.
    pub hostname: String,
    /// Why the host name could not be read.
    pub hostname_error: Option<String>,
    /// Effective uid.
    pub uid: u32,
}

/// Writes human lines as they happen and the closing summary or JSON
/// document at the end of the run.
///
/// Write errors on the output stream (e.g. a closed pipe) are ignored.
#[derive(Debug)]
pub struct ReportBuilder<W: Write> {
    out: W,
    mode: OutputMode,
    colored: bool,
    animated: bool,
    verbose: bool,
    width: usize,
}

impl<W: Write> ReportBuilder<W> {
    /// Plain, non-verbose builder writing to `out`.
    pub fn new(out: W, mode: OutputMode) -> Self {
        Self {
            out,
            mode,
            colored: false,
            animated: false,
            verbose: false,
            width: 80,
        }
    }

    /// Color the status icons.
    #[must_use]
    pub const fn with_color(mut self, colored: bool) -> Self {
        self.colored = colored;
        self
    }

    /// Show spinners during blocking calls.
    #[must_use]
    pub const fn with_animation(mut self, animated: bool) -> Self {
        self.animated = animated;
        self
    }

    /// Print the per-step duration table.
    #[must_use]
    pub const fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Truncate table rows to `width` columns.
    #[must_use]
    pub const fn with_width(mut self, width: usize) -> Self {
        self.width = width;
        self
    }

    /// Output mode of this run.
    #[must_use]
    pub const fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Consume the builder and return the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn human(&mut self, text: &str) {
        if !self.mode.is_machine() {
            self.out.write_all(text.as_bytes()).ok();
        }
    }

    fn emit_document<T: Serialize>(&mut self, doc: &T) -> ExitStatus {
        match to_pretty_json(doc) {
            Ok(json) => {
                writeln!(self.out, "{json}").ok();
                ExitStatus::Success
            }
            Err(e) => {
                tracing::error!("unable to serialize report: {e}");
                ExitStatus::Software
            }
        }
    }

    fn durations(&mut self, outcome: &ConnectionOutcome) {
        if !self.verbose {
            return;
        }
        let mut rows = vec![vec!["STEP".to_string(), "DURATION".to_string()]];
        rows.extend(outcome.steps().iter().map(|s| {
            vec![
                s.kind.label().to_string(),
                format!("{}ms", s.duration.as_millis()),
            ]
        }));
        let rendered = table::render(&rows, self.width);
        self.human(&format!("\n{rendered}"));
    }

    fn errors(&mut self, outcome: &ConnectionOutcome) {
        if !outcome.has_errors() {
            return;
        }
        let mut rows = vec![vec!["STEP".to_string(), "ERROR".to_string()]];
        rows.extend(
            outcome
                .steps()
                .iter()
                .filter_map(|s| s.status.error().map(|e| (s.kind, e)))
                .map(|(kind, e)| vec![kind.label().to_string(), e.to_string()]),
        );
        let rendered = table::render(&rows, self.width);
        self.human(&format!(
            "\nThe following errors were encountered during {}:\n\n{rendered}\n\
             Please see 'journalctl -t rhc' for full details.\n",
            outcome.direction().action()
        ));
    }

    fn finish_run(&mut self, outcome: &ConnectionOutcome) -> ExitStatus {
        self.human(&format!("\n{FOOTER}\n"));
        self.durations(outcome);
        self.errors(outcome);
        if outcome.has_errors() {
            ExitStatus::Failure
        } else {
            ExitStatus::Success
        }
    }

    /// Close a connect run: footer, optional tables, or the JSON document.
    pub fn finish_connect(&mut self, host: &HostInfo, outcome: &ConnectionOutcome) -> ExitStatus {
        let status = if self.mode.is_machine() {
            let doc = ConnectDocument::new(host, outcome);
            match self.emit_document(&doc) {
                ExitStatus::Success if outcome.has_errors() => ExitStatus::Failure,
                other => other,
            }
        } else {
            self.finish_run(outcome)
        };
        self.out.flush().ok();
        status
    }

    /// Close a disconnect run: footer, optional tables, or the JSON document.
    pub fn finish_disconnect(
        &mut self,
        host: &HostInfo,
        outcome: &ConnectionOutcome,
    ) -> ExitStatus {
        let status = if self.mode.is_machine() {
            let doc = DisconnectDocument::new(host, outcome);
            match self.emit_document(&doc) {
                ExitStatus::Success if outcome.has_errors() => ExitStatus::Failure,
                other => other,
            }
        } else {
            self.finish_run(outcome)
        };
        self.out.flush().ok();
        status
    }

    /// Close a status run. Any probe not in the connected state yields
    /// [`ExitStatus::Failure`].
    pub fn finish_status(&mut self, host: &HostInfo, status: &SystemStatus) -> ExitStatus {
        let mut exit = if status.all_connected() {
            ExitStatus::Success
        } else {
            ExitStatus::Failure
        };
        if self.mode.is_machine() {
            let doc = StatusDocument::new(host, status);
            if self.emit_document(&doc) == ExitStatus::Software {
                exit = ExitStatus::Software;
            }
        } else {
            self.human(&format!("\n{FOOTER}\n"));
        }
        self.out.flush().ok();
        exit
    }

    /// Emit the document of a connect or disconnect that was rejected
    /// because the caller is not root. Human mode prints nothing here; the
    /// error itself is reported on stderr.
    pub fn rejected(&mut self, direction: Direction, host: &HostInfo, uid_error: &str) {
        if !self.mode.is_machine() {
            return;
        }
        let uid_error = Some(uid_error.to_string());
        match direction {
            Direction::Connect => {
                let doc = ConnectDocument {
                    hostname: host.hostname.clone(),
                    hostname_error: host.hostname_error.clone(),
                    uid: host.uid,
                    uid_error,
                    ..ConnectDocument::default()
                };
                self.emit_document(&doc);
            }
            Direction::Disconnect => {
                let doc = DisconnectDocument {
                    hostname: host.hostname.clone(),
                    hostname_error: host.hostname_error.clone(),
                    uid: host.uid,
                    uid_error,
                    ..DisconnectDocument::default()
                };
                self.emit_document(&doc);
            }
        }
        self.out.flush().ok();
    }

    /// Render `rhc configure features show`.
    ///
    /// The state column is headed `STATE` when connected (live state) and
    /// `PREFERENCE` otherwise.
    pub fn feature_table(&mut self, entries: &[FeatureEntry], connected: bool) {
        if self.mode.is_machine() {
            self.emit_document(&entries);
        } else {
            let state = if connected { "STATE" } else { "PREFERENCE" };
            let mut rows = vec![vec![
                "FEATURE".to_string(),
                state.to_string(),
                "DESCRIPTION".to_string(),
            ]];
            rows.extend(entries.iter().map(|e| {
                let icon = if e.enabled { Icon::Ok } else { Icon::Off };
                let mut glyph = icon.render(false);
                if e.mandatory {
                    glyph.push('*');
                }
                vec![e.id.to_string(), glyph, e.description.to_string()]
            }));
            let mut rendered = table::render(&rows, self.width);
            if self.colored {
                rendered = color_state_cells(&rendered, table::column_offset(&rows, 1));
            }
            self.human(&rendered);
        }
        self.out.flush().ok();
    }
}

/// Color the enabled glyph that opens the state cell at char `offset` of
/// each data row. Everything else in the table is left as rendered.
fn color_state_cells(rendered: &str, offset: usize) -> String {
    let ok = Icon::Ok.glyph();
    let mut out = String::with_capacity(rendered.len());
    for (n, line) in rendered.lines().enumerate() {
        let cell = line
            .char_indices()
            .nth(offset)
            .filter(|_| n > 0)
            .and_then(|(at, _)| line.split_at_checked(at))
            .and_then(|(head, rest)| rest.strip_prefix(ok).map(|tail| (head, tail)));
        match cell {
            Some((head, tail)) => {
                out.push_str(head);
                out.push_str(&Icon::Ok.render(true));
                out.push_str(tail);
            }
            None => out.push_str(line),
        }
        out.push('\n');
    }
    out
}

impl<W: Write> Reporter for ReportBuilder<W> {
    fn line(&mut self, indent: Indent, icon: Icon, text: &str) {
        let icon = icon.render(self.colored);
        self.human(&format!("{indent}[{icon}] {text}\n"));
    }

    fn text(&mut self, text: &str) {
        self.human(text);
    }

    fn spinner(&self, indent: Indent, message: &str) -> Spinner {
        if self.animated && !self.mode.is_machine() {
            Spinner::start(indent, message)
        } else {
            Spinner::hidden()
        }
    }
}
