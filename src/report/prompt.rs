//! Interactive credential and organization prompts.
use std::io;

use console::Term;

/// Source of answers for values missing from the command line.
pub trait Prompter {
    /// Ask for a user name.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal cannot be read.
    fn username(&mut self) -> io::Result<String>;

    /// Ask for a password without echoing it.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal cannot be read.
    fn password(&mut self) -> io::Result<String>;

    /// List `choices` and ask which organization to register into.
    ///
    /// Returns `Ok(None)` when no answer can be obtained.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal cannot be read.
    fn organization(&mut self, choices: &[String]) -> io::Result<Option<String>>;
}

/// Organizations shown per row in the selection listing.
const ORGS_PER_ROW: usize = 4;

/// Format the "Available Organizations:" listing, `ORGS_PER_ROW` per row.
#[must_use]
pub fn organization_listing(choices: &[String]) -> String {
    let width = choices.iter().map(|c| c.chars().count()).max().unwrap_or(0);
    let mut out = String::from("Available Organizations:\n");
    for row in choices.chunks(ORGS_PER_ROW) {
        let cells: Vec<String> = row.iter().map(|c| format!("{c:<width$}")).collect();
        out.push_str(cells.join("  ").trim_end());
        out.push('\n');
    }
    out
}

/// Prompts on the controlling terminal.
#[derive(Debug)]
pub struct TerminalPrompter {
    term: Term,
}

impl TerminalPrompter {
    /// Prompter bound to stdout.
    #[must_use]
    pub fn new() -> Self {
        Self {
            term: Term::stdout(),
        }
    }
}

impl Default for TerminalPrompter {
    fn default() -> Self {
        Self::new()
    }
}

impl Prompter for TerminalPrompter {
    fn username(&mut self) -> io::Result<String> {
        self.term.write_str("Username: ")?;
        Ok(self.term.read_line()?.trim().to_string())
    }

    fn password(&mut self) -> io::Result<String> {
        self.term.write_str("Password: ")?;
        let password = self.term.read_secure_line()?;
        self.term.write_str("\n")?;
        Ok(password)
    }

    fn organization(&mut self, choices: &[String]) -> io::Result<Option<String>> {
        self.term.write_str(&organization_listing(choices))?;
        self.term.write_str("\nOrganization: ")?;
        let answer = self.term.read_line()?.trim().to_string();
        self.term.write_line("")?;
        Ok((!answer.is_empty()).then_some(answer))
    }
}

/// Prompter for non-interactive runs: every question is unanswerable.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPrompt;

impl Prompter for NoPrompt {
    fn username(&mut self) -> io::Result<String> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "cannot prompt for a username",
        ))
    }

    fn password(&mut self) -> io::Result<String> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "cannot prompt for a password",
        ))
    }

    fn organization(&mut self, _: &[String]) -> io::Result<Option<String>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_wraps_after_four_organizations() {
        let orgs: Vec<String> = ["alpha", "beta", "gamma", "delta", "epsilon"]
            .iter()
            .map(ToString::to_string)
            .collect();
        insta::assert_snapshot!(organization_listing(&orgs).trim_end(), @r"
        Available Organizations:
        alpha    beta     gamma    delta
        epsilon
        ");
    }

    #[test]
    fn no_prompt_never_answers() {
        let mut prompt = NoPrompt;
        assert!(prompt.username().is_err());
        assert!(prompt.password().is_err());
        assert_eq!(prompt.organization(&["a".to_string()]).ok(), Some(None));
    }
}
