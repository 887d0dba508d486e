//! Interactive candidate selection

use devforge_core::ResolvedPackage;
use std::io::{BufRead, IsTerminal, Write};
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct CandidateRow {
    #[tabled(rename = "No.")]
    number: usize,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Package")]
    identifier: String,
    #[tabled(rename = "Version")]
    version: String,
}

/// Render candidates as a numbered table, numbering from 1
pub fn candidate_table(candidates: &[ResolvedPackage]) -> String {
    let rows: Vec<CandidateRow> = candidates
        .iter()
        .enumerate()
        .map(|(i, c)| CandidateRow {
            number: i + 1,
            name: c.canonical_name.clone(),
            identifier: c.platform_identifier.clone(),
            version: match &c.substitution {
                Some(note) => format!("{} ({})", c.resolved_version, note),
                None => c.resolved_version.clone(),
            },
        })
        .collect();
    Table::new(rows).to_string()
}

/// Parse a 1-based choice. Blank, `q` or out-of-range input yields `None`.
pub fn parse_choice(input: &str, count: usize) -> Option<usize> {
    let input = input.trim();
    if input.is_empty() || input.eq_ignore_ascii_case("q") {
        return None;
    }
    input.parse::<usize>().ok().filter(|n| (1..=count).contains(n))
}

/// Source of a user's choice among candidates
pub trait SelectionPrompt {
    /// Whether a person can answer
    fn is_interactive(&self) -> bool;

    /// 1-based choice, or `None` when the user declines
    fn choose(&self, candidates: &[ResolvedPackage]) -> std::io::Result<Option<usize>>;
}

/// Prompts on stdin, re-asking on invalid numbers
pub struct TerminalPrompt;

impl SelectionPrompt for TerminalPrompt {
    fn is_interactive(&self) -> bool {
        std::io::stdin().is_terminal()
    }

    fn choose(&self, candidates: &[ResolvedPackage]) -> std::io::Result<Option<usize>> {
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();
        loop {
            write!(stdout, "Enter the number of the package to use (q to cancel): ")?;
            stdout.flush()?;

            let mut line = String::new();
            if stdin.lock().read_line(&mut line)? == 0 {
                return Ok(None);
            }
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("q") {
                return Ok(None);
            }
            match parse_choice(trimmed, candidates.len()) {
                Some(choice) => return Ok(Some(choice)),
                None => writeln!(stdout, "Please enter a number between 1 and {}", candidates.len())?,
            }
        }
    }
}

/// Never answers; used when stdin is not a terminal
pub struct NonInteractive;

impl SelectionPrompt for NonInteractive {
    fn is_interactive(&self) -> bool {
        false
    }

    fn choose(&self, _candidates: &[ResolvedPackage]) -> std::io::Result<Option<usize>> {
        Ok(None)
    }
}
