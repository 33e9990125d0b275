//! Interactive selector and confirmer over a line-based terminal.
//!
//! Prompts go to the output stream (stderr in the binary) so that
//! `--format json` keeps stdout clean.

use distsync_core::{
    Candidate, Classification, Confirmer, EntityType, NaturalKey, PlanSummary, Selection, Selector,
};
use std::collections::BTreeSet;
use std::io::{self, BufRead, Stderr, StdinLock, Write};

/// Lets the operator exclude candidates by number.
///
/// All candidates start selected. The operator types the numbers to leave
/// out, an empty line to accept, or `q` to cancel. End of input cancels.
pub struct PromptSelector<R, W> {
    input: R,
    output: W,
}

impl PromptSelector<StdinLock<'static>, Stderr> {
    /// Prompts on stderr and reads stdin.
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stderr())
    }
}

impl<R: BufRead, W: Write> PromptSelector<R, W> {
    /// Creates a selector over the given streams.
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn ask(&mut self, entity: &EntityType, candidates: &[Candidate]) -> io::Result<Selection> {
        writeln!(
            self.output,
            "{} candidates for {} (all selected):",
            candidates.len(),
            entity.name()
        )?;
        for (i, candidate) in candidates.iter().enumerate() {
            let marker = match candidate.class {
                Classification::Update => '~',
                _ => '+',
            };
            writeln!(self.output, "  [{}] {} {}", i + 1, marker, candidate.description)?;
        }
        loop {
            write!(
                self.output,
                "Numbers to exclude (space separated), empty to continue, q to cancel: "
            )?;
            self.output.flush()?;

            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                return Ok(Selection::Cancelled);
            }
            match parse_exclusions(&line, candidates.len()) {
                Ok(None) => return Ok(Selection::Cancelled),
                Ok(Some(excluded)) => {
                    let chosen: BTreeSet<NaturalKey> = candidates
                        .iter()
                        .enumerate()
                        .filter(|(i, _)| !excluded.contains(&(i + 1)))
                        .map(|(_, c)| c.key.clone())
                        .collect();
                    writeln!(
                        self.output,
                        "{} of {} selected",
                        chosen.len(),
                        candidates.len()
                    )?;
                    return Ok(Selection::Chosen(chosen));
                }
                Err(message) => writeln!(self.output, "{message}")?,
            }
        }
    }
}

impl<R: BufRead, W: Write> Selector for PromptSelector<R, W> {
    fn select(&mut self, entity: &EntityType, candidates: &[Candidate]) -> Selection {
        // A broken terminal cancels the run.
        self.ask(entity, candidates)
            .unwrap_or(Selection::Cancelled)
    }
}

/// Parses an exclusion line: `None` for cancel, else 1-based numbers.
fn parse_exclusions(line: &str, count: usize) -> Result<Option<BTreeSet<usize>>, String> {
    let line = line.trim();
    if line.eq_ignore_ascii_case("q") {
        return Ok(None);
    }
    let mut excluded = BTreeSet::new();
    for token in line.split(|c: char| c.is_whitespace() || c == ',') {
        if token.is_empty() {
            continue;
        }
        match token.parse::<usize>() {
            Ok(n) if (1..=count).contains(&n) => {
                excluded.insert(n);
            }
            _ => return Err(format!("'{token}' is not a number between 1 and {count}")),
        }
    }
    Ok(Some(excluded))
}

/// Shows the plan summary and asks for `yes`.
pub struct PromptConfirmer<R, W> {
    input: R,
    output: W,
}

impl PromptConfirmer<StdinLock<'static>, Stderr> {
    /// Prompts on stderr and reads stdin.
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stderr())
    }
}

impl<R: BufRead, W: Write> PromptConfirmer<R, W> {
    /// Creates a confirmer over the given streams.
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn ask(&mut self, summary: &PlanSummary) -> io::Result<bool> {
        write!(self.output, "{summary}")?;
        write!(self.output, "Type 'yes' to confirm: ")?;
        self.output.flush()?;
        let mut line = String::new();
        self.input.read_line(&mut line)?;
        Ok(line.trim().eq_ignore_ascii_case("yes"))
    }
}

impl<R: BufRead, W: Write> Confirmer for PromptConfirmer<R, W> {
    fn confirm(&mut self, summary: &PlanSummary) -> bool {
        self.ask(summary).unwrap_or(false)
    }
}
