//! Terminal implementation of [`SelectionPrompt`].
//!
//! Options are listed on stderr with their index; emphasized ones carry a `>`
//! marker. The answer is a line of space separated indices. Bad input, an
//! index out of range or an answer the rule rejects makes the prompt ask
//! again. End of input on stdin withdraws the whole operation.

use std::io::{self, BufRead, Write};

use triage_client::{ClientError, SelectionPrompt};
use triage_core::{PromptOption, SelectionRule};
use triage_logging::triage_debug;

/// Source of answer lines. `Ok(None)` means end of input.
#[async_trait::async_trait]
pub trait LineSource: Send {
    async fn read_line(&mut self) -> io::Result<Option<String>>;
}

/// Reads lines from the process' stdin on the blocking pool.
pub struct StdinLines;

#[async_trait::async_trait]
impl LineSource for StdinLines {
    async fn read_line(&mut self) -> io::Result<Option<String>> {
        tokio::task::spawn_blocking(|| -> io::Result<Option<String>> {
            let mut line = String::new();
            let read = io::stdin().lock().read_line(&mut line)?;
            Ok(if read == 0 { None } else { Some(line) })
        })
        .await
        .map_err(io::Error::other)?
    }
}

pub struct TerminalPrompt<L, W> {
    lines: L,
    out: W,
}

impl TerminalPrompt<StdinLines, io::Stderr> {
    pub fn stdio() -> Self {
        Self::new(StdinLines, io::stderr())
    }
}

impl<L, W> TerminalPrompt<L, W> {
    pub fn new(lines: L, out: W) -> Self {
        Self { lines, out }
    }

    #[cfg(test)]
    fn into_output(self) -> W {
        self.out
    }
}

impl<L: LineSource, W: Write + Send> TerminalPrompt<L, W> {
    fn print(&mut self, text: &str) -> Result<(), ClientError> {
        self.out
            .write_all(text.as_bytes())
            .and_then(|()| self.out.flush())
            .map_err(|err| ClientError::Prompt(err.to_string()))
    }
}

#[async_trait::async_trait]
impl<L: LineSource, W: Write + Send> SelectionPrompt for TerminalPrompt<L, W> {
    async fn choose(
        &mut self,
        heading: &str,
        options: &[PromptOption],
        rule: SelectionRule,
    ) -> Result<Vec<usize>, ClientError> {
        loop {
            self.print(&render_options(heading, options))?;
            let line = self
                .lines
                .read_line()
                .await
                .map_err(|err| ClientError::Prompt(err.to_string()))?
                .ok_or(ClientError::Cancelled)?;

            let answer = match parse_answer(&line, options.len()) {
                Ok(answer) => answer,
                Err(complaint) => {
                    self.print(&format!("{complaint}\n"))?;
                    continue;
                }
            };
            if !rule.accepts(&answer) {
                triage_debug!("answer {:?} rejected by {:?}", answer, rule);
                self.print("select at least one option\n")?;
                continue;
            }
            if !answer.is_empty() {
                let mut summary = String::from("you selected:\n");
                for &index in &answer {
                    summary.push_str(&format!("  {:?}\n", options[index].label));
                }
                self.print(&summary)?;
            }
            return Ok(answer);
        }
    }
}

pub fn render_options(heading: &str, options: &[PromptOption]) -> String {
    let mut text = format!(
        "\n{heading}\nEnter the numbers of your selection separated by spaces and finish with enter.\n"
    );
    for (index, option) in options.iter().enumerate() {
        let marker = if option.emphasized { '>' } else { ' ' };
        text.push_str(&format!(" {marker}{index:>2} {:?}\n", option.label));
    }
    text.push_str("> ");
    text
}

/// Parses a line of indices, dropping repeats. The error is the message to
/// show before asking again.
pub fn parse_answer(line: &str, count: usize) -> Result<Vec<usize>, String> {
    let mut answer = Vec::new();
    for word in line.split_whitespace() {
        let index: usize = word
            .parse()
            .map_err(|_| format!("bad input: {word:?}"))?;
        if index >= count {
            return Err(format!("out of range: {index}"));
        }
        if !answer.contains(&index) {
            answer.push(index);
        }
    }
    Ok(answer)
}
