use std::io::{self, Write};

use crate::Result;

/// Source of interactive operator answers.
///
/// The install flow only ever needs "ask a question, get a line back", so
/// tests drive it with scripted answers instead of a terminal.
pub trait Prompt {
    fn ask(&mut self, question: &str) -> Result<String>;
}

/// Reads answers from the controlling terminal.
pub struct TerminalPrompt;

impl Prompt for TerminalPrompt {
    fn ask(&mut self, question: &str) -> Result<String> {
        let mut out = io::stdout();
        write!(out, "{question}: ")?;
        out.flush()?;
        let mut line = String::new();
        io::stdin().read_line(&mut line)?;
        Ok(line.trim().to_string())
    }
}

#[cfg(test)]
pub struct ScriptedPrompt {
    answers: std::collections::VecDeque<String>,
    pub asked: Vec<String>,
}

#[cfg(test)]
impl ScriptedPrompt {
    pub fn new<I>(answers: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            asked: Vec::new(),
        }
    }
}

#[cfg(test)]
impl Prompt for ScriptedPrompt {
    fn ask(&mut self, question: &str) -> Result<String> {
        self.asked.push(question.to_string());
        self.answers.pop_front().ok_or_else(|| {
            crate::Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("no scripted answer left for {question:?}"),
            ))
        })
    }
}
