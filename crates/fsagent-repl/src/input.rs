use std::collections::VecDeque;
use std::io;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

/// Where interactive queries come from.
#[async_trait]
pub trait LineSource: Send {
    /// The next line without its terminator, or `None` at end of input.
    async fn next_line(&mut self) -> io::Result<Option<String>>;
}

/// Lines typed on the terminal.
pub struct StdinLines {
    lines: Lines<BufReader<Stdin>>,
}

impl StdinLines {
    pub fn new() -> Self {
        Self { lines: BufReader::new(tokio::io::stdin()).lines() }
    }
}

impl Default for StdinLines {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LineSource for StdinLines {
    async fn next_line(&mut self) -> io::Result<Option<String>> {
        self.lines.next_line().await
    }
}

/// A fixed list of lines, then end of input.
#[derive(Debug, Default)]
pub struct ScriptedLines {
    lines: VecDeque<String>,
}

impl ScriptedLines {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { lines: lines.into_iter().map(Into::into).collect() }
    }
}

#[async_trait]
impl LineSource for ScriptedLines {
    async fn next_line(&mut self) -> io::Result<Option<String>> {
        Ok(self.lines.pop_front())
    }
}
