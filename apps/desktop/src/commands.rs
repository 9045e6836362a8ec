use anyhow::{anyhow, bail, Result};
use shared::domain::VoteDirection;

/// One line typed at the interactive prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedCommand {
    Post(String),
    /// Votes on the entry at this 1-based position of the printed feed.
    Vote(usize, VoteDirection),
    Refresh,
    Help,
    Quit,
}

pub const HELP: &str = "commands: post <text> | up <n> | down <n> | refresh | help | quit";

impl FeedCommand {
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        let (word, rest) = line
            .split_once(char::is_whitespace)
            .map(|(word, rest)| (word, rest.trim()))
            .unwrap_or((line, ""));

        match word.to_ascii_lowercase().as_str() {
            "post" | "say" => Ok(Self::Post(rest.to_string())),
            "up" => Ok(Self::Vote(position(rest)?, VoteDirection::Upvote)),
            "down" => Ok(Self::Vote(position(rest)?, VoteDirection::Downvote)),
            "refresh" | "r" => Ok(Self::Refresh),
            "help" | "?" => Ok(Self::Help),
            "quit" | "exit" | "q" => Ok(Self::Quit),
            "" => bail!("empty command"),
            other => bail!("unknown command '{other}'"),
        }
    }
}

fn position(raw: &str) -> Result<usize> {
    let n: usize = raw
        .parse()
        .map_err(|_| anyhow!("expected a message number, got '{raw}'"))?;
    if n == 0 {
        bail!("message numbers start at 1");
    }
    Ok(n)
}
