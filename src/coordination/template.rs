use anyhow::{Result, anyhow};
use std::ffi::{OsStr, OsString};
use std::fmt;

use crate::config::PLACEHOLDER;

/// Executable plus argument tokens, resolved once per job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    program: String,
    /// Argument tokens joined with single spaces
    joined_args: Option<String>,
}

/// A command line with the job substituted in, ready to spawn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCommand {
    pub program: String,
    /// Passed to the child as a single argument, job bytes untouched
    pub argument: Option<OsString>,
}

impl CommandTemplate {
    /// Build a template from raw tokens. The first token is the executable.
    pub fn parse(tokens: &[String]) -> Result<Self> {
        let (program, args) = tokens
            .split_first()
            .ok_or_else(|| anyhow!("Command template must name an executable"))?;

        if program.is_empty() {
            return Err(anyhow!("Command template executable cannot be empty"));
        }

        let joined_args = if args.is_empty() {
            None
        } else {
            Some(args.join(" "))
        };

        Ok(Self {
            program: program.clone(),
            joined_args,
        })
    }

    /// Whether any argument carries the placeholder marker
    pub fn has_placeholder(&self) -> bool {
        self.joined_args
            .as_deref()
            .is_some_and(|args| args.contains(PLACEHOLDER))
    }

    /// Replace every placeholder in the joined argument string with `job`
    pub fn resolve(&self, job: impl AsRef<OsStr>) -> ResolvedCommand {
        let job = job.as_ref();
        ResolvedCommand {
            program: self.program.clone(),
            argument: self
                .joined_args
                .as_deref()
                .map(|args| substitute(args, job)),
        }
    }
}

/// `str::replace` over an OsStr job, so non-UTF-8 bytes reach the child as is
fn substitute(args: &str, job: &OsStr) -> OsString {
    let mut pieces = args.split(PLACEHOLDER);
    let mut resolved = OsString::from(pieces.next().unwrap_or_default());
    for piece in pieces {
        resolved.push(job);
        resolved.push(piece);
    }
    resolved
}

impl fmt::Display for CommandTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.joined_args {
            Some(args) => write!(f, "{} {}", self.program, args),
            None => write!(f, "{}", self.program),
        }
    }
}

impl fmt::Display for ResolvedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.argument {
            Some(arg) => write!(f, "{} {}", self.program, arg.to_string_lossy()),
            None => write!(f, "{}", self.program),
        }
    }
}
