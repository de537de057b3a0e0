use std::fmt;

use serde::{Deserialize, Serialize};

/// Command column of a test-script row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Command {
    Open,
    Click,
    Type,
    Submit,
    Pause,
    /// A verification command recorded from the extension's context menu
    /// (`verifyText`, `assertTitle`, `waitForVisible`...), passed through.
    Verification(String),
}

impl Command {
    pub fn as_str(&self) -> &str {
        match self {
            Command::Open => "open",
            Command::Click => "click",
            Command::Type => "type",
            Command::Submit => "submit",
            Command::Pause => "pause",
            Command::Verification(name) => name,
        }
    }
}

impl From<String> for Command {
    fn from(s: String) -> Self {
        match s.as_str() {
            "open" => Command::Open,
            "click" => Command::Click,
            "type" => Command::Type,
            "submit" => Command::Submit,
            "pause" => Command::Pause,
            _ => Command::Verification(s),
        }
    }
}

impl From<Command> for String {
    fn from(c: Command) -> Self {
        c.as_str().to_string()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One command/target/value row of a compiled test script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub command: Command,
    pub target: String,
    pub value: String,
}

impl Instruction {
    pub fn new(command: Command, target: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            command,
            target: target.into(),
            value: value.into(),
        }
    }

    pub fn open(url: &str) -> Self {
        Self::new(Command::Open, url, "")
    }

    pub fn click(target: &str) -> Self {
        Self::new(Command::Click, target, "")
    }

    pub fn type_text(target: &str, value: &str) -> Self {
        Self::new(Command::Type, target, value)
    }

    pub fn submit(target: &str) -> Self {
        Self::new(Command::Submit, target, "")
    }

    /// Pause of `gap_ms`, annotated with the gap in seconds, e.g. `Wait 2.5s`.
    pub fn pause(gap_ms: i64) -> Self {
        Self::new(
            Command::Pause,
            gap_ms.to_string(),
            format!("Wait {:.1}s", gap_ms as f64 / 1000.0),
        )
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} | {} | {}", self.command, self.target, self.value)
    }
}

/// Output of the event compiler: instructions plus the site's base URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledScript {
    pub base_url: String,
    pub instructions: Vec<Instruction>,
}
