use std::fmt;

use anyhow::{anyhow, Result};
use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// The closed set of tool families boxkit can install. Dispatch happens over
/// this enum at compile time; there is no runtime installer registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    Go,
    Npm,
    Cargo,
    Uv,
    Gem,
    Script,
}

impl ToolKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Go => "go",
            Self::Npm => "npm",
            Self::Cargo => "cargo",
            Self::Uv => "uv",
            Self::Gem => "gem",
            Self::Script => "script",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "go" => Ok(Self::Go),
            "npm" => Ok(Self::Npm),
            "cargo" => Ok(Self::Cargo),
            "uv" => Ok(Self::Uv),
            "gem" => Ok(Self::Gem),
            "script" => Ok(Self::Script),
            _ => Err(anyhow!("unsupported tool type: {value}")),
        }
    }

    /// The host command each family needs, as checked by `doctor`.
    pub fn host_command(self) -> &'static str {
        match self {
            Self::Go => "go",
            Self::Npm => "npm",
            Self::Cargo => "cargo-binstall",
            Self::Uv => "uv",
            Self::Gem => "gem",
            Self::Script => "sh",
        }
    }

    pub fn all() -> [Self; 6] {
        [
            Self::Go,
            Self::Npm,
            Self::Cargo,
            Self::Uv,
            Self::Gem,
            Self::Script,
        ]
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tool source: a package path for the manager-backed kinds, or one or
/// more shell lines for `script` tools. Accepts a YAML string or a YAML
/// sequence of strings; a single entry round-trips back to a plain string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source(Vec<String>);

impl Source {
    pub fn new(lines: Vec<String>) -> Self {
        Self(lines)
    }

    pub fn single(value: impl Into<String>) -> Self {
        Self(vec![value.into()])
    }

    /// Joined form used for display, binary-name detection, and script
    /// bodies (multi-line sources are newline-joined shell snippets).
    pub fn as_text(&self) -> String {
        self.0.join("\n")
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_text())
    }
}

impl Serialize for Source {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.0.len() == 1 {
            serializer.serialize_str(&self.0[0])
        } else {
            serializer.collect_seq(self.0.iter())
        }
    }
}

impl<'de> Deserialize<'de> for Source {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SourceVisitor;

        impl<'de> Visitor<'de> for SourceVisitor {
            type Value = Source;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a string or a sequence of strings")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Source, E> {
                Ok(Source::single(value))
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Source, A::Error> {
                let mut lines = Vec::new();
                while let Some(line) = seq.next_element::<String>()? {
                    lines.push(line);
                }
                Ok(Source::new(lines))
            }
        }

        deserializer.deserialize_any(SourceVisitor)
    }
}

/// A single tool declaration from `box.yml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tool {
    #[serde(rename = "type")]
    pub kind: ToolKind,
    pub source: Source,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub binaries: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sandbox: Option<bool>,
}

impl Tool {
    pub fn new(kind: ToolKind, source: Source) -> Self {
        Self {
            kind,
            source,
            alias: None,
            version: None,
            binaries: Vec::new(),
            args: Vec::new(),
            sandbox: None,
        }
    }

    /// The manifest identity of this tool: the alias if one is configured,
    /// else the source string.
    pub fn display_name(&self) -> String {
        match &self.alias {
            Some(alias) if !alias.is_empty() => alias.clone(),
            _ => self.source.as_text(),
        }
    }

    /// Whether installs of this tool run under the sandbox applier.
    /// Scripts are sandboxed unless explicitly opted out; package-manager
    /// kinds already confine writes via their prefix/root flags.
    pub fn sandbox_enabled(&self) -> bool {
        self.sandbox.unwrap_or(self.kind == ToolKind::Script)
    }

    /// The binaries this tool publishes: the declared list, or the name
    /// derived from the source when nothing is declared.
    pub fn binary_names(&self) -> Vec<String> {
        if self.binaries.is_empty() {
            vec![detect_binary_name(&self.source.as_text())]
        } else {
            self.binaries.clone()
        }
    }
}

/// Derives a binary name from a package source string: the last path
/// component, after stripping a version suffix (`@...` or `==...`) and a
/// trailing Go major-version segment (`/v2`, `/v3`, ...).
pub fn detect_binary_name(source: &str) -> String {
    let mut path = source;
    if let Some(index) = path.find('@') {
        path = &path[..index];
    }
    if let Some(index) = path.find("==") {
        path = &path[..index];
    }

    let mut parts: Vec<&str> = path.split('/').collect();
    if parts.len() > 1 {
        let last = parts[parts.len() - 1];
        if last.len() >= 2
            && last.starts_with('v')
            && last[1..].chars().all(|ch| ch.is_ascii_digit())
        {
            parts.pop();
        }
    }

    parts.last().copied().unwrap_or(path).to_string()
}
