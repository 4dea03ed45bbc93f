// Accepted programming languages for repository search.

use std::fmt;

use crate::error::{HubError, Result};

/// Languages accepted by the repository search. Lowercase.
pub const SUPPORTED_LANGUAGES: &[&str] = &[
    "javascript",
    "python",
    "java",
    "c++",
    "c#",
    "typescript",
    "go",
    "html",
    "css",
    "ruby",
    "php",
    "rust",
    "kotlin",
    "dart",
    "scala",
    "r",
    "perl",
    "haskell",
    "julia",
    "lua",
    "shell",
    "swift",
    "powershell",
    "sql",
];

/// A validated, normalized (lowercase) language identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Language(&'static str);

impl Language {
    /// Validate a user-supplied language name, case-insensitively.
    pub fn parse(input: &str) -> Result<Self> {
        let normalized = input.trim().to_lowercase();
        SUPPORTED_LANGUAGES
            .iter()
            .find(|&&lang| lang == normalized)
            .map(|&lang| Language(lang))
            .ok_or_else(|| HubError::InvalidLanguage(input.to_string()))
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}
