//! Command grammar descriptors and matching
//!
//! A grammar is a recognized prefix phrase ("go to", "goto", ...) followed
//! by a captured target phrase spanning the rest of the normalized string.
//! Grammars are tried in a fixed priority order and the first match wins,
//! so more specific phrases must be listed before their generic prefixes
//! ("go to" before "go") to keep a short match from swallowing a longer
//! command's prefix.

/// Prefix phrases recognized as the start of a navigation command, in
/// priority order. Includes common misrecognitions of "go to".
const COMMAND_PHRASES: &[&str] = &[
    "go to",
    "goto",
    "go do",
    "go do it",
    "go 2",
    "go too",
    "go toward",
    "go through",
    "go",
    "to",
];

/// Bare trigger words scanned for anywhere in a fragment as a last-resort
/// safety net before committing text as content.
const COMMAND_TRIGGERS: &[&str] = &["go to", "goto", "go do", "go"];

/// One command grammar: a prefix phrase plus the capture-remainder rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grammar {
    /// The spoken prefix phrase, already in normalized form.
    pub phrase: &'static str,
}

impl Grammar {
    /// Try to capture a target phrase from normalized text.
    ///
    /// The text must start with the grammar's phrase followed by a space
    /// and a non-empty remainder; the remainder is the target.
    fn capture<'a>(&self, normalized: &'a str) -> Option<&'a str> {
        let rest = normalized.strip_prefix(self.phrase)?;
        let rest = rest.strip_prefix(' ')?.trim();
        if rest.is_empty() {
            None
        } else {
            Some(rest)
        }
    }
}

/// A successful command match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandMatch {
    /// The captured target-section phrase, trimmed.
    pub target: String,
    /// The phrase of the grammar that matched, for logging.
    pub grammar: &'static str,
}

/// Ordered set of command grammars.
pub struct CommandMatcher {
    grammars: Vec<Grammar>,
}

impl CommandMatcher {
    /// Create a matcher with the built-in grammar set.
    pub fn new() -> Self {
        Self {
            grammars: COMMAND_PHRASES
                .iter()
                .copied()
                .map(|phrase| Grammar { phrase })
                .collect(),
        }
    }

    /// Match normalized text against the grammars in priority order.
    pub fn find_match(&self, normalized: &str) -> Option<CommandMatch> {
        self.grammars.iter().find_map(|grammar| {
            grammar.capture(normalized).map(|target| CommandMatch {
                target: target.to_string(),
                grammar: grammar.phrase,
            })
        })
    }

    /// Whether normalized text starts with any known command phrase.
    ///
    /// Used to enter the suspected-command state even when no full match
    /// exists yet (e.g. the fragment is just "go").
    pub fn is_potential_command_prefix(&self, normalized: &str) -> bool {
        self.grammars
            .iter()
            .any(|grammar| normalized.starts_with(grammar.phrase))
    }

    /// Scan for a bare trigger word anywhere in normalized text.
    ///
    /// Returns the trigger found, if any. Deliberately aggressive: a
    /// fragment containing a trigger is withheld from content commit even
    /// mid-sentence, trading lost dictation for never misfiling a command.
    pub fn contains_trigger(&self, normalized: &str) -> Option<&'static str> {
        COMMAND_TRIGGERS
            .iter()
            .copied()
            .find(|trigger| normalized.contains(trigger))
    }
}

impl Default for CommandMatcher {
    fn default() -> Self {
        Self::new()
    }
}
