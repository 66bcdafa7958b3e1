//! Client-side denylist for `execute_command`.
//!
//! This is a last line of defense in front of the gateway's own exec
//! policy, not a replacement for it.

use std::sync::LazyLock;

use regex::Regex;

const BLOCKED_PATTERNS: &[&str] = &[
    // recursive delete from the filesystem root
    r"^rm\s+-rf\s+/",
    r"^sudo\s",
    r"^chmod\s+(-R\s+)?777",
    // anything piped into a shell
    r"\|\s*(ba)?sh\s*$",
    r"^(curl|wget)\s.*\|\s*(ba)?sh",
    r"^mkfs(\.|\s)",
    r"^dd\s+if=",
    // raw block-device writes
    r">\s*/dev/sd[a-z]",
];

static DENYLIST: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    BLOCKED_PATTERNS
        .iter()
        .filter_map(|pattern| Regex::new(pattern).ok())
        .collect()
});

/// Whether `command` (trimmed) matches any denylisted pattern.
pub fn is_blocked(command: &str) -> bool {
    let command = command.trim();
    DENYLIST.iter().any(|re| re.is_match(command))
}

pub fn blocked_message(command: &str) -> String {
    format!("Blocked: \"{command}\" is not allowed for safety reasons")
}
