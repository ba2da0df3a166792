// branch.rs — Ticket reference → git branch name.
//
// The mapping must be total (every input yields a valid ref name) and
// idempotent (sanitizing a sanitized name is a no-op), so it runs single
// cleanup passes until the name stops changing.

/// Fallback when nothing usable survives sanitization.
pub const DEFAULT_BRANCH_TOKEN: &str = "task";

/// Characters git never allows in a ref name.
const ILLEGAL_CHARS: &[char] = &['~', '^', ':', '?', '*', '[', '\\'];

/// Derive a git branch name from a ticket reference.
///
/// Lowercases, turns whitespace into hyphens, drops characters git rejects,
/// collapses repeated separators, trims `.`/`-`/`/` from both ends and a
/// trailing `.lock`. An empty or `@`-only result becomes `"task"`.
///
/// ```
/// use tp_workspace::sanitize_branch_name;
/// assert_eq!(sanitize_branch_name("TASK-123: Fix bug"), "task-123-fix-bug");
/// assert_eq!(sanitize_branch_name("@"), "task");
/// ```
pub fn sanitize_branch_name(input: &str) -> String {
    let mut current = input.to_string();
    loop {
        let next = clean_once(&current);
        if next == current {
            break;
        }
        current = next;
    }

    if current.is_empty() || current.chars().all(|c| c == '@') {
        return DEFAULT_BRANCH_TOKEN.to_string();
    }
    current
}

fn clean_once(input: &str) -> String {
    let mapped: String = input
        .to_lowercase()
        .chars()
        .filter_map(|c| {
            if c.is_whitespace() {
                Some('-')
            } else if c.is_control() || ILLEGAL_CHARS.contains(&c) {
                None
            } else {
                Some(c)
            }
        })
        .collect();

    let mut name = mapped.replace("@{", "-");
    for (repeated, single) in [("--", "-"), ("//", "/"), ("..", ".")] {
        while name.contains(repeated) {
            name = name.replace(repeated, single);
        }
    }

    // No component may start with '.' or end with ".lock".
    let components: Vec<&str> = name
        .split('/')
        .map(|part| part.trim_start_matches('.'))
        .map(|part| part.strip_suffix(".lock").unwrap_or(part))
        .filter(|part| !part.is_empty())
        .collect();
    let name = components.join("/");

    let name = name.trim_matches(|c| c == '.' || c == '-' || c == '/');
    name.strip_suffix(".lock").unwrap_or(name).to_string()
}
