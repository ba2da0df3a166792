// prompt.rs — Prompts sent to the agent.

use tp_tracker::TaskIssue;

/// Failure output beyond this many characters is cut from the front;
/// the tail of a test log carries the summary and the first errors.
const MAX_FAILURE_CHARS: usize = 12_000;

/// Prompt for the first agent invocation on a ticket.
pub fn implementation_prompt(issue: &TaskIssue, link: &str) -> String {
    let mut prompt = format!(
        "You are working on ticket {id}: {title}\n\
         Ticket link: {link}\n\n",
        id = issue.id,
        title = issue.title,
        link = link,
    );

    match issue.description_text() {
        Some(description) => {
            prompt.push_str("## Description\n\n");
            prompt.push_str(description.trim());
            prompt.push_str("\n\n");
        }
        None => prompt.push_str("The ticket has no description; work from the title.\n\n"),
    }

    prompt.push_str(
        "## Instructions\n\n\
         - Implement the ticket in this repository's working directory.\n\
         - Follow the existing code style and add or update tests.\n\
         - Do not commit, push, or open a pull request; that happens after you finish.\n\
         - When done, reply with a short summary of what you changed.\n",
    );
    prompt
}

/// Prompt asking the agent to fix failing tests in the same conversation.
pub fn fix_prompt(issue: &TaskIssue, failure_output: &str, attempt: u32, max_attempts: u32) -> String {
    format!(
        "The tests for ticket {id} are failing (fix attempt {n} of {max}).\n\n\
         ## Test output\n\n```\n{output}\n```\n\n\
         Fix the code so the tests pass. Do not delete or skip failing tests \
         unless they are wrong for the change you made. Reply with a short \
         summary of the fix.\n",
        id = issue.id,
        n = attempt + 1,
        max = max_attempts,
        output = tail(failure_output.trim_end(), MAX_FAILURE_CHARS),
    )
}

/// Last `max` characters of `text`, marking the cut.
fn tail(text: &str, max: usize) -> String {
    let count = text.chars().count();
    if count <= max {
        return text.to_string();
    }
    let kept: String = text.chars().skip(count - max).collect();
    format!("... ({} earlier characters omitted)\n{}", count - max, kept)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn implementation_prompt_carries_issue() {
        let issue = TaskIssue::new("IOS-1", "Add login").with_description("Use OAuth.");
        let prompt = implementation_prompt(&issue, "https://tracker/IOS-1");
        assert!(prompt.contains("IOS-1: Add login"));
        assert!(prompt.contains("https://tracker/IOS-1"));
        assert!(prompt.contains("Use OAuth."));
    }

    #[test]
    fn missing_description_is_called_out() {
        let issue = TaskIssue::new("IOS-2", "Fix crash");
        let prompt = implementation_prompt(&issue, "x");
        assert!(prompt.contains("no description"));
    }

    #[test]
    fn fix_prompt_embeds_failure_and_attempt() {
        let issue = TaskIssue::new("IOS-1", "Add login");
        let prompt = fix_prompt(&issue, "assertion failed: 1 == 2", 1, 3);
        assert!(prompt.contains("fix attempt 2 of 3"));
        assert!(prompt.contains("assertion failed: 1 == 2"));
    }

    #[test]
    fn long_failure_output_keeps_the_tail() {
        let long = format!("{}END", "x".repeat(MAX_FAILURE_CHARS + 10));
        let kept = tail(&long, MAX_FAILURE_CHARS);
        assert!(kept.starts_with("... (13 earlier characters omitted)"));
        assert!(kept.ends_with("END"));
    }
}
