//! Pull request body rendering

use std::path::Path;

use crate::host::Result;

/// Longest agent summary carried into a PR body.
const MAX_AGENT_OUTPUT_CHARS: usize = 4000;

/// Values available to the PR body.
#[derive(Debug, Clone, Default)]
pub struct PrBodyContext {
    pub ticket_id: String,
    pub title: String,
    pub description: Option<String>,
    /// Human link to the ticket in the tracker.
    pub link: String,
    /// What the agent reported when it finished.
    pub agent_output: String,
    /// One-line test status, e.g. "Passed after 1 fix attempt".
    pub tests: String,
}

impl PrBodyContext {
    /// Render from a template file if it exists, else the default layout.
    pub fn render(&self, template: Option<&Path>) -> Result<String> {
        if let Some(template_path) = template {
            if template_path.exists() {
                let template = std::fs::read_to_string(template_path)?;
                return Ok(self.substitute_template(&template));
            }
            tracing::warn!(
                "PR template {} not found, using default body",
                template_path.display()
            );
        }
        Ok(self.default_body())
    }

    fn default_body(&self) -> String {
        let description = self
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(|d| format!("\n\n{}", d))
            .unwrap_or_default();

        format!(
            "## Ticket\n\n[{}]({}) {}{}\n\n## Agent Summary\n\n{}\n\n## Tests\n\n{}\n\n---\n\nOpened by ticket-pilot",
            self.ticket_id,
            self.link,
            self.title,
            description,
            self.agent_summary(),
            self.tests,
        )
    }

    /// Substitute template variables.
    ///
    /// Available variables:
    ///   {ticket}        — ticket identifier
    ///   {title}         — ticket title
    ///   {description}   — ticket description (or empty)
    ///   {link}          — tracker link to the ticket
    ///   {agent_output}  — agent summary, truncated
    ///   {tests}         — test status line
    ///
    /// One pass over the template: substituted text is never rescanned, and
    /// unknown `{names}` are left as written.
    fn substitute_template(&self, template: &str) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let value = after
                .find('}')
                .and_then(|close| self.placeholder(&after[..close]).map(|v| (close, v)));
            match value {
                Some((close, value)) => {
                    out.push_str(&value);
                    rest = &after[close + 1..];
                }
                None => {
                    out.push('{');
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        out
    }

    fn placeholder(&self, name: &str) -> Option<String> {
        match name {
            "ticket" => Some(self.ticket_id.clone()),
            "title" => Some(self.title.clone()),
            "description" => Some(self.description.clone().unwrap_or_default()),
            "link" => Some(self.link.clone()),
            "agent_output" => Some(self.agent_summary()),
            "tests" => Some(self.tests.clone()),
            _ => None,
        }
    }

    fn agent_summary(&self) -> String {
        let trimmed = self.agent_output.trim();
        if trimmed.is_empty() {
            return "_No summary reported._".to_string();
        }
        if trimmed.chars().count() <= MAX_AGENT_OUTPUT_CHARS {
            return trimmed.to_string();
        }
        let head: String = trimmed.chars().take(MAX_AGENT_OUTPUT_CHARS).collect();
        format!("{}\n\n_(truncated)_", head)
    }
}
