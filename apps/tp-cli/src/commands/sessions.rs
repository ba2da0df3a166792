// sessions.rs — `tp sessions`: agent sessions recorded by earlier runs.
//
// A record links a ticket to the agent session that worked on it, so the
// conversation can be resumed by hand (e.g., `claude --resume <id>`).

use tp_agent::{SessionRecord, SessionStore};

use crate::config::ProjectLayout;

pub fn execute(layout: &ProjectLayout, ticket: Option<&str>) -> anyhow::Result<()> {
    let store = SessionStore::new(&layout.sessions_dir)?;
    match ticket {
        Some(ticket) => show_session(&store, ticket),
        None => list_sessions(&store),
    }
}

fn list_sessions(store: &SessionStore) -> anyhow::Result<()> {
    let mut records = store.list()?;
    if records.is_empty() {
        println!("No recorded sessions.");
        return Ok(());
    }
    records.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));

    println!(
        "{:<14} {:<12} {:<38} {:<17} {}",
        "TICKET", "AGENT", "SESSION", "RECORDED", "PR"
    );
    println!("{}", "-".repeat(110));
    for r in &records {
        println!(
            "{:<14} {:<12} {:<38} {:<17} {}",
            truncate(&r.ticket, 14),
            truncate(&r.agent, 12),
            truncate(&r.session_id, 38),
            r.recorded_at.format("%Y-%m-%d %H:%M"),
            r.pr_url.as_deref().unwrap_or("-"),
        );
    }
    println!("\n{} session(s).", records.len());
    Ok(())
}

fn show_session(store: &SessionStore, ticket: &str) -> anyhow::Result<()> {
    let Some(record) = store.get(ticket)? else {
        anyhow::bail!("No session recorded for '{}'", ticket);
    };
    print!("{}", describe(&record));
    Ok(())
}

fn describe(record: &SessionRecord) -> String {
    let mut out = String::new();
    out.push_str(&format!("Ticket:    {}\n", record.ticket));
    out.push_str(&format!("Agent:     {}\n", record.agent));
    out.push_str(&format!("Session:   {}\n", record.session_id));
    if let Some(branch) = &record.branch {
        out.push_str(&format!("Branch:    {}\n", branch));
    }
    if let Some(url) = &record.pr_url {
        out.push_str(&format!("PR:        {}\n", url));
    }
    out.push_str(&format!("Recorded:  {}\n", record.recorded_at.to_rfc3339()));
    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        s.to_string()
    }
}
