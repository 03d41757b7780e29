//! Project selection — `conveyor use`.

use anyhow::Result;

use super::Env;

pub fn cmd_use(env: &Env, project_id: &str, ticket: Option<String>) -> Result<()> {
    let mut context = env.context.clone();
    context.project_id = Some(project_id.to_string());
    if ticket.is_some() {
        context.ticket_key = ticket;
    }
    // Remember an explicit --base-url so later invocations can omit it.
    if env.config.base_url.is_some() {
        context.base_url = env.config.base_url.clone();
    }
    context.save(&env.context_path)?;
    println!("Selected project {}", project_id);
    if let Some(key) = &context.ticket_key {
        println!("Active ticket: {}", key);
    }
    Ok(())
}
