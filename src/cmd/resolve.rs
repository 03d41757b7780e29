//! Verification-resolution commands — `conveyor resolve`.

use anyhow::Result;

use conveyor::ui::{self, DONE};

use super::{Env, loaded_runner};

pub async fn cmd_resolve_start(
    env: &Env,
    ticket: Option<String>,
    mode: &str,
    instructions: Option<String>,
) -> Result<()> {
    let ticket = env.ticket(ticket)?;
    let mut runner = loaded_runner(env, &ticket).await?;
    let response = runner.start_resolution(mode, instructions).await?;
    println!("{}resolution session {} started", DONE, response.session_id);
    if let Some(resume) = &response.resume_commands {
        println!("Resume locally with:");
        println!("  {}", resume.cd);
        println!("  {}", resume.session);
    }
    Ok(())
}

pub async fn cmd_resolve_watch(env: &Env, ticket: Option<String>) -> Result<()> {
    let ticket = env.ticket(ticket)?;
    let mut runner = loaded_runner(env, &ticket).await?;
    println!("Waiting for resolution to complete (ctrl-c to stop watching)...");
    let status = runner.await_resolution().await?;
    println!("{}", ui::resolution_line(status.status));
    Ok(())
}

pub async fn cmd_resolve_stop(env: &Env, ticket: Option<String>) -> Result<()> {
    let ticket = env.ticket(ticket)?;
    let mut runner = loaded_runner(env, &ticket).await?;
    runner.stop_resolution().await?;
    println!("{}resolution session stopped", DONE);
    Ok(())
}

pub async fn cmd_resolve_complete(env: &Env, ticket: Option<String>) -> Result<()> {
    let ticket = env.ticket(ticket)?;
    let mut runner = loaded_runner(env, &ticket).await?;
    runner.complete_resolution().await?;
    println!("{}resolution marked complete", DONE);
    Ok(())
}

pub async fn cmd_reverify(env: &Env, ticket: Option<String>) -> Result<()> {
    let ticket = env.ticket(ticket)?;
    let mut runner = loaded_runner(env, &ticket).await?;
    println!("Re-running verification...");
    let result = runner.reverify().await?;
    println!("{}verification {} complete", DONE, result.id);
    println!();
    println!("{}", result.report);
    Ok(())
}
