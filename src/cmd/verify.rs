//! Verification commands — `conveyor verify`, `conveyor review`,
//! `conveyor approve`.

use anyhow::Result;
use console::style;

use conveyor::ui::DONE;

use super::{Env, loaded_runner};

pub async fn cmd_verify(
    env: &Env,
    ticket: Option<String>,
    instructions: Option<String>,
) -> Result<()> {
    let ticket = env.ticket(ticket)?;
    let mut runner = loaded_runner(env, &ticket).await?;
    println!("Verifying {}...", style(&ticket).bold());
    let result = runner.run_verification(instructions).await?;
    println!("{}verification {} complete", DONE, result.id);
    println!();
    println!("{}", result.report);
    Ok(())
}

pub async fn cmd_review(
    env: &Env,
    ticket: Option<String>,
    notes: &str,
    reviewed_by: &str,
) -> Result<()> {
    let ticket = env.ticket(ticket)?;
    let mut runner = loaded_runner(env, &ticket).await?;
    let result = runner.submit_review_notes(notes, reviewed_by).await?;
    println!("{}notes recorded on verification {}", DONE, result.id);
    Ok(())
}

pub async fn cmd_approve(env: &Env, ticket: Option<String>) -> Result<()> {
    let ticket = env.ticket(ticket)?;
    let mut runner = loaded_runner(env, &ticket).await?;
    runner.approve_for_pr().await?;
    println!("{}{} approved for pull request", DONE, ticket);
    Ok(())
}
