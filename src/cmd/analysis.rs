//! Analysis and annotation commands — `conveyor analyze`, `conveyor annotate`.

use anyhow::Result;
use console::style;

use conveyor::ui::DONE;

use super::{Env, loaded_runner};

pub async fn cmd_analyze(env: &Env, ticket: Option<String>) -> Result<()> {
    let ticket = env.ticket(ticket)?;
    let mut runner = loaded_runner(env, &ticket).await?;
    println!("Analyzing {}...", style(&ticket).bold());
    let annotation = runner.run_analysis().await?;
    println!(
        "{}analysis complete ({}, {})",
        DONE,
        annotation.id,
        annotation.created_at.format("%Y-%m-%d %H:%M:%S")
    );
    Ok(())
}

pub async fn cmd_annotate_add(env: &Env, ticket: Option<String>, content: &str) -> Result<()> {
    let ticket = env.ticket(ticket)?;
    let mut runner = loaded_runner(env, &ticket).await?;
    let annotation = runner.add_annotation(content).await?;
    println!("Added annotation {}", annotation.id);
    Ok(())
}

pub async fn cmd_annotate_edit(
    env: &Env,
    ticket: Option<String>,
    id: &str,
    content: &str,
) -> Result<()> {
    let ticket = env.ticket(ticket)?;
    let mut runner = loaded_runner(env, &ticket).await?;
    let annotation = runner.edit_annotation(id, content).await?;
    println!("Updated annotation {}", annotation.id);
    Ok(())
}

pub async fn cmd_annotate_rm(env: &Env, ticket: Option<String>, id: &str) -> Result<()> {
    let ticket = env.ticket(ticket)?;
    let mut runner = loaded_runner(env, &ticket).await?;
    runner.remove_annotation(id).await?;
    println!("Removed annotation {}", id);
    Ok(())
}
