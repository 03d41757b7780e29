//! Branch-name and worktree commands — `conveyor branch-name`,
//! `conveyor worktree`.

use anyhow::Result;
use console::style;

use conveyor::ui::DONE;

use super::{Env, loaded_runner};

pub async fn cmd_branch_name(
    env: &Env,
    ticket: Option<String>,
    project: Option<String>,
) -> Result<()> {
    let ticket = env.ticket(ticket)?;
    let project = env.project(project)?;
    let mut runner = loaded_runner(env, &ticket).await?;
    let record = runner.generate_branch_name(&project, None).await?;

    match record.branch_name.as_deref() {
        Some(branch) => println!("{}{}", DONE, style(branch).bold()),
        None => println!("Backend accepted the request but returned no branch name"),
    }
    if let Some(meta) = &record.branch_name_meta {
        println!("  confidence: {:.0}%", meta.confidence * 100.0);
        if let Some(reasoning) = &meta.reasoning {
            println!("  reasoning:  {}", reasoning);
        }
        for alternative in &meta.alternatives {
            println!("  alternative: {}", alternative);
        }
    }
    Ok(())
}

pub async fn cmd_worktree_create(
    env: &Env,
    ticket: Option<String>,
    subfolder: &str,
    base_branch: Option<String>,
    env_handling: Option<String>,
    share_node_modules: bool,
) -> Result<()> {
    let ticket = env.ticket(ticket)?;
    let mut runner = loaded_runner(env, &ticket).await?;
    let record = runner
        .create_worktree(subfolder, base_branch, env_handling, share_node_modules)
        .await?;
    match &record.worktree {
        Some(worktree) => println!("{}worktree created at {}", DONE, worktree.path),
        None => println!("Backend accepted the request but returned no worktree"),
    }
    Ok(())
}

pub async fn cmd_worktree_delete(
    env: &Env,
    ticket: Option<String>,
    delete_branch: bool,
    force: bool,
) -> Result<()> {
    let ticket = env.ticket(ticket)?;
    let mut runner = loaded_runner(env, &ticket).await?;
    runner
        .delete_worktree(Some(delete_branch), Some(force))
        .await?;
    println!("{}worktree deleted", DONE);
    Ok(())
}
