//! AI coding session commands — `conveyor session start|stop`.

use anyhow::Result;

use conveyor::ui::DONE;

use super::{Env, loaded_runner};

pub async fn cmd_session_start(
    env: &Env,
    ticket: Option<String>,
    mode: &str,
    instructions: Option<String>,
) -> Result<()> {
    let ticket = env.ticket(ticket)?;
    let mut runner = loaded_runner(env, &ticket).await?;
    let response = runner.start_session(mode, instructions).await?;
    println!("{}session {} started", DONE, response.session_id);
    if let Some(resume) = &response.resume_commands {
        println!("Resume locally with:");
        println!("  {}", resume.cd);
        println!("  {}", resume.session);
    }
    Ok(())
}

pub async fn cmd_session_stop(env: &Env, ticket: Option<String>) -> Result<()> {
    let ticket = env.ticket(ticket)?;
    let mut runner = loaded_runner(env, &ticket).await?;
    runner.stop_session().await?;
    println!("{}session stopped", DONE);
    Ok(())
}
