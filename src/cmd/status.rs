//! Pipeline overview — `conveyor status`.

use anyhow::{Context, Result};

use conveyor::ui;

use super::{Env, loaded_runner};

pub async fn cmd_status(env: &Env, ticket: Option<String>) -> Result<()> {
    let ticket = env.ticket(ticket)?;
    let runner = loaded_runner(env, &ticket).await?;
    let state = runner.state().context("pipeline state missing after load")?;
    print!("{}", ui::render_pipeline(state));
    Ok(())
}
