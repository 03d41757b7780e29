//! Integration-test command — `conveyor integration-test`.

use anyhow::Result;
use console::style;

use conveyor::ui::DONE;

use super::{Env, loaded_runner};

pub async fn cmd_integration_test(
    env: &Env,
    ticket: Option<String>,
    instructions: Option<String>,
) -> Result<()> {
    let ticket = env.ticket(ticket)?;
    let mut runner = loaded_runner(env, &ticket).await?;
    println!("Running integration tests for {}...", style(&ticket).bold());
    let result = runner.run_integration_test(instructions).await?;
    println!(
        "{}{}/{} endpoints passed, {} failed",
        DONE, result.endpoints_passed, result.endpoints_tested, result.endpoints_failed
    );
    if let Some(avg) = result.avg_response_time_ms {
        println!("  avg response time: {:.0} ms", avg);
    }
    if !result.cleanup_issues.is_empty() {
        println!("  cleanup issues:");
        for issue in &result.cleanup_issues {
            println!("    - {}", issue);
        }
    }
    println!();
    println!("{}", result.report);
    Ok(())
}
