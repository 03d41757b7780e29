//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module        | Commands handled                          |
//! |---------------|-------------------------------------------|
//! | `status`      | `Status`                                  |
//! | `analysis`    | `Analyze`, `Annotate`                     |
//! | `workflow`    | `BranchName`, `Worktree`                  |
//! | `session`     | `Session`                                 |
//! | `verify`      | `Verify`, `Review`, `Approve`             |
//! | `resolve`     | `Resolve`                                 |
//! | `integration` | `IntegrationTest`                         |
//! | `project`     | `Use`                                     |

use std::path::PathBuf;

use anyhow::{Context, Result};

use conveyor::client::ApiClient;
use conveyor::config::Config;
use conveyor::context::ProjectContext;
use conveyor::pipeline::PipelineRunner;

pub mod analysis;
pub mod integration;
pub mod project;
pub mod resolve;
pub mod session;
pub mod status;
pub mod verify;
pub mod workflow;

pub use analysis::{cmd_analyze, cmd_annotate_add, cmd_annotate_edit, cmd_annotate_rm};
pub use integration::cmd_integration_test;
pub use project::cmd_use;
pub use resolve::{
    cmd_resolve_complete, cmd_resolve_start, cmd_resolve_stop, cmd_resolve_watch, cmd_reverify,
};
pub use session::{cmd_session_start, cmd_session_stop};
pub use status::cmd_status;
pub use verify::{cmd_approve, cmd_review, cmd_verify};
pub use workflow::{cmd_branch_name, cmd_worktree_create, cmd_worktree_delete};

/// Resolved invocation environment: merged config plus the persisted
/// project context.
pub struct Env {
    pub config: Config,
    pub context: ProjectContext,
    pub context_path: PathBuf,
}

impl Env {
    pub fn prepare(cli_base_url: Option<String>, project_dir: Option<PathBuf>) -> Result<Self> {
        let project_dir = match project_dir {
            Some(dir) => dir,
            None => std::env::current_dir().context("Could not determine current directory")?,
        };
        let mut config = Config::resolve(&project_dir, cli_base_url)?;
        let context_path = ProjectContext::default_path()?;
        let context = ProjectContext::load(&context_path)?;
        // The persisted context is the weakest base-url layer.
        if config.base_url.is_none() {
            config.base_url = context.base_url.clone();
        }
        Ok(Self {
            config,
            context,
            context_path,
        })
    }

    /// Resolve the ticket key: explicit argument, else the selected one.
    pub fn ticket(&self, explicit: Option<String>) -> Result<String> {
        explicit
            .or_else(|| self.context.ticket_key.clone())
            .context("No ticket given. Pass a ticket key or select one with `conveyor use`")
    }

    /// Resolve the project id: explicit argument, else the selected one.
    pub fn project(&self, explicit: Option<String>) -> Result<String> {
        explicit
            .or_else(|| self.context.project_id.clone())
            .context("No project selected. Pass --project or run `conveyor use <project-id>`")
    }
}

/// Build a runner and load the ticket's pipeline state.
pub(crate) async fn loaded_runner(env: &Env, ticket: &str) -> Result<PipelineRunner> {
    let base_url = env.config.require_base_url()?;
    let client = ApiClient::new(base_url)?;
    let mut runner = PipelineRunner::new(
        client,
        env.config.poll_config(),
        env.config.staleness_tolerance(),
    );
    runner.load(ticket).await?;
    Ok(runner)
}
