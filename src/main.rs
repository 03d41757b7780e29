use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cmd;

#[derive(Parser)]
#[command(name = "conveyor")]
#[command(version, about = "Ticket pipeline driver")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Backend base URL. Overrides conveyor.toml and CONVEYOR_BASE_URL.
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Directory holding conveyor.toml. Defaults to the current directory.
    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the pipeline stage table for a ticket
    Status {
        ticket: Option<String>,
    },
    /// Run the automated analysis and wait for its annotation
    Analyze {
        ticket: Option<String>,
    },
    /// Generate a branch name from the latest analysis
    BranchName {
        ticket: Option<String>,
        /// Project to generate against (defaults to the selected project)
        #[arg(long)]
        project: Option<String>,
    },
    /// Create or delete the ticket's worktree
    Worktree {
        #[command(subcommand)]
        command: WorktreeCommands,
    },
    /// Start or stop the AI coding session
    Session {
        #[command(subcommand)]
        command: SessionCommands,
    },
    /// Run verification and wait for the result
    Verify {
        ticket: Option<String>,
        #[arg(long)]
        instructions: Option<String>,
    },
    /// Attach human review notes to the latest verification result
    Review {
        ticket: Option<String>,
        #[arg(long)]
        notes: String,
        #[arg(long)]
        reviewed_by: String,
    },
    /// Drive the verification-resolution session
    Resolve {
        #[command(subcommand)]
        command: ResolveCommands,
    },
    /// Run the integration test suite and wait for the result
    IntegrationTest {
        ticket: Option<String>,
        #[arg(long)]
        instructions: Option<String>,
    },
    /// Approve the ticket for pull-request creation
    Approve {
        ticket: Option<String>,
    },
    /// Manage internal annotations (hidden comments) on a ticket
    Annotate {
        #[command(subcommand)]
        command: AnnotateCommands,
    },
    /// Select the active project, persisted across invocations
    Use {
        project_id: String,
        #[arg(long)]
        ticket: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum WorktreeCommands {
    Create {
        ticket: Option<String>,
        #[arg(long)]
        subfolder: String,
        #[arg(long)]
        base_branch: Option<String>,
        #[arg(long)]
        env_handling: Option<String>,
        #[arg(long)]
        share_node_modules: bool,
    },
    Delete {
        ticket: Option<String>,
        #[arg(long)]
        delete_branch: bool,
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
pub enum SessionCommands {
    Start {
        ticket: Option<String>,
        #[arg(long, default_value = "implementation")]
        mode: String,
        #[arg(long)]
        instructions: Option<String>,
    },
    Stop {
        ticket: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ResolveCommands {
    /// Start a resolution session against the latest verification result
    Start {
        ticket: Option<String>,
        #[arg(long, default_value = "interactive")]
        mode: String,
        #[arg(long)]
        instructions: Option<String>,
    },
    /// Wait for the resolution session to report completed
    Watch {
        ticket: Option<String>,
    },
    Stop {
        ticket: Option<String>,
    },
    Complete {
        ticket: Option<String>,
    },
    /// Re-run verification from the resolution stage
    Reverify {
        ticket: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum AnnotateCommands {
    Add {
        ticket: Option<String>,
        content: String,
    },
    Edit {
        ticket: Option<String>,
        id: String,
        content: String,
    },
    Rm {
        ticket: Option<String>,
        id: String,
    },
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;
    let default = if verbose { "conveyor=debug" } else { "conveyor=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let env = cmd::Env::prepare(cli.base_url.clone(), cli.project_dir.clone())?;

    match cli.command {
        Commands::Status { ticket } => cmd::cmd_status(&env, ticket).await,
        Commands::Analyze { ticket } => cmd::cmd_analyze(&env, ticket).await,
        Commands::BranchName { ticket, project } => {
            cmd::cmd_branch_name(&env, ticket, project).await
        }
        Commands::Worktree { command } => match command {
            WorktreeCommands::Create {
                ticket,
                subfolder,
                base_branch,
                env_handling,
                share_node_modules,
            } => {
                cmd::cmd_worktree_create(
                    &env,
                    ticket,
                    &subfolder,
                    base_branch,
                    env_handling,
                    share_node_modules,
                )
                .await
            }
            WorktreeCommands::Delete {
                ticket,
                delete_branch,
                force,
            } => cmd::cmd_worktree_delete(&env, ticket, delete_branch, force).await,
        },
        Commands::Session { command } => match command {
            SessionCommands::Start {
                ticket,
                mode,
                instructions,
            } => cmd::cmd_session_start(&env, ticket, &mode, instructions).await,
            SessionCommands::Stop { ticket } => cmd::cmd_session_stop(&env, ticket).await,
        },
        Commands::Verify {
            ticket,
            instructions,
        } => cmd::cmd_verify(&env, ticket, instructions).await,
        Commands::Review {
            ticket,
            notes,
            reviewed_by,
        } => cmd::cmd_review(&env, ticket, &notes, &reviewed_by).await,
        Commands::Resolve { command } => match command {
            ResolveCommands::Start {
                ticket,
                mode,
                instructions,
            } => cmd::cmd_resolve_start(&env, ticket, &mode, instructions).await,
            ResolveCommands::Watch { ticket } => cmd::cmd_resolve_watch(&env, ticket).await,
            ResolveCommands::Stop { ticket } => cmd::cmd_resolve_stop(&env, ticket).await,
            ResolveCommands::Complete { ticket } => cmd::cmd_resolve_complete(&env, ticket).await,
            ResolveCommands::Reverify { ticket } => cmd::cmd_reverify(&env, ticket).await,
        },
        Commands::IntegrationTest {
            ticket,
            instructions,
        } => cmd::cmd_integration_test(&env, ticket, instructions).await,
        Commands::Approve { ticket } => cmd::cmd_approve(&env, ticket).await,
        Commands::Annotate { command } => match command {
            AnnotateCommands::Add { ticket, content } => {
                cmd::cmd_annotate_add(&env, ticket, &content).await
            }
            AnnotateCommands::Edit {
                ticket,
                id,
                content,
            } => cmd::cmd_annotate_edit(&env, ticket, &id, &content).await,
            AnnotateCommands::Rm { ticket, id } => cmd::cmd_annotate_rm(&env, ticket, &id).await,
        },
        Commands::Use { project_id, ticket } => cmd::cmd_use(&env, &project_id, ticket),
    }
}
