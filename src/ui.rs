//! Terminal rendering of the pipeline.
//!
//! Pure string builders so the layout is testable; `cmd` prints the result.

use console::{Emoji, style};

use crate::models::{ResolutionState, SessionStatus};
use crate::pipeline::{PipelineState, Stage};
use crate::staleness::AnalysisFreshness;
use crate::stages;

// Stage markers
pub static DONE: Emoji<'_, '_> = Emoji("✅ ", "[done] ");
pub static READY: Emoji<'_, '_> = Emoji("▶️  ", "[ready] ");
pub static LOCKED: Emoji<'_, '_> = Emoji("🔒 ", "[locked] ");

fn freshness_line(freshness: &AnalysisFreshness) -> String {
    match freshness {
        AnalysisFreshness::None => "no analysis yet".to_string(),
        AnalysisFreshness::Pending { latest } => format!(
            "analysis from {} outdated by newer ticket activity",
            latest.created_at.format("%Y-%m-%d %H:%M")
        ),
        AnalysisFreshness::Complete { latest } => format!(
            "analysis from {} is current",
            latest.created_at.format("%Y-%m-%d %H:%M")
        ),
    }
}

fn stage_detail(stage: Stage, state: &PipelineState) -> String {
    let workflow = state.workflow.as_ref();
    match stage {
        Stage::Analysis => freshness_line(&state.freshness),
        Stage::BranchName => workflow
            .and_then(|w| w.branch_name.clone())
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| "-".to_string()),
        Stage::Worktree => workflow
            .and_then(|w| w.worktree.as_ref())
            .map(|wt| wt.path.clone())
            .unwrap_or_else(|| "-".to_string()),
        Stage::Session => {
            let status = stages::resolve_session(workflow);
            match workflow.and_then(|w| w.session.as_ref()) {
                Some(session) => format!("{} ({})", status.as_str(), session.session_id),
                None => SessionStatus::NotStarted.as_str().to_string(),
            }
        }
        Stage::Verification => match &state.verification {
            Some(v) => match &v.reviewed_by {
                Some(reviewer) => format!("{} (reviewed by {})", v.id, reviewer),
                None => v.id.clone(),
            },
            None => "-".to_string(),
        },
        Stage::Resolution => stages::resolve_resolution(state.resolution.as_ref())
            .as_str()
            .to_string(),
        Stage::IntegrationTest => match &state.integration_test {
            Some(r) => format!(
                "{}/{} endpoints passed, {} failed",
                r.endpoints_passed, r.endpoints_tested, r.endpoints_failed
            ),
            None => "-".to_string(),
        },
    }
}

/// Render the full stage table for a loaded ticket.
pub fn render_pipeline(state: &PipelineState) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{} — {} [{}]\n\n",
        style(&state.ticket.key).bold(),
        state.ticket.summary,
        state.ticket.status
    ));

    for stage in Stage::ALL {
        let marker = if stage.is_complete(state) {
            DONE
        } else if stage.is_enabled(state) {
            READY
        } else {
            LOCKED
        };
        out.push_str(&format!(
            "{}{:<18} {}\n",
            marker,
            stage.as_str(),
            stage_detail(stage, state)
        ));
        if !stage.is_enabled(state) {
            if let Some(reason) = stage.lock_reason(state) {
                out.push_str(&format!("   {}\n", style(reason).dim()));
            }
        }
    }

    if let Some(pr) = state
        .workflow
        .as_ref()
        .and_then(|w| w.pull_request_url.as_ref())
    {
        out.push_str(&format!("\nPull request: {}\n", pr));
    }
    out
}

/// One-line summary of a resolution state, for the resolve commands.
pub fn resolution_line(status: ResolutionState) -> String {
    match status {
        ResolutionState::Completed => format!("{}resolution {}", DONE, status.as_str()),
        _ => format!("{}resolution {}", READY, status.as_str()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Annotation, AnnotationAuthor, Ticket};
    use chrono::{TimeZone, Utc};

    fn state() -> PipelineState {
        PipelineState {
            ticket: Ticket {
                key: "PROJ-9".to_string(),
                summary: "Fix the thing".to_string(),
                status: "To Do".to_string(),
                priority: None,
                assignee: None,
                reporter: None,
                labels: vec![],
                pull_requests: vec![],
                comments: vec![],
            },
            workflow: None,
            annotations: vec![],
            freshness: AnalysisFreshness::None,
            verification: None,
            resolution: None,
            integration_test: None,
        }
    }

    #[test]
    fn render_lists_every_stage() {
        let rendered = render_pipeline(&state());
        for stage in Stage::ALL {
            assert!(rendered.contains(stage.as_str()), "missing {}", stage);
        }
        assert!(rendered.contains("PROJ-9"));
        assert!(rendered.contains("no analysis yet"));
    }

    #[test]
    fn locked_stages_show_their_reason() {
        let rendered = render_pipeline(&state());
        assert!(rendered.contains("no branch name generated yet"));
    }

    #[test]
    fn complete_analysis_renders_as_current() {
        let mut state = state();
        state.freshness = AnalysisFreshness::Complete {
            latest: Annotation {
                id: "an-1".to_string(),
                ticket_key: "PROJ-9".to_string(),
                content: String::new(),
                author_kind: AnnotationAuthor::Automated,
                created_at: Utc.timestamp_millis_opt(0).unwrap(),
                updated_at: None,
            },
        };
        assert!(render_pipeline(&state).contains("is current"));
    }
}
