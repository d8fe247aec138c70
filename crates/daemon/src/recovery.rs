// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Startup reconciliation: a supervisor slot never survives a daemon
//! restart, so any task left `running` in storage from a prior process is
//! unconditionally terminal. Run once, before accepting new work.

use crate::retry::RetryPolicy;
use ctlplane_core::{Clock, Context, CoreResult, FailureReason, SessionStatus, TaskStatus};
use ctlplane_storage::{Engine, Paging, ProjectRepo, RepoBundle, SessionRepo, TaskRepo, WorkspaceRepo};
use tracing::{info, warn};

/// Scans every non-terminal task, fails it with [`FailureReason::HostRestarted`],
/// and settles the owning session and workspace counters in the same
/// transaction. Paginates so a restart with a large backlog doesn't load
/// it all at once.
pub async fn recover<C: Clock + 'static>(storage: &Engine<C>, now_ms: u64) -> CoreResult<usize> {
    let mut recovered = 0usize;
    let mut paging = Paging::first_page();

    loop {
        let page = storage.repos().tasks().list(&Context::background(), paging).await?;
        if page.is_empty() {
            break;
        }

        let running: Vec<_> = page.iter().filter(|t| t.status == TaskStatus::Running).collect();
        if !running.is_empty() {
            info!(count = running.len(), "recovering running tasks orphaned by restart");
        }

        for task in running {
            let task_id = task.id;
            let session_id = task.session_id;
            warn!(%task_id, %session_id, "marking task failed: host restarted while running");

            RetryPolicy::retry_forever()
                .run(|| async {
                    storage
                        .run_in_tx(|repos| async move {
                            let task = repos.tasks().fail(&Context::background(), task_id, FailureReason::HostRestarted, None, now_ms).await?;
                            let session = repos.sessions().get_by_id(&Context::background(), session_id).await?;
                            if session.status == SessionStatus::Active {
                                repos.sessions().go_idle(&Context::background(), session_id, now_ms).await?;
                            }
                            let workspace_id = {
                                let project = repos.projects().get_by_id(&Context::background(), session.project_id).await?;
                                project.workspace_id
                            };
                            repos.workspaces().decrement_active_tasks(&Context::background(), workspace_id, now_ms).await?;
                            Ok(task)
                        })
                        .await
                })
                .await?;

            recovered += 1;
        }

        if page.len() < paging.limit as usize {
            break;
        }
        paging = Paging::new(paging.offset + paging.limit, paging.limit);
    }

    if recovered > 0 {
        info!(recovered, "startup recovery complete");
    }
    Ok(recovered)
}

#[cfg(test)]
#[path = "recovery_tests.rs"]
mod tests;
