//! # Label selector construction
//!
//! Builds the server-side label selector `ListSessions` sends to the
//! cluster (spec.md §4.4 "ListSessions"). Deliberately narrower than the
//! full `Filter`: team-ids-list and tag filters have no clean selector
//! expression and are applied in memory instead.

use crate::constants::{LABEL_SCOPE, LABEL_TEAM_ID_HASH, LABEL_USER_ID};
use crate::naming::{hash_for_label, sanitize_label};
use crate::session::{Filter, Scope};

const TEAM_ID_HASH_LABEL_LEN: usize = 63;

/// Build the server-side label selector for `filter`.
///
/// Deliberately omits `scope=user` even when `filter.scope` is
/// `Some(Scope::User)`: objects created before the scope label existed
/// default to user-scope and must still be found. `scope=team` is included
/// because team-scoped objects have always carried the label. Do not "fix"
/// this by adding `scope=user` unconditionally.
#[must_use]
pub fn build_selector(filter: &Filter) -> String {
    let mut clauses = Vec::new();

    if let Some(user_id) = &filter.user_id {
        clauses.push(format!("{LABEL_USER_ID}={}", sanitize_label(user_id)));
    }

    if filter.scope == Some(Scope::Team) {
        clauses.push(format!("{LABEL_SCOPE}=team"));
    }

    if let Some(team_id) = &filter.team_id {
        clauses.push(format!(
            "{LABEL_TEAM_ID_HASH}={}",
            hash_for_label(team_id, TEAM_ID_HASH_LABEL_LEN)
        ));
    }

    clauses.join(",")
}
