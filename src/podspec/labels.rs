//! # Labels & annotations
//!
//! Single source of truth for every label/annotation stamped on a session's
//! objects, so invariants I2 (`session-id` label equality) and I4
//! (`team-id-hash` derivation) hold by construction (spec.md §3, §6 "Label
//! schema").

use std::collections::BTreeMap;

use crate::constants::{
    ANNOTATION_CREATED_AT, ANNOTATION_TEAM_ID, LABEL_APP_INSTANCE, LABEL_APP_MANAGED_BY,
    LABEL_APP_MANAGED_BY_VALUE, LABEL_APP_NAME, LABEL_APP_NAME_VALUE, LABEL_SCOPE,
    LABEL_SESSION_ID, LABEL_TAG_PREFIX, LABEL_TEAM_ID_HASH, LABEL_USER_ID,
};
use crate::naming::{hash_for_label, sanitize_label};
use crate::session::Session;

const TEAM_ID_HASH_LABEL_LEN: usize = 63;

/// Labels applied to every object owned by `session`.
#[must_use]
pub fn for_session(session: &Session) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(LABEL_APP_NAME.to_string(), LABEL_APP_NAME_VALUE.to_string());
    labels.insert(
        LABEL_APP_MANAGED_BY.to_string(),
        LABEL_APP_MANAGED_BY_VALUE.to_string(),
    );
    labels.insert(LABEL_APP_INSTANCE.to_string(), sanitize_label(&session.id));
    labels.insert(LABEL_SESSION_ID.to_string(), sanitize_label(&session.id));
    labels.insert(LABEL_USER_ID.to_string(), sanitize_label(&session.user_id));
    labels.insert(LABEL_SCOPE.to_string(), session.scope.as_str().to_string());

    if let Some(team_id) = &session.team_id {
        labels.insert(
            LABEL_TEAM_ID_HASH.to_string(),
            hash_for_label(team_id, TEAM_ID_HASH_LABEL_LEN),
        );
    }

    for (key, value) in &session.tags {
        let label_key = format!("{LABEL_TAG_PREFIX}{}", sanitize_label(key));
        labels.insert(label_key, sanitize_label(value));
    }

    labels
}

/// Annotations applied to every object owned by `session`.
#[must_use]
pub fn annotations_for_session(session: &Session) -> BTreeMap<String, String> {
    let mut annotations = BTreeMap::new();
    annotations.insert(
        ANNOTATION_CREATED_AT.to_string(),
        session.started_at.to_rfc3339(),
    );
    if let Some(team_id) = &session.team_id {
        annotations.insert(ANNOTATION_TEAM_ID.to_string(), team_id.clone());
    }
    annotations
}

/// Inverse of the tag half of [`for_session`], used to rehydrate a
/// `Session`'s tags from a live object's labels. Best-effort: sanitization
/// is lossy, so the recovered tag key/value are the sanitized forms, not
/// necessarily byte-identical to what the caller originally supplied.
#[must_use]
pub fn tags_from_labels(labels: &BTreeMap<String, String>) -> std::collections::HashMap<String, String> {
    labels
        .iter()
        .filter_map(|(key, value)| {
            key.strip_prefix(LABEL_TAG_PREFIX)
                .map(|tag_key| (tag_key.to_string(), value.clone()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{RunServerRequest, Scope};

    fn team_session() -> Session {
        let req = RunServerRequest {
            user_id: "u1".into(),
            scope: Scope::Team,
            team_id: Some("org/team-a".into()),
            ..Default::default()
        };
        Session::new("sess-2", "default", 3284, &req)
    }

    #[test]
    fn session_id_label_matches_session_id() {
        let labels = for_session(&team_session());
        assert_eq!(labels.get(LABEL_SESSION_ID), Some(&"sess-2".to_string()));
    }

    #[test]
    fn team_id_hash_label_is_truncated_sha256() {
        let labels = for_session(&team_session());
        let expected = hash_for_label("org/team-a", TEAM_ID_HASH_LABEL_LEN);
        assert_eq!(labels.get(LABEL_TEAM_ID_HASH), Some(&expected));
    }

    #[test]
    fn team_id_annotation_preserves_original_value() {
        let annotations = annotations_for_session(&team_session());
        assert_eq!(
            annotations.get(ANNOTATION_TEAM_ID),
            Some(&"org/team-a".to_string())
        );
    }

    #[test]
    fn tags_become_sanitized_labels() {
        let mut session = team_session();
        session.tags.insert("org/unit".into(), "rev@1".into());
        let labels = for_session(&session);
        assert_eq!(
            labels.get(&format!("{LABEL_TAG_PREFIX}org-unit")),
            Some(&"rev-1".to_string())
        );
    }

    #[test]
    fn tags_from_labels_recovers_tag_entries_only() {
        let mut session = team_session();
        session.tags.insert("env".into(), "prod".into());
        let labels = for_session(&session);

        let tags = tags_from_labels(&labels);
        assert_eq!(tags.get("env"), Some(&"prod".to_string()));
        assert!(!tags.contains_key(LABEL_SESSION_ID));
    }
}
