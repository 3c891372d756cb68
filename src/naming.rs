//! # NameSanitizer
//!
//! Deterministic, total, pure mappings from arbitrary identifiers to
//! Kubernetes-legal label keys/values and Secret names, plus a
//! content-addressed hash used wherever the source value may carry
//! characters a label cannot (e.g. `/` in a team id).
//!
//! See spec.md §4.1 and the testable properties P3/P4 in spec.md §8.

use sha2::{Digest, Sha256};

use crate::constants::{SERVICE_NAME_SUFFIX, SESSION_RESOURCE_PREFIX};

const MAX_LABEL_LEN: usize = 63;
const MAX_SECRET_NAME_LEN: usize = 253;

/// The full set of resource names mechanically derived from a session id.
/// Naming invariant from spec.md §3: these names are the sole cross-process
/// handle and must round-trip exactly between `CreateSession` and rehydrate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionNames {
    pub deployment: String,
    pub service: String,
    pub pvc: String,
    pub initial_message_secret: String,
    pub github_token_secret: String,
}

/// Compute every resource name for a session id in one place, so Create and
/// rehydrate code paths can never disagree (P4).
#[must_use]
pub fn names_for(id: &str) -> SessionNames {
    let deployment = deployment_name(id);
    let service = service_name(id);
    let pvc = pvc_name(id);
    let initial_message_secret = format!("{service}-initial-message");
    let github_token_secret = format!("{service}-github-token");
    SessionNames {
        deployment,
        service,
        pvc,
        initial_message_secret,
        github_token_secret,
    }
}

#[must_use]
pub fn deployment_name(id: &str) -> String {
    format!("{SESSION_RESOURCE_PREFIX}{id}")
}

#[must_use]
pub fn service_name(id: &str) -> String {
    format!("{}{SERVICE_NAME_SUFFIX}", deployment_name(id))
}

#[must_use]
pub fn pvc_name(id: &str) -> String {
    format!("{}-pvc", deployment_name(id))
}

/// Sanitize an arbitrary string into a legal Kubernetes label key/value:
/// max 63 chars, alphanumeric plus `-_.`, trimmed of leading/trailing
/// non-alphanumerics. Pure and total; empty input yields empty output.
#[must_use]
pub fn sanitize_label(input: &str) -> String {
    if input.is_empty() {
        return String::new();
    }

    let replaced: String = input
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '-'
            }
        })
        .collect();

    let truncated: String = replaced.chars().take(MAX_LABEL_LEN).collect();
    trim_non_alphanumeric(&truncated)
}

/// Sanitize an arbitrary string into a legal DNS-1123 subdomain usable as a
/// Secret name: lowercase, illegal characters replaced with `-`, repeated
/// `-` collapsed, leading/trailing `-` trimmed, and truncated leaving room
/// for an optional caller-supplied prefix.
#[must_use]
pub fn sanitize_secret_name(input: &str, reserve_for_prefix: usize) -> String {
    if input.is_empty() {
        return String::new();
    }

    let lowered = input.to_ascii_lowercase();
    let replaced: String = lowered
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
        .collect();

    let collapsed = collapse_repeated_dashes(&replaced);
    let trimmed = collapsed.trim_matches('-');
    let max_len = MAX_SECRET_NAME_LEN.saturating_sub(reserve_for_prefix);
    let truncated: String = trimmed.chars().take(max_len).collect();
    truncated.trim_matches('-').to_string()
}

/// `sha256(x)` as lowercase hex, truncated to `len` characters (63 for a
/// label value, 16 for brevity elsewhere). Used whenever the source value
/// may contain characters a label cannot carry (spec.md I4: `team-id-hash`).
#[must_use]
pub fn hash_for_label(input: &str, len: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();
    let hex = digest.iter().map(|b| format!("{b:02x}")).collect::<String>();
    hex.chars().take(len).collect()
}

fn trim_non_alphanumeric(s: &str) -> String {
    let start = s.find(|c: char| c.is_ascii_alphanumeric());
    let end = s.rfind(|c: char| c.is_ascii_alphanumeric());
    match (start, end) {
        (Some(a), Some(b)) => s[a..=b].to_string(),
        _ => String::new(),
    }
}

fn collapse_repeated_dashes(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_dash = false;
    for c in s.chars() {
        if c == '-' {
            if !prev_dash {
                out.push(c);
            }
            prev_dash = true;
        } else {
            out.push(c);
            prev_dash = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_for_round_trips() {
        let n = names_for("sess-1");
        assert_eq!(n.deployment, "agentapi-session-sess-1");
        assert_eq!(n.service, "agentapi-session-sess-1-svc");
        assert_eq!(n.pvc, "agentapi-session-sess-1-pvc");
        assert_eq!(
            n.initial_message_secret,
            "agentapi-session-sess-1-svc-initial-message"
        );
        assert_eq!(
            n.github_token_secret,
            "agentapi-session-sess-1-svc-github-token"
        );
    }

    #[test]
    fn names_for_agrees_across_calls() {
        // P4: name functions are total functions of `id` alone.
        assert_eq!(names_for("abc"), names_for("abc"));
    }

    #[test]
    fn sanitize_label_replaces_illegal_chars() {
        assert_eq!(sanitize_label("org/team-a"), "org-team-a");
        assert_eq!(sanitize_label("user@example.com"), "user-example.com");
    }

    #[test]
    fn sanitize_label_trims_non_alphanumeric_ends() {
        assert_eq!(sanitize_label("/leading-and-trailing/"), "leading-and-trailing");
    }

    #[test]
    fn sanitize_label_truncates_to_63() {
        let long = "a".repeat(100);
        assert_eq!(sanitize_label(&long).len(), 63);
    }

    #[test]
    fn sanitize_label_empty_is_empty() {
        assert_eq!(sanitize_label(""), "");
    }

    #[test]
    fn sanitize_label_idempotent() {
        // P3: sanitize(sanitize(x)) == sanitize(x).
        for input in ["org/team-a", "user@example.com", "", "already-legal", "___--@@"] {
            let once = sanitize_label(input);
            let twice = sanitize_label(&once);
            assert_eq!(once, twice, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn sanitize_secret_name_lowercases_and_collapses() {
        assert_eq!(sanitize_secret_name("Org/Team--A", 0), "org-team-a");
    }

    #[test]
    fn sanitize_secret_name_idempotent() {
        for input in ["Org/Team--A", "ALLCAPS", "", "a--b---c"] {
            let once = sanitize_secret_name(input, 0);
            let twice = sanitize_secret_name(&once, 0);
            assert_eq!(once, twice, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn sanitize_secret_name_reserves_room_for_prefix() {
        let long = "a".repeat(260);
        let name = sanitize_secret_name(&long, 10);
        assert!(name.len() <= MAX_SECRET_NAME_LEN - 10);
    }

    #[test]
    fn hash_for_label_is_deterministic_and_truncated() {
        let h1 = hash_for_label("org/team-a", 63);
        let h2 = hash_for_label("org/team-a", 63);
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 63.min(64));
        assert_ne!(hash_for_label("org/team-a", 63), hash_for_label("org/team-b", 63));
    }

    #[test]
    fn hash_for_label_brief_form() {
        assert_eq!(hash_for_label("x", 16).len(), 16);
    }
}
