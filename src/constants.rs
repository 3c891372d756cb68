//! # Constants
//!
//! Shared constants used throughout the session manager.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Default HTTP server port for metrics and health probes.
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default namespace sessions are created in when unset.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Default session container port (`AGENTAPI_PORT`).
pub const DEFAULT_SESSION_PORT: i32 = 3284;

/// Default Pod start timeout, in seconds, bounding the watcher's fast poll phase.
pub const DEFAULT_POD_START_TIMEOUT_SECS: u64 = 300;

/// Default timeout for delete operations.
pub const DEFAULT_POD_STOP_TIMEOUT_SECS: u64 = 60;

/// Watcher fast-poll tick interval (Phase A), in seconds.
pub const WATCHER_FAST_POLL_SECS: u64 = 2;

/// Watcher steady-state poll tick interval (Phase B), in seconds.
pub const WATCHER_SLOW_POLL_SECS: u64 = 10;

/// Deadline for the process-wide base ConfigMap/Secret ensure step.
pub const ENSURE_STEP_DEADLINE_SECS: u64 = 30;

/// Resource name prefix for every object belonging to a session.
pub const SESSION_RESOURCE_PREFIX: &str = "agentapi-session-";

/// Suffix appended to the deployment name to derive the service name.
pub const SERVICE_NAME_SUFFIX: &str = "-svc";

/// Label applied to every session-scoped object, holding the session id.
pub const LABEL_SESSION_ID: &str = "agentapi.proxy/session-id";

/// Label holding the sanitized user id.
pub const LABEL_USER_ID: &str = "agentapi.proxy/user-id";

/// Label holding the session scope (`user` | `team`).
pub const LABEL_SCOPE: &str = "agentapi.proxy/scope";

/// Label holding the truncated sha256 of the team id.
pub const LABEL_TEAM_ID_HASH: &str = "agentapi.proxy/team-id-hash";

/// Label prefix for user-supplied tags; the tag key is appended and sanitized.
pub const LABEL_TAG_PREFIX: &str = "agentapi.proxy/tag-";

/// Annotation holding the original, unsanitized team id.
pub const ANNOTATION_TEAM_ID: &str = "agentapi.proxy/team-id";

/// Annotation holding the RFC-3339 creation timestamp.
pub const ANNOTATION_CREATED_AT: &str = "agentapi.proxy/created-at";

/// Standard Kubernetes recommended labels, stamped on every object we own.
pub const LABEL_APP_NAME: &str = "app.kubernetes.io/name";
pub const LABEL_APP_NAME_VALUE: &str = "agentapi-session";
pub const LABEL_APP_MANAGED_BY: &str = "app.kubernetes.io/managed-by";
pub const LABEL_APP_MANAGED_BY_VALUE: &str = "agentapi-proxy";
pub const LABEL_APP_INSTANCE: &str = "app.kubernetes.io/instance";

/// Ownership label value used by `MarketplaceSyncer` to decide whether an
/// existing Secret may be mutated or deleted.
pub const MANAGED_BY_SETTINGS_VALUE: &str = "settings";

/// Mount path for the session working directory volume.
pub const WORKDIR_MOUNT_PATH: &str = "/home/agentapi/workdir";

/// Home directory inside the session Pod.
pub const SESSION_HOME: &str = "/home/agentapi";

/// Path at which the GitHub App PEM file is mounted/shared.
pub const GITHUB_APP_PEM_PATH: &str = "/github-app/app.pem";

/// Prefix applied to per-user/team env-from Secret names.
pub const ENV_SECRET_PREFIX: &str = "agent-env-";

/// Default ConfigMap name prefix for per-user Claude config.
pub const DEFAULT_CLAUDE_CONFIG_USER_CONFIGMAP_PREFIX: &str = "claude-config-user-";

/// Prefix applied to the `MarketplaceSyncer`'s Secret name.
pub const MARKETPLACE_SECRET_PREFIX: &str = "marketplace-";

/// Key under which the pretty-JSON marketplace map is stored in the Secret.
pub const MARKETPLACE_DATA_KEY: &str = "marketplaces.json";
