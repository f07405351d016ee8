//! Runtime defaults
//!
//! Shared constants used by `RuntimeOptions` and the bootstrap classes.

/// Maximum number of nested activations on one activity
pub const DEFAULT_MAX_CALL_DEPTH: usize = 1000;

/// Thread name prefix for spawned activities (`oryx-activity-<id>`)
pub const DEFAULT_ACTIVITY_NAME_PREFIX: &str = "oryx-activity";

/// Selector invoked when ordinary resolution fails
pub const UNKNOWN_SELECTOR: &str = "UNKNOWN";

/// Name of the root class
pub const OBJECT_CLASS_NAME: &str = "OBJECT";

/// Name of the class message objects dispatch through
pub const MESSAGE_CLASS_NAME: &str = "MESSAGE";
