//! Canonical default values shared by the gateway and the workers.

pub const DEFAULT_TRANSCRIBE_ADDR: &str = "tcp://127.0.0.1:50051";
pub const DEFAULT_VISION_ADDR: &str = "tcp://127.0.0.1:50052";
pub const DEFAULT_GENERATE_ADDR: &str = "tcp://127.0.0.1:50053";
pub const DEFAULT_INTENT_ADDR: &str = "tcp://127.0.0.1:50054";

/// Upper bound on a clarify round-trip before the gateway falls back.
pub const CLARIFY_TIMEOUT_SECS: u64 = 5;

/// How long a client waits for the TCP connection to a worker. Calls to a
/// worker that is down fail after this instead of retrying forever.
pub const CONNECT_TIMEOUT_MS: u64 = 2000;

/// Requests a single worker process serves at the same time.
pub const MAX_IN_FLIGHT_REQUESTS: usize = 2;

/// Detections below this score are discarded.
pub const DETECTION_SCORE_THRESHOLD: f32 = 0.5;

pub const NO_TRANSCRIPT_PLACEHOLDER: &str = "No transcript available.";
pub const NO_VISION_PLACEHOLDER: &str = "No visual data available.";
pub const NO_OBJECTS_SUMMARY: &str = "No objects detected.";
pub const OBJECTS_SUMMARY_HEADER: &str = "Objects detected:";
