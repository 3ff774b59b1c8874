//! Logging setup
//!
//! Thin wrapper over env_logger. Setting `PURE3270_LOG_JSON=true` selects
//! a JSON object per log line, which downstream collectors can ingest
//! without a format shim; anything else keeps the default human format.
//! Filtering stays under `RUST_LOG` control either way.

use std::io::Write;

/// Environment variable selecting JSON-formatted log events
pub const LOG_JSON_ENV: &str = "PURE3270_LOG_JSON";

/// Initialize the process logger. Safe to call more than once; later
/// calls are no-ops.
pub fn init() {
    let json = std::env::var(LOG_JSON_ENV)
        .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
        .unwrap_or(false);

    let mut builder = env_logger::Builder::from_default_env();
    if json {
        builder.format(|buf, record| {
            let event = serde_json::json!({
                "level": record.level().to_string(),
                "target": record.target(),
                "message": record.args().to_string(),
                "module": record.module_path(),
                "line": record.line(),
            });
            writeln!(buf, "{event}")
        });
    }
    // A second init (tests, embedding apps) must not panic
    let _ = builder.try_init();
}
