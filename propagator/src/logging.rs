// SPDX-License-Identifier: AGPL-3.0-only

//! Run-log lines for propagator runs.
//!
//! The run log goes to stdout, one `# label value` line per quantity with
//! both columns left-aligned in 17-character fields. Floating-point values
//! are printed in shortest round-trip form, so every bit of a logged
//! residual or plaquette can be recovered from the text. Diagnostics go
//! through the `log` facade instead.

use std::fmt::Display;

/// Width of the label and value columns.
pub const COLUMN_WIDTH: usize = 17;

/// `# label value` with both columns padded to [`COLUMN_WIDTH`].
#[must_use]
pub fn kv_line(label: &str, value: impl Display) -> String {
    let value = value.to_string();
    format!("# {label:<COLUMN_WIDTH$}{value:<COLUMN_WIDTH$}")
}

/// `# message`
#[must_use]
pub fn message_line(message: &str) -> String {
    format!("# {message}")
}

pub fn log_kv(label: &str, value: impl Display) {
    println!("{}", kv_line(label, value));
}

pub fn log_msg(message: &str) {
    println!("{}", message_line(message));
}

/// Initialise `env_logger` with `info` as the default level.
///
/// `RUST_LOG` still overrides. Safe to call more than once.
pub fn init() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();
}
