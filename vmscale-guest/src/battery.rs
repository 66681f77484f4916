//! Guest data command battery.
//!
//! The probe runs all commands in one shell invocation, with a separator
//! token echoed between them, so a 2000-guest sweep costs one connection per
//! guest instead of one per command. Each command's output segment must
//! match its pattern; the named capture groups become the snapshot fields.

use once_cell::sync::Lazy;
use regex::Regex;

/// Separator echoed between command outputs in the joined invocation.
pub const OUTPUT_SEPARATOR: &str = "|=====|";

static DATETIME_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?P<datetime>.*)$").unwrap());

static PROC_STAT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s).*\nbtime (?P<btime>[0-9]+)\n.*").unwrap());

static UPTIME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<current_time>[^ ]+) up (?P<up_for>[^,]+),[ ]+(?P<user_info>[^,]+),[ ]+load average: (?P<load1min>[0-9]+\.[0-9]+), (?P<load5min>[0-9]+\.[0-9]+), (?P<load15min>[0-9]+\.[0-9]+)$",
    )
    .unwrap()
});

/// One probe command and the pattern its output segment must match.
#[derive(Debug, Clone)]
pub struct GuestCommand {
    pub name: &'static str,
    pub command: &'static str,
    pub pattern: &'static Regex,
}

/// The standard battery, in the order the segments come back.
pub static STANDARD_BATTERY: Lazy<Vec<GuestCommand>> = Lazy::new(|| {
    vec![
        GuestCommand {
            name: "datetime",
            command: "date -u -Is",
            pattern: &DATETIME_PATTERN,
        },
        GuestCommand {
            name: "proc_stat",
            command: "cat /proc/stat",
            pattern: &PROC_STAT_PATTERN,
        },
        GuestCommand {
            name: "uptime",
            command: "uptime",
            pattern: &UPTIME_PATTERN,
        },
    ]
});

/// Join a battery into one `sh -c` invocation with separator echoes.
pub fn shell_command(battery: &[GuestCommand]) -> Vec<String> {
    let joined = battery
        .iter()
        .map(|entry| entry.command)
        .collect::<Vec<_>>()
        .join(&format!(" && echo '{OUTPUT_SEPARATOR}' && "));
    vec!["sh".to_string(), "-c".to_string(), joined]
}
