//! `devforge info`

use crate::output::key_value_table;
use colored::Colorize;
use devforge_core::logging::format_duration;
use devforge_server::api::models::SystemInfoResponse;
use std::time::Duration;

pub fn print_info(info: &SystemInfoResponse) {
    println!("{}", "DevForge service".bold());
    let rows = [
        ("platform", info.platform.clone()),
        ("os", info.os.clone()),
        ("arch", info.arch.clone()),
        ("version", info.version.clone()),
        ("cwd", info.cwd.clone().unwrap_or_else(|| "-".to_string())),
        ("user", info.user.clone().unwrap_or_else(|| "-".to_string())),
        ("uptime", format_duration(Duration::from_secs(info.uptime_secs))),
        ("open sessions", info.open_sessions.to_string()),
    ];
    println!("{}", key_value_table(rows));
}
