//! Table rendering of process snapshots

use comfy_table::{presets::UTF8_FULL, Cell, Color, Table};

use crate::process::{ProcessInfo, ProcessStatus};

/// Commands longer than this are cut and suffixed with `...`
const COMMAND_WIDTH: usize = 40;

/// Message shown when nothing is supervised
pub const EMPTY_MESSAGE: &str = "No background processes";

/// Truncate a command for display
pub fn truncate_command(command: &str) -> String {
    if command.chars().count() > COMMAND_WIDTH {
        let head: String = command.chars().take(COMMAND_WIDTH - 3).collect();
        format!("{head}...")
    } else {
        command.to_string()
    }
}

fn status_cell(info: &ProcessInfo) -> String {
    match (info.status, info.exit_code) {
        (ProcessStatus::Running, _) => info.status.to_string(),
        (_, Some(code)) => format!("{} ({})", info.status, code),
        (_, None) => info.status.to_string(),
    }
}

/// Render snapshots as a bordered table with a header row
pub fn render_table(infos: &[ProcessInfo]) -> String {
    if infos.is_empty() {
        return format!("{EMPTY_MESSAGE}\n");
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["ID", "STATUS", "PID", "RUNTIME", "LINES", "COMMAND"]);

    for info in infos {
        table.add_row(vec![
            Cell::new(&info.id),
            Cell::new(status_cell(info)).fg(status_color(info.status)),
            Cell::new(info.pid.map(|pid| pid.to_string()).unwrap_or_else(|| "-".into())),
            Cell::new(info.runtime()),
            Cell::new(info.output_line_count),
            Cell::new(truncate_command(&info.command)),
        ]);
    }

    format!("{table}\n")
}

fn status_color(status: ProcessStatus) -> Color {
    match status {
        ProcessStatus::Running => Color::Cyan,
        ProcessStatus::Completed => Color::Green,
        ProcessStatus::Failed => Color::Red,
        ProcessStatus::Killed => Color::Yellow,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;

    fn info(id: &str, status: ProcessStatus, exit_code: Option<i32>) -> ProcessInfo {
        ProcessInfo {
            id: id.into(),
            command: "sleep 5".into(),
            status,
            pid: status.is_running().then_some(4242),
            started_at: Local::now(),
            ended_at: None,
            duration: chrono::Duration::seconds(65),
            exit_code,
            output_line_count: 3,
            dropped_lines: 0,
        }
    }

    #[test]
    fn test_empty_table() {
        assert_eq!(render_table(&[]), "No background processes\n");
    }

    #[test]
    fn test_truncate_command() {
        assert_eq!(truncate_command("short"), "short");
        let long = "x".repeat(50);
        let cut = truncate_command(&long);
        assert_eq!(cut.chars().count(), 40);
        assert!(cut.ends_with("..."));
    }

    #[test]
    fn test_table_rows() {
        let table = render_table(&[
            info("shell_1", ProcessStatus::Running, None),
            info("shell_2", ProcessStatus::Failed, Some(1)),
        ]);

        let header = table.lines().find(|l| l.contains("ID")).unwrap();
        for column in ["STATUS", "PID", "RUNTIME", "LINES", "COMMAND"] {
            assert!(header.contains(column), "missing {column}");
        }

        let running = table.lines().find(|l| l.contains("shell_1")).unwrap();
        assert!(running.contains("4242"));
        assert!(running.contains("1m 5s"));
        assert!(running.contains("sleep 5"));

        let failed = table.lines().find(|l| l.contains("shell_2")).unwrap();
        assert!(failed.contains("✗ failed (1)"));
        assert!(failed.contains(" - "));
        assert!(table.ends_with('\n'));
    }
}
