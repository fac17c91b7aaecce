use crate::db::log::{LogEntry, load_log};
use crate::db::pool::DbPool;
use crate::errors::{AppError, AppResult};
use ansi_term::Colour;
use regex::Regex;

const OP_WIDTH: usize = 60;

fn ansi_re() -> AppResult<Regex> {
    Regex::new(r"\x1B\[[0-9;]*[mK]").map_err(|e| AppError::Other(e.to_string()))
}

/// Colour of an audit operation in `log --print`.
fn color_for_operation(op: &str) -> Colour {
    match op {
        "device_add" | "device_set" => Colour::Green,
        "correct" => Colour::Yellow,
        "batch_add" => Colour::Blue,
        "batch_completed" => Colour::Cyan,
        "reset" => Colour::Red,
        "migration_applied" => Colour::Purple,
        "init" => Colour::RGB(255, 153, 51),
        _ => Colour::White,
    }
}

/// Render the audit table, one line per entry, oldest first.
///
/// Only the operation word is coloured; `op (target)` is cut to 60 visible
/// characters before padding so colour codes never skew the columns.
pub fn render_log(entries: &[LogEntry]) -> AppResult<Vec<String>> {
    let re = ansi_re()?;
    let id_w = entries.iter().map(|e| e.id.to_string().len()).max().unwrap_or(1);
    let date_w = entries.iter().map(|e| e.date.len()).max().unwrap_or(19);

    let mut lines = Vec::with_capacity(entries.len());
    for e in entries {
        let color = color_for_operation(&e.operation);
        let op_target = if e.target.is_empty() {
            e.operation.clone()
        } else {
            format!("{} ({})", e.operation, e.target)
        };

        let visible = if op_target.chars().count() > OP_WIDTH {
            let mut s: String = op_target.chars().take(OP_WIDTH - 3).collect();
            s.push_str("...");
            s
        } else {
            op_target
        };

        let colored = match visible.split_once(' ') {
            Some((op, rest)) => format!("{} {}", color.paint(op), rest),
            None => color.paint(visible.as_str()).to_string(),
        };
        let shown = re.replace_all(&colored, "").chars().count();
        let padding = " ".repeat(OP_WIDTH.saturating_sub(shown));

        lines.push(format!(
            "{:>id_w$}: {:<date_w$} | {}{} => {}",
            e.id, e.date, colored, padding, e.message
        ));
    }
    Ok(lines)
}

pub struct LogLogic;

impl LogLogic {
    pub fn print_log(pool: &mut DbPool) -> AppResult<()> {
        let entries = load_log(&pool.conn)?;
        println!("📜 Internal log:\n");
        for line in render_log(&entries)? {
            println!("{line}");
        }
        Ok(())
    }
}

