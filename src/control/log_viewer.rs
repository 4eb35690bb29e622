//! HTML rendering of the JSON log file

use serde_json::Value;
use std::fmt::Write;

pub const UNKNOWN_LEVEL: &str = "UNKNOWN";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub timestamp: String,
    pub level: String,
    pub message: String,
}

/// Parse one JSON log line; anything else is kept raw with level `UNKNOWN`
pub fn parse_line(line: &str) -> LogLine {
    let parsed = serde_json::from_str::<Value>(line).ok().filter(Value::is_object);
    let Some(value) = parsed else {
        return LogLine {
            timestamp: String::new(),
            level: UNKNOWN_LEVEL.to_string(),
            message: line.to_string(),
        };
    };

    let text = |pointer: &str| value.pointer(pointer).and_then(Value::as_str).map(str::to_string);
    LogLine {
        timestamp: text("/timestamp").unwrap_or_default(),
        level: text("/level").unwrap_or_else(|| UNKNOWN_LEVEL.to_string()),
        message: text("/fields/message")
            .or_else(|| text("/message"))
            .unwrap_or_else(|| line.to_string()),
    }
}

/// Non-blank lines, newest first
pub fn parse_log(content: &str) -> Vec<LogLine> {
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(parse_line)
        .rev()
        .collect()
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn level_class(level: &str) -> &'static str {
    match level {
        "ERROR" => "error",
        "WARN" => "warn",
        "INFO" => "info",
        "DEBUG" | "TRACE" => "debug",
        _ => "unknown",
    }
}

pub fn render_page(lines: &[LogLine]) -> String {
    let mut html = String::from(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>Scraper Logs</title>\n<style>\n\
         body { font-family: monospace; background: #111; color: #ddd; }\n\
         .error { color: #f66; } .warn { color: #fc6; } .info { color: #9f9; }\n\
         .debug { color: #888; } .unknown { color: #ccc; }\n\
         </style>\n</head>\n<body>\n<h1>Scraper Logs</h1>\n",
    );
    if lines.is_empty() {
        html.push_str("<p>No log entries yet.</p>\n");
    }
    for line in lines {
        let _ = writeln!(
            html,
            "<div class=\"{}\">[{}] {}: {}</div>",
            level_class(&line.level),
            escape_html(&line.timestamp),
            escape_html(&line.level),
            escape_html(&line.message)
        );
    }
    html.push_str("</body>\n</html>\n");
    html
}
