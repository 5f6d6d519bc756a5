//! Run summary: a grouped terminal table, an HTML version for e-mail and a
//! few lines for push notifications.

use crossterm::style::{style, StyledContent, Stylize};
use pulldown_cmark::{html, Options, Parser};
use std::fmt::Write as _;

use crate::notify::Message;
use crate::reconcile::RunReport;
use crate::sheets::{Row, Status};
use crate::util::{display_width, pad_to_width, strip_control_chars};

const URL_WIDTH: usize = 48;
const DETAILS_WIDTH: usize = 60;

/// Rows grouped by status, attention-needing statuses first, sheet order within a group.
pub fn grouped(report: &RunReport) -> Vec<(Status, Vec<&Row>)> {
    Status::REPORT_ORDER
        .into_iter()
        .filter_map(|status| {
            let rows: Vec<&Row> = report.rows.iter().filter(|r| r.status == status).collect();
            (!rows.is_empty()).then_some((status, rows))
        })
        .collect()
}

/// Count of every status present, e.g. `1 Error, 2 Suffix Added`.
pub fn summary_line(report: &RunReport) -> String {
    let mut parts: Vec<String> = grouped(report)
        .iter()
        .map(|(status, rows)| format!("{} {}", rows.len(), status))
        .collect();
    if !report.invalid.is_empty() {
        parts.push(format!("{} invalid", report.invalid.len()));
    }
    if parts.is_empty() {
        return "No rows".to_string();
    }
    parts.join(", ")
}

pub fn subject(report: &RunReport) -> String {
    let marker = if report.needs_attention() { "⚠️" } else { "✅" };
    let dry = if report.dry_run { " (dry run)" } else { "" };
    format!("{marker} Feedbin wish list sync{dry}: {}", summary_line(report))
}

/// Plain or colored table for stdout.
pub fn render_table(report: &RunReport, color: bool) -> String {
    let mut out = String::new();
    let title = if report.dry_run { "Results (dry run):" } else { "Results:" };
    let _ = writeln!(out, "{}", paint(title, color, |s| s.bold().cyan()));

    let row_width = report
        .rows
        .iter()
        .map(|r| r.index.to_string().len())
        .max()
        .unwrap_or(0)
        .max("Row".len());
    let status_width = Status::REPORT_ORDER
        .iter()
        .map(|s| display_width(s.label()))
        .max()
        .unwrap_or(0);

    let header = format!(
        "{}  {}  {}  {}",
        pad_to_width("Row", row_width),
        pad_to_width("Status", status_width),
        pad_to_width("URL", URL_WIDTH),
        "Details"
    );
    let _ = writeln!(out, "{}", paint(&header, color, |s| s.bold()));

    for (status, rows) in grouped(report) {
        for row in rows {
            let index = pad_to_width(&row.index.to_string(), row_width);
            let label = pad_to_width(status.label(), status_width);
            let url = pad_to_width(&strip_control_chars(&row.url), URL_WIDTH);
            let details = pad_to_width(&strip_control_chars(&row.details), DETAILS_WIDTH);
            let details = details.trim_end();

            let _ = writeln!(
                out,
                "{}  {}  {}  {}",
                paint(&index, color, |s| s.magenta()),
                paint(&label, color, |s| status_style(status, s)),
                paint(&url, color, |s| s.yellow()),
                details
            );
        }
    }

    for error in &report.invalid {
        let line = format!("Skipped: {error}");
        let _ = writeln!(out, "{}", paint(&line, color, |s| s.red()));
    }
    if report.write_failures > 0 {
        let line = format!("{} sheet writes failed; see log", report.write_failures);
        let _ = writeln!(out, "{}", paint(&line, color, |s| s.red()));
    }
    let _ = writeln!(out, "{}", summary_line(report));
    out
}

type Styled<'a> = StyledContent<&'a str>;

fn paint<'a>(text: &'a str, color: bool, apply: impl FnOnce(Styled<'a>) -> Styled<'a>) -> String {
    if color {
        apply(style(text)).to_string()
    } else {
        text.to_string()
    }
}

fn status_style(status: Status, text: Styled<'_>) -> Styled<'_> {
    match status {
        Status::Error => text.red().bold(),
        Status::MultipleChoices | Status::NotFound => text.yellow(),
        Status::SuffixAdded => text.green(),
        Status::New | Status::Subscribed | Status::BacklogUnread => text.cyan(),
    }
}

/// Markdown tables, one per status group.
pub fn to_markdown(report: &RunReport) -> String {
    let mut md = String::new();
    let _ = writeln!(md, "**{}**\n", summary_line(report));

    for (status, rows) in grouped(report) {
        let _ = writeln!(md, "### {status}\n");
        md.push_str("| Row | URL | Details |\n|---|---|---|\n");
        for row in rows {
            let _ = writeln!(
                md,
                "| {} | {} | {} |",
                row.index,
                md_cell(&row.url),
                md_cell(&row.details)
            );
        }
        md.push('\n');
    }

    if !report.invalid.is_empty() {
        md.push_str("### Skipped rows\n\n");
        for error in &report.invalid {
            let _ = writeln!(md, "- {}", md_cell(&error.to_string()));
        }
        md.push('\n');
    }
    if report.write_failures > 0 {
        let _ = writeln!(md, "{} sheet writes failed.", report.write_failures);
    }
    md
}

pub fn to_html(report: &RunReport) -> String {
    let markdown = to_markdown(report);
    let parser = Parser::new_ext(&markdown, Options::ENABLE_TABLES);
    let mut out = String::new();
    html::push_html(&mut out, parser);
    out
}

/// Summary line in bold, then one line per row that needs attention.
///
/// Pushover renders only a handful of tags, so the only markup is `<b>`.
pub fn to_push(report: &RunReport) -> String {
    let mut out = format!("<b>{}</b>", escape_html(&summary_line(report)));
    for (status, rows) in grouped(report) {
        if !status.needs_attention() {
            continue;
        }
        for row in rows {
            let _ = write!(
                out,
                "\n<b>{status}</b> row {}: {}",
                row.index,
                escape_html(&strip_control_chars(&row.url))
            );
        }
    }
    if report.write_failures > 0 {
        let _ = write!(out, "\n{} sheet writes failed", report.write_failures);
    }
    out
}

/// Subject plus both bodies of the run's notification.
pub fn message(report: &RunReport) -> Message {
    Message {
        subject: subject(report),
        html: to_html(report),
        summary: to_push(report),
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn md_cell(text: &str) -> String {
    strip_control_chars(text)
        .replace('\\', "\\\\")
        .replace('|', "\\|")
        .replace(['\n', '\r'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedbin::{FeedId, SubscriptionId};
    use crate::sheets::RowParseError;
    use pretty_assertions::assert_eq;

    fn row(index: usize, status: Status, details: &str) -> Row {
        Row {
            index,
            url: format!("https://site{index}.example"),
            status,
            subscription_id: Some(SubscriptionId(index as u64)),
            feed_id: Some(FeedId(index as u64 * 10)),
            details: details.to_string(),
        }
    }

    fn report() -> RunReport {
        RunReport {
            rows: vec![
                row(2, Status::SuffixAdded, "Site 2 📖"),
                row(3, Status::Error, "🚨 HTTP error | 500"),
                row(4, Status::SuffixAdded, "Site 4 📺"),
                row(5, Status::MultipleChoices, "🥞 Multiple RSS feeds found"),
            ],
            invalid: vec![RowParseError::MissingUrl { row: 6 }],
            write_failures: 0,
            dry_run: false,
        }
    }

    #[test]
    fn test_grouped_puts_attention_first() {
        let report = report();
        let groups: Vec<(Status, Vec<usize>)> = grouped(&report)
            .into_iter()
            .map(|(s, rows)| (s, rows.iter().map(|r| r.index).collect()))
            .collect();
        assert_eq!(
            groups,
            vec![
                (Status::Error, vec![3]),
                (Status::MultipleChoices, vec![5]),
                (Status::SuffixAdded, vec![2, 4]),
            ]
        );
    }

    #[test]
    fn test_summary_and_subject() {
        let report = report();
        assert_eq!(
            summary_line(&report),
            "1 Error, 1 Multiple Feed URLs, 2 Suffix Added, 1 invalid"
        );
        assert!(subject(&report).starts_with("⚠️ Feedbin wish list sync: "));

        let empty = RunReport::default();
        assert_eq!(summary_line(&empty), "No rows");
        assert!(subject(&empty).starts_with("✅"));
    }

    #[test]
    fn test_plain_table() {
        let table = render_table(&report(), false);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "Results:");
        assert!(lines[1].starts_with("Row  Status"));
        assert!(lines[2].starts_with("3    Error"));
        assert!(lines[3].starts_with("5    Multiple Feed URLs"));
        assert!(table.contains("Skipped: Row 6: no URL"));
        assert!(!table.contains('\x1b'));
    }

    #[test]
    fn test_colored_table_uses_ansi() {
        assert!(render_table(&report(), true).contains('\x1b'));
    }

    #[test]
    fn test_push_lists_only_rows_needing_attention() {
        let mut report = report();
        report.rows[1].url = "https://site3.example/?a=1&b=<2>".to_string();

        assert_eq!(
            to_push(&report),
            "<b>1 Error, 1 Multiple Feed URLs, 2 Suffix Added, 1 invalid</b>\n\
             <b>Error</b> row 3: https://site3.example/?a=1&amp;b=&lt;2&gt;\n\
             <b>Multiple Feed URLs</b> row 5: https://site5.example"
        );
    }

    #[test]
    fn test_message_keeps_table_out_of_push_body() {
        let message = message(&report());
        assert!(message.html.contains("<table>"));
        assert!(!message.summary.contains("<table>"));
        assert!(!message.summary.contains("<h3>"));
        assert!(message.subject.starts_with("⚠️"));
    }

    #[test]
    fn test_html_has_tables_and_escapes_pipes() {
        let html = to_html(&report());
        assert!(html.contains("<table>"));
        assert!(html.contains("<h3>Error</h3>"));
        assert!(html.contains("HTTP error | 500"));
        assert!(html.contains("<li>Row 6: no URL</li>"));
    }
}
