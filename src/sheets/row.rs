//! Typed rows of the wish-list sheet.
//!
//! Cells are parsed into a [`Row`] right after reading so the rest of the
//! program never touches raw values. Columns are located by header text, so
//! reordering the sheet does not break parsing; only the write-back block has
//! a fixed shape (see [`SheetLayout`]).

use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::SheetError;
use crate::feedbin::{FeedId, SubscriptionId};

pub const URL_HEADER: &str = "URL to subscribe to";
pub const STATUS_HEADER: &str = "Status";
pub const SUBSCRIPTION_ID_HEADER: &str = "Subscription ID";
pub const FEED_ID_HEADER: &str = "Feed ID";
pub const DETAILS_HEADER: &str = "Details";

/// Sheet row number of the first data row (row 1 is the header).
pub const FIRST_DATA_ROW: usize = 2;

/// Rightmost column read from the sheet (`Z`).
pub const LAST_READ_COLUMN: usize = 25;

/// Separates the failed step from the message in an Error row's details.
const FAILED_MARKER: &str = " failed: ";

// ============================================================================
// Status
// ============================================================================

/// Progress of one URL. The label is the exact cell text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    New,
    MultipleChoices,
    NotFound,
    Subscribed,
    BacklogUnread,
    SuffixAdded,
    Error,
}

impl Status {
    /// Attention-needing statuses first.
    pub const REPORT_ORDER: [Status; 7] = [
        Status::Error,
        Status::MultipleChoices,
        Status::NotFound,
        Status::New,
        Status::Subscribed,
        Status::BacklogUnread,
        Status::SuffixAdded,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Status::New => "New",
            Status::MultipleChoices => "Multiple Feed URLs",
            Status::NotFound => "No Feed Found",
            Status::Subscribed => "Subscribed",
            Status::BacklogUnread => "Backlog Marked Unread",
            Status::SuffixAdded => "Suffix Added",
            Status::Error => "Error",
        }
    }

    /// Needs a human (or a later run) to look at it.
    pub fn needs_attention(self) -> bool {
        matches!(
            self,
            Status::Error | Status::MultipleChoices | Status::NotFound
        )
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown status {0:?}")]
pub struct UnknownStatus(pub String);

impl FromStr for Status {
    type Err = UnknownStatus;

    /// An empty cell is a row nobody has touched yet.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Status::New);
        }
        Status::REPORT_ORDER
            .into_iter()
            .find(|status| status.label() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

// ============================================================================
// Row
// ============================================================================

/// The next remote operation a row needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Subscribe,
    MarkBacklogUnread,
    AddSuffix,
}

impl Step {
    pub const ALL: [Step; 3] = [Step::Subscribe, Step::MarkBacklogUnread, Step::AddSuffix];
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Step::Subscribe => "subscribe",
            Step::MarkBacklogUnread => "mark backlog unread",
            Step::AddSuffix => "add title suffix",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    /// 1-based sheet row number.
    pub index: usize,
    pub url: String,
    pub status: Status,
    pub subscription_id: Option<SubscriptionId>,
    pub feed_id: Option<FeedId>,
    pub details: String,
}

impl Row {
    pub fn new(index: usize, url: impl Into<String>) -> Self {
        Self {
            index,
            url: url.into(),
            status: Status::New,
            subscription_id: None,
            feed_id: None,
            details: String::new(),
        }
    }

    /// Derived from the row alone; `None` means nothing to do this run.
    ///
    /// An errored row retries the step recorded in its details, provided the
    /// ids that step needs are still there. Without a recorded step (e.g. a
    /// hand-edited row) it resumes at the backlog step when both ids are
    /// known, and starts over otherwise.
    pub fn next_step(&self) -> Option<Step> {
        match self.status {
            Status::New | Status::NotFound => Some(Step::Subscribe),
            Status::Subscribed => Some(Step::MarkBacklogUnread),
            Status::BacklogUnread => Some(Step::AddSuffix),
            Status::Error => match (self.failed_step(), self.subscription_id, self.feed_id) {
                (Some(Step::AddSuffix), Some(_), _) => Some(Step::AddSuffix),
                (Some(Step::MarkBacklogUnread) | None, Some(_), Some(_)) => {
                    Some(Step::MarkBacklogUnread)
                }
                _ => Some(Step::Subscribe),
            },
            Status::MultipleChoices | Status::SuffixAdded => None,
        }
    }

    pub fn with_status(mut self, status: Status, details: impl Into<String>) -> Self {
        self.status = status;
        self.details = details.into();
        self
    }

    /// Moves the row to Error and prefixes the details with the failed step,
    /// e.g. `add title suffix failed: 🚨 ...`, so the next run knows where to resume.
    pub fn failed(self, step: Step, message: impl fmt::Display) -> Self {
        self.with_status(Status::Error, format!("{step}{FAILED_MARKER}{message}"))
    }

    /// The step an Error row stopped at, read back from its details.
    pub fn failed_step(&self) -> Option<Step> {
        if self.status != Status::Error {
            return None;
        }
        Step::ALL.into_iter().find(|step| {
            self.details
                .strip_prefix(&step.to_string())
                .is_some_and(|rest| rest.starts_with(FAILED_MARKER))
        })
    }
}

// ============================================================================
// Parsing
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowParseError {
    #[error("Row {row}: no URL")]
    MissingUrl { row: usize },

    #[error("Row {row}: unknown status {value:?}")]
    UnknownStatus { row: usize, value: String },

    #[error("Row {row}: {column} {value:?} is not a number")]
    InvalidId {
        row: usize,
        column: &'static str,
        value: String,
    },
}

impl RowParseError {
    pub fn row(&self) -> usize {
        match self {
            RowParseError::MissingUrl { row }
            | RowParseError::UnknownStatus { row, .. }
            | RowParseError::InvalidId { row, .. } => *row,
        }
    }
}

#[derive(Debug, Default)]
pub struct ParsedRows {
    pub rows: Vec<Row>,
    pub invalid: Vec<RowParseError>,
}

#[derive(Debug, Clone, Copy)]
struct Columns {
    url: usize,
    status: usize,
    subscription_id: usize,
    feed_id: usize,
    details: usize,
}

impl Columns {
    fn locate(header: &[Value]) -> Result<Self, SheetError> {
        let find = |name: &str| {
            header
                .iter()
                .position(|cell| cell_text(cell).eq_ignore_ascii_case(name))
                .ok_or_else(|| SheetError::MissingColumn(name.to_string()))
        };

        Ok(Self {
            url: find(URL_HEADER)?,
            status: find(STATUS_HEADER)?,
            subscription_id: find(SUBSCRIPTION_ID_HEADER)?,
            feed_id: find(FEED_ID_HEADER)?,
            details: find(DETAILS_HEADER)?,
        })
    }
}

/// Parses a values grid (header first) into rows.
///
/// Fully blank rows are dropped silently. Malformed rows are returned in
/// `invalid` and never processed. An empty grid has no rows; a header
/// without the required columns is an error.
pub fn parse_rows(values: &[Vec<Value>]) -> Result<ParsedRows, SheetError> {
    let Some((header, data)) = values.split_first() else {
        return Ok(ParsedRows::default());
    };
    let columns = Columns::locate(header)?;

    let mut parsed = ParsedRows::default();
    for (offset, cells) in data.iter().enumerate() {
        let index = FIRST_DATA_ROW + offset;
        if cells.iter().all(|cell| cell_text(cell).is_empty()) {
            continue;
        }
        match parse_row(index, cells, &columns) {
            Ok(row) => parsed.rows.push(row),
            Err(e) => {
                tracing::warn!(row = index, error = %e, "Skipping malformed row");
                parsed.invalid.push(e);
            }
        }
    }

    Ok(parsed)
}

fn parse_row(index: usize, cells: &[Value], columns: &Columns) -> Result<Row, RowParseError> {
    let cell = |i: usize| cells.get(i).map(cell_text).unwrap_or_default();

    let url = cell(columns.url);
    if url.is_empty() {
        return Err(RowParseError::MissingUrl { row: index });
    }

    let status_text = cell(columns.status);
    let status = status_text
        .parse::<Status>()
        .map_err(|UnknownStatus(value)| RowParseError::UnknownStatus { row: index, value })?;

    let subscription_id =
        parse_id(index, SUBSCRIPTION_ID_HEADER, cells.get(columns.subscription_id))?
            .map(SubscriptionId);
    let feed_id = parse_id(index, FEED_ID_HEADER, cells.get(columns.feed_id))?.map(FeedId);

    Ok(Row {
        index,
        url,
        status,
        subscription_id,
        feed_id,
        details: cell(columns.details),
    })
}

/// Ids come back as numbers with `UNFORMATTED_VALUE`, but hand-typed cells may be text.
fn parse_id(
    row: usize,
    column: &'static str,
    cell: Option<&Value>,
) -> Result<Option<u64>, RowParseError> {
    let invalid = |value: String| RowParseError::InvalidId { row, column, value };

    match cell {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => match (n.as_u64(), n.as_f64()) {
            (Some(id), _) => Ok(Some(id)),
            (None, Some(f)) if f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 => {
                Ok(Some(f as u64))
            }
            _ => Err(invalid(n.to_string())),
        },
        Some(other) => {
            let text = cell_text(other);
            if text.is_empty() {
                return Ok(None);
            }
            text.parse().map(Some).map_err(|_| invalid(text))
        }
    }
}

/// Trimmed display text of a cell.
pub fn cell_text(cell: &Value) -> String {
    match cell {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        Value::Bool(b) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
        other => other.to_string(),
    }
}

// ============================================================================
// Write-back layout
// ============================================================================

/// Shape of the block written back for each row.
///
/// Status, Subscription ID, Feed ID and Details sit in adjacent columns starting
/// at `status_column`; with `step_checkboxes` three booleans (Subscribed,
/// Backlog Unread, Suffix Added) follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SheetLayout {
    status_column: usize,
    step_checkboxes: bool,
}

impl Default for SheetLayout {
    fn default() -> Self {
        Self {
            status_column: 2, // C
            step_checkboxes: false,
        }
    }
}

impl SheetLayout {
    /// Fails when the column is not a letter or the block would run past
    /// [`LAST_READ_COLUMN`], where written values could no longer be read back.
    pub fn new(status_column: &str, step_checkboxes: bool) -> Result<Self, SheetError> {
        let index = column_index(status_column)
            .ok_or_else(|| SheetError::InvalidColumn(status_column.to_string()))?;
        let layout = Self {
            status_column: index,
            step_checkboxes,
        };
        if index + layout.width() - 1 > LAST_READ_COLUMN {
            return Err(SheetError::BlockPastLastColumn {
                column: status_column.trim().to_ascii_uppercase(),
                last: column_letters(LAST_READ_COLUMN),
            });
        }
        Ok(layout)
    }

    pub fn width(&self) -> usize {
        if self.step_checkboxes {
            7
        } else {
            4
        }
    }

    /// A1 range of one row's block, e.g. `C5:F5`.
    pub fn range(&self, row: usize) -> String {
        let first = column_letters(self.status_column);
        let last = column_letters(self.status_column + self.width() - 1);
        format!("{first}{row}:{last}{row}")
    }

    pub fn row_values(&self, row: &Row) -> Vec<Value> {
        let id_cell = |id: Option<u64>| id.map(Value::from).unwrap_or_else(|| Value::from(""));

        let mut values = vec![
            Value::from(row.status.label()),
            id_cell(row.subscription_id.map(|id| id.0)),
            id_cell(row.feed_id.map(|id| id.0)),
            Value::from(row.details.as_str()),
        ];

        if self.step_checkboxes {
            let subscribed = match row.status {
                Status::Subscribed | Status::BacklogUnread | Status::SuffixAdded => true,
                Status::Error => row.subscription_id.is_some(),
                Status::New | Status::MultipleChoices | Status::NotFound => false,
            };
            values.push(Value::Bool(subscribed));
            let backlog_unread = match row.status {
                Status::BacklogUnread | Status::SuffixAdded => true,
                // Only the rename was left when the row failed
                Status::Error => row.failed_step() == Some(Step::AddSuffix),
                _ => false,
            };
            values.push(Value::Bool(backlog_unread));
            values.push(Value::Bool(row.status == Status::SuffixAdded));
        }

        values
    }
}

// ============================================================================
// A1 notation
// ============================================================================

/// `A` -> 0, `Z` -> 25, `AA` -> 26.
pub fn column_index(letters: &str) -> Option<usize> {
    let letters = letters.trim();
    if letters.is_empty() || letters.len() > 3 {
        return None;
    }
    letters.chars().try_fold(0usize, |acc, c| {
        c.is_ascii_alphabetic()
            .then(|| acc * 26 + (c.to_ascii_uppercase() as usize - 'A' as usize + 1))
    })
    .map(|n| n - 1)
}

/// Inverse of [`column_index`].
pub fn column_letters(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}

/// Zero-based (column, row) of a cell reference like `C5`.
pub fn parse_cell(reference: &str) -> Option<(usize, usize)> {
    let split = reference.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = reference.split_at(split);
    let row: usize = digits.parse().ok()?;
    Some((column_index(letters)?, row.checked_sub(1)?))
}
