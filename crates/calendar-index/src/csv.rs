//! Google Calendar style CSV import and export.
//!
//! The layout follows the columns Google Calendar accepts for import:
//!
//! ```text
//! Subject,Start Date,Start Time,End Date,End Time,All Day Event,Description,Location,Private
//! Standup,01/06/2025,09:00 AM,01/06/2025,09:15 AM,False,Daily sync,Room 4,False
//! ```
//!
//! Only `Subject` and `Start Date` are required; columns may appear in any
//! order and are matched case-insensitively. Dates are `MM/DD/YYYY` and times
//! are `hh:mm AM/PM` (24-hour `HH:MM` is accepted on import). Times carry
//! seconds, and fractions of a second, only when they are non-zero.
//! Wall-clock values are read and written in the timezone passed by the caller.
//!
//! # Row rules
//!
//! - **All-day rows** (flag set with a blank start time, or both times blank)
//!   span from local midnight on the start date to local midnight after the
//!   end date. The exported end date is inclusive, so a zero-length all-day
//!   event is written with the day before its start.
//! - **Timed rows** default the end date to the start date, and a blank end
//!   time to one hour after the start. A flagged row with a start time keeps
//!   its times; export uses this for all-day events not bounded by midnight.
//! - `Private = True` produces a non-public event.
//! - Quoted text fields are kept exactly as written. Unquoted fields are trimmed.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{CalendarError, Result};
use crate::event::Event;
use crate::store::EventStore;
use crate::time::local_to_utc;

const HEADER: [&str; 9] = [
    "Subject",
    "Start Date",
    "Start Time",
    "End Date",
    "End Time",
    "All Day Event",
    "Description",
    "Location",
    "Private",
];

const DATE_FORMAT: &str = "%m/%d/%Y";
const TIME_FORMAT: &str = "%I:%M %p";
const TIME_FORMAT_SECONDS: &str = "%I:%M:%S %p";
const TIME_FORMAT_FRACTION: &str = "%I:%M:%S%.f %p";

/// Outcome of [`import`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    /// Rows that produced an event accepted by the store.
    pub imported: usize,
    /// Data rows seen, excluding the header and blank lines.
    pub total: usize,
    pub skipped: Vec<SkippedRow>,
}

/// A data row that was not imported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRow {
    /// 1-based line on which the record starts.
    pub line: usize,
    pub reason: String,
}

/// Import every well-formed row of `text` into `store`.
///
/// Bad rows and events the store rejects are recorded in
/// [`ImportReport::skipped`]; the rest of the file is still imported.
///
/// # Errors
/// Returns `CalendarError::Csv` if the header is missing or lacks a required
/// column, or if a quoted field is never closed.
pub fn import(text: &str, tz: Tz, store: &mut EventStore) -> Result<ImportReport> {
    let (columns, rows) = read_table(text)?;
    let mut report = ImportReport::default();

    for (line, record) in rows {
        report.total += 1;
        let outcome = columns
            .event_from(&record, tz)
            .map_err(|reason| CalendarError::Csv { line, message: reason })
            .and_then(|event| store.try_insert(event));
        match outcome {
            Ok(()) => report.imported += 1,
            Err(err) => {
                warn!(line, error = %err, "skipping CSV row");
                report.skipped.push(SkippedRow {
                    line,
                    reason: err.to_string(),
                });
            }
        }
    }

    Ok(report)
}

/// Parse every row of `text` into events, failing on the first bad row.
///
/// # Errors
/// Returns `CalendarError::Csv` for a malformed header or row, or for a row
/// that describes an invalid event.
pub fn parse(text: &str, tz: Tz) -> Result<Vec<Event>> {
    let (columns, rows) = read_table(text)?;
    rows.into_iter()
        .map(|(line, record)| {
            let event = columns
                .event_from(&record, tz)
                .map_err(|message| CalendarError::Csv { line, message })?;
            event.validate().map_err(|err| CalendarError::Csv {
                line,
                message: err.to_string(),
            })?;
            Ok(event)
        })
        .collect()
}

/// Render events as CSV, header first, in the order given.
pub fn export<'a>(events: impl IntoIterator<Item = &'a Event>, tz: Tz) -> String {
    let mut out = HEADER.join(",");
    out.push('\n');

    for event in events {
        let start = event.start().with_timezone(&tz);
        let end = event.end().with_timezone(&tz);

        let whole_days =
            event.is_all_day() && start.time() == NaiveTime::MIN && end.time() == NaiveTime::MIN;
        let (start_time, end_date, end_time) = if whole_days {
            let last_day = end.date_naive();
            (String::new(), last_day.pred_opt().unwrap_or(last_day), String::new())
        } else {
            (format_time(start.time()), end.date_naive(), format_time(end.time()))
        };

        let row = [
            escape(event.subject()),
            start.format(DATE_FORMAT).to_string(),
            start_time,
            end_date.format(DATE_FORMAT).to_string(),
            end_time,
            format_bool(event.is_all_day()).to_string(),
            event.description().map(escape).unwrap_or_default(),
            event.location().map(escape).unwrap_or_default(),
            format_bool(!event.is_public()).to_string(),
        ];
        out.push_str(&row.join(","));
        out.push('\n');
    }

    out
}

/// Column positions resolved from the header row.
#[derive(Debug)]
struct Columns {
    subject: usize,
    start_date: usize,
    start_time: Option<usize>,
    end_date: Option<usize>,
    end_time: Option<usize>,
    all_day: Option<usize>,
    description: Option<usize>,
    location: Option<usize>,
    private: Option<usize>,
}

impl Columns {
    fn from_header(header: &[Field], line: usize) -> Result<Self> {
        let find = |name: &str| {
            header
                .iter()
                .position(|column| column.text.trim().eq_ignore_ascii_case(name))
        };
        let require = |name: &str| {
            find(name).ok_or_else(|| CalendarError::Csv {
                line,
                message: format!("missing required column '{}'", name),
            })
        };

        Ok(Self {
            subject: require("Subject")?,
            start_date: require("Start Date")?,
            start_time: find("Start Time"),
            end_date: find("End Date"),
            end_time: find("End Time"),
            all_day: find("All Day Event"),
            description: find("Description"),
            location: find("Location"),
            private: find("Private"),
        })
    }

    fn event_from(&self, record: &[Field], tz: Tz) -> std::result::Result<Event, String> {
        let subject = text_cell(record, Some(self.subject)).ok_or("Subject is empty")?;
        let start_date = parse_date(cell(record, Some(self.start_date)).ok_or("Start Date is empty")?)?;
        let start_time = cell(record, self.start_time).map(parse_time).transpose()?;
        let end_date = cell(record, self.end_date).map(parse_date).transpose()?;
        let end_time = cell(record, self.end_time).map(parse_time).transpose()?;
        let flagged_all_day = cell(record, self.all_day).map(parse_bool).transpose()?;
        let private = cell(record, self.private).map(parse_bool).transpose()?;

        let is_all_day =
            flagged_all_day.unwrap_or(false) || (start_time.is_none() && end_time.is_none());

        let (start, end) = match start_time {
            None if is_all_day => {
                let last_day = end_date.unwrap_or(start_date);
                let day_after = last_day
                    .succ_opt()
                    .ok_or_else(|| format!("End Date {} is out of range", last_day))?;
                (
                    to_utc(start_date, NaiveTime::MIN, tz)?,
                    to_utc(day_after, NaiveTime::MIN, tz)?,
                )
            }
            None => return Err("Start Time is required for a timed event".to_string()),
            Some(start_time) => {
                let start = to_utc(start_date, start_time, tz)?;
                let end = match end_time {
                    Some(end_time) => to_utc(end_date.unwrap_or(start_date), end_time, tz)?,
                    None => start + Duration::hours(1),
                };
                (start, end)
            }
        };

        let mut event = Event::new(subject, start, end)
            .with_all_day(is_all_day)
            .with_public(!private.unwrap_or(false));
        if let Some(description) = text_cell(record, self.description) {
            event = event.with_description(description);
        }
        if let Some(location) = text_cell(record, self.location) {
            event = event.with_location(location);
        }
        Ok(event)
    }
}

/// One parsed field. `quoted` is set when the field opened with a quote.
#[derive(Debug, Default)]
struct Field {
    text: String,
    quoted: bool,
}

type Record = (usize, Vec<Field>);

/// Split `text` into the resolved header and the non-blank data records.
fn read_table(text: &str) -> Result<(Columns, Vec<Record>)> {
    let mut records = split_records(text)?.into_iter();
    let Some((line, header)) = records.next() else {
        return Err(CalendarError::Csv {
            line: 1,
            message: "missing header row".to_string(),
        });
    };
    let columns = Columns::from_header(&header, line)?;
    Ok((columns, records.collect()))
}

/// RFC 4180 record splitter. Blank lines are dropped; each record carries the
/// line it starts on.
fn split_records(text: &str) -> Result<Vec<Record>> {
    let mut records = Vec::new();
    let mut fields = Vec::new();
    let mut field = Field::default();
    let mut in_quotes = false;
    let mut line = 1;
    let mut record_line = 1;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.text.push('"');
                }
                '"' => in_quotes = false,
                '\n' => {
                    line += 1;
                    field.text.push('\n');
                }
                _ => field.text.push(c),
            }
            continue;
        }

        match c {
            '"' if field.text.is_empty() && !field.quoted => {
                in_quotes = true;
                field.quoted = true;
            }
            ',' => fields.push(std::mem::take(&mut field)),
            '\r' => {}
            '\n' => {
                fields.push(std::mem::take(&mut field));
                push_record(&mut records, record_line, std::mem::take(&mut fields));
                line += 1;
                record_line = line;
            }
            _ => field.text.push(c),
        }
    }

    if in_quotes {
        return Err(CalendarError::Csv {
            line: record_line,
            message: "unterminated quoted field".to_string(),
        });
    }
    if !field.text.is_empty() || field.quoted || !fields.is_empty() {
        fields.push(field);
        push_record(&mut records, record_line, fields);
    }

    Ok(records)
}

fn push_record(records: &mut Vec<Record>, line: usize, fields: Vec<Field>) {
    let blank = fields.iter().all(|f| !f.quoted && f.text.trim().is_empty());
    if !blank {
        records.push((line, fields));
    }
}

/// Trimmed, non-empty cell value.
fn cell(record: &[Field], column: Option<usize>) -> Option<&str> {
    column
        .and_then(|i| record.get(i))
        .map(|field| field.text.trim())
        .filter(|value| !value.is_empty())
}

/// Free-text cell: a quoted value is returned verbatim, even when empty.
fn text_cell(record: &[Field], column: Option<usize>) -> Option<&str> {
    let field = column.and_then(|i| record.get(i))?;
    if field.quoted {
        return Some(&field.text);
    }
    Some(field.text.trim()).filter(|value| !value.is_empty())
}

fn parse_date(value: &str) -> std::result::Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .or_else(|_| NaiveDate::parse_from_str(value, "%Y-%m-%d"))
        .map_err(|_| format!("invalid date '{}', expected MM/DD/YYYY", value))
}

fn parse_time(value: &str) -> std::result::Result<NaiveTime, String> {
    [
        TIME_FORMAT,
        TIME_FORMAT_SECONDS,
        TIME_FORMAT_FRACTION,
        "%I:%M%p",
        "%H:%M",
        "%H:%M:%S",
        "%H:%M:%S%.f",
    ]
    .into_iter()
    .find_map(|format| NaiveTime::parse_from_str(value, format).ok())
    .ok_or_else(|| format!("invalid time '{}', expected hh:mm AM/PM", value))
}

fn format_time(time: NaiveTime) -> String {
    let format = if time.nanosecond() != 0 {
        TIME_FORMAT_FRACTION
    } else if time.second() != 0 {
        TIME_FORMAT_SECONDS
    } else {
        TIME_FORMAT
    };
    time.format(format).to_string()
}

fn parse_bool(value: &str) -> std::result::Result<bool, String> {
    if value.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if value.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(format!("invalid boolean '{}', expected True or False", value))
    }
}

fn format_bool(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

fn to_utc(date: NaiveDate, time: NaiveTime, tz: Tz) -> std::result::Result<DateTime<Utc>, String> {
    local_to_utc(date.and_time(time), tz).map_err(|err| err.to_string())
}

/// Quote a field when it is empty or has a delimiter, quote, line break or
/// surrounding whitespace.
fn escape(value: &str) -> String {
    let needs_quotes =
        value.is_empty() || value.contains([',', '"', '\n', '\r']) || value.trim() != value;
    if needs_quotes {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
