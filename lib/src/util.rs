use crate::ArcStr;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer};
use std::{borrow::Cow, fmt, fmt::Write, fs, io, path::Path};

/// The default maximum number of rows rendered.
pub const DEFAULT_MAX_ROWS: usize = 100;

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%m/%d/%Y", "%d/%m/%Y", "%Y/%m/%d"];
const TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Converts a not found error to Ok(false)
pub fn path_exists(path: &Path) -> io::Result<bool> {
    match fs::metadata(path) {
        Ok(_) => Ok(true),
        Err(e) if matches!(e.kind(), io::ErrorKind::NotFound) => Ok(false),
        Err(e) => Err(e),
    }
}

fn is_blank(s: &str) -> bool {
    s.is_empty()
        || s.eq_ignore_ascii_case("null")
        || s.eq_ignore_ascii_case("nan")
        || s.eq_ignore_ascii_case("none")
}

/// Parse a money amount. Anything that isn't a finite number is 0.
pub fn parse_amount(s: &str) -> f64 {
    match s.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => 0.,
    }
}

/// Parse an age in years. Fractional ages are truncated and the result is clamped to `0..=120`.
pub fn parse_age(s: &str) -> u8 {
    let s = s.trim();
    let years = match s.parse::<i64>() {
        Ok(v) => v as f64,
        Err(_) => parse_amount(s),
    };
    years.clamp(0., 120.) as u8
}

/// Parse a calendar date in any of the layouts found in hospital exports. A trailing time part
/// is ignored.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if is_blank(s) {
        return None;
    }
    if let Some(ts) = parse_timestamp_only(s) {
        return Some(ts.date());
    }
    let day = s.split(|c| c == 'T' || c == ' ').next().unwrap_or(s);
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(day, fmt).ok())
}

fn parse_timestamp_only(s: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

/// Parse an ISO-8601 timestamp. A bare date is taken as midnight.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if is_blank(s) {
        return None;
    }
    parse_timestamp_only(s).or_else(|| parse_date(s).and_then(|d| d.and_hms_opt(0, 0, 0)))
}

/// "Yes", "Y", "true" and "1" in any case are `true`, everything else is `false`.
pub fn parse_yes_no(s: &str) -> bool {
    matches!(
        s.trim().to_ascii_lowercase().as_str(),
        "yes" | "y" | "true" | "1"
    )
}

// Helpers for serde to parse fields with quirks. None of these fail: a bad value becomes the
// field's neutral value rather than rejecting the row.

pub fn lenient_f64<'de, D>(d: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(d)?;
    Ok(parse_amount(&s))
}

pub fn lenient_age<'de, D>(d: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(d)?;
    Ok(parse_age(&s))
}

pub fn lenient_date<'de, D>(d: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(d)?;
    Ok(parse_date(&s))
}

pub fn lenient_timestamp<'de, D>(d: D) -> Result<Option<NaiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(d)?;
    Ok(parse_timestamp(&s))
}

/// Parse a string, but map "null" to `None` (in addition to the default "" -> None mapping)
pub fn optional_string<'de, D>(d: D) -> Result<Option<ArcStr>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(d)?;
    let s = s.trim();
    if is_blank(s) {
        Ok(None)
    } else {
        Ok(Some(s.into()))
    }
}

// Rendering tables as HTML, for the web dashboard.

pub struct RowDrawer<'a> {
    cells: &'a mut Vec<String>,
}

impl<'a> RowDrawer<'a> {
    fn cell(&mut self, content: impl fmt::Display) {
        self.cells.push(content.to_string());
    }
}

pub trait RowForDisplay {
    fn draw(&self, drawer: RowDrawer<'_>);
}

impl<D: fmt::Display, const N: usize> RowForDisplay for [D; N] {
    fn draw(&self, mut drawer: RowDrawer<'_>) {
        for cell in self.iter() {
            drawer.cell(cell);
        }
    }
}

/// A table of already-rendered cells that can write itself out as an HTML fragment.
///
/// Long tables are elided in the middle, keeping the first and last `max_rows / 2` rows.
pub struct Table {
    headers: Option<Vec<Cow<'static, str>>>,
    title: Option<Cow<'static, str>>,
    rows: Vec<Vec<String>>,
    /// must be even - enforced by setter.
    max_rows: Option<usize>,
}

impl Table {
    /// Create a new headerless table from row data and a function showing how to map that data
    /// to cells.
    pub fn new<R, DR>(data: impl IntoIterator<Item = R>, row_fn: impl Fn(&R, usize) -> DR) -> Self
    where
        DR: RowForDisplay,
    {
        let rows = data
            .into_iter()
            .enumerate()
            .map(|(idx, row)| {
                let mut cells = Vec::new();
                row_fn(&row, idx).draw(RowDrawer { cells: &mut cells });
                cells
            })
            .collect();
        Table {
            headers: None,
            title: None,
            rows,
            max_rows: None,
        }
    }

    pub fn with_headers(
        mut self,
        headers: impl IntoIterator<Item = impl Into<Cow<'static, str>>>,
    ) -> Self {
        self.headers = Some(headers.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_title(mut self, title: impl Into<Cow<'static, str>>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the maximum number of rows to show
    pub fn set_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = Some(constrain_max_rows(max_rows));
        self
    }

    pub fn to_html(&self) -> String {
        let mut output = String::new();
        if let Some(title) = &self.title {
            output.push_str(r#"<p style="font-weight:bold;font-variant:small-caps;">"#);
            html_escape::encode_text_to_string(title, &mut output);
            output.push_str("</p>");
        }

        output.push_str("<table>");
        if let Some(headers) = &self.headers {
            output.push_str("<thead><tr><th></th>");
            for header in headers {
                output.push_str("<th>");
                html_escape::encode_text_to_string(header, &mut output);
                output.push_str("</th>");
            }
            output.push_str("</tr></thead>");
        }

        output.push_str("<tbody>");
        let len = self.rows.len();
        let max_rows = self.max_rows.unwrap_or(DEFAULT_MAX_ROWS);
        if max_rows == 0 || max_rows >= len {
            self.write_rows(0..len, &mut output);
        } else {
            let window_len = max_rows / 2;
            self.write_rows(0..window_len, &mut output);
            output.push_str("<tr><th>...</th>");
            let cols = self.headers.as_ref().map(|h| h.len()).unwrap_or(0);
            for _ in 0..cols {
                output.push_str("<td>...</td>");
            }
            output.push_str("</tr>");
            self.write_rows(len - window_len..len, &mut output);
        }
        output.push_str("</tbody></table>");
        output
    }

    fn write_rows(&self, idxs: std::ops::Range<usize>, output: &mut String) {
        for idx in idxs {
            let _ = write!(output, "<tr><th>{}</th>", idx);
            for cell in &self.rows[idx] {
                output.push_str("<td>");
                html_escape::encode_text_to_string(cell, output);
                output.push_str("</td>");
            }
            output.push_str("</tr>");
        }
    }
}

fn constrain_max_rows(mut max_rows: usize) -> usize {
    // make sure 0 -> 0, true since we only touch odd numbers
    if max_rows % 2 == 1 {
        if max_rows == 1 {
            max_rows = 2;
        } else {
            max_rows -= 1;
        }
    }
    max_rows
}

pub fn header(header: &str) {
    let len = header.len();
    print!("\n{}\n", header);
    for _ in 0..len {
        print!("=");
    }
    println!("\n")
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn amounts_and_ages_are_lenient() {
        assert_eq!(parse_amount(" 1200.5 "), 1200.5);
        assert_eq!(parse_amount("abc"), 0.);
        assert_eq!(parse_amount("NaN"), 0.);
        assert_eq!(parse_age("45"), 45);
        assert_eq!(parse_age("45.9"), 45);
        assert_eq!(parse_age("-3"), 0);
        assert_eq!(parse_age("250"), 120);
        assert_eq!(parse_age(""), 0);
    }

    #[test]
    fn dates_in_several_layouts() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 25);
        assert_eq!(parse_date("2024-01-25"), expected);
        assert_eq!(parse_date("01/25/2024"), expected);
        assert_eq!(parse_date("25/01/2024"), expected);
        assert_eq!(parse_date("2024/01/25"), expected);
        assert_eq!(parse_date("2024-01-25T10:30:00"), expected);
        assert_eq!(parse_date("2024-01-25 10:30"), expected);
        assert_eq!(parse_date("not a date"), None);
        assert_eq!(parse_date("null"), None);
    }

    #[test]
    fn timestamps_with_and_without_fractions() {
        let ts = parse_timestamp("2024-01-25T10:30:15.250").unwrap();
        assert_eq!(ts.format("%H:%M:%S%.3f").to_string(), "10:30:15.250");
        let ts = parse_timestamp("2024-01-25 08:00:00").unwrap();
        assert_eq!(ts.format("%H:%M").to_string(), "08:00");
        let ts = parse_timestamp("2024-01-25").unwrap();
        assert_eq!(ts.format("%H:%M").to_string(), "00:00");
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn html_table_escapes_and_elides() {
        let table = Table::new(1..=5, |n, _| [n.to_string(), "<b>".to_string()])
            .with_headers(["n", "tag"])
            .with_title("Numbers")
            .set_max_rows(2);
        let html = table.to_html();
        assert!(html.contains("Numbers"));
        assert!(html.contains("&lt;b&gt;"));
        assert!(html.contains("<td>1</td>"));
        assert!(html.contains("<td>5</td>"));
        assert!(!html.contains("<td>3</td>"));
        assert!(html.contains("<td>...</td>"));
    }
}
