// src/loader.rs

use crate::error::{LoadError, MalformedRecordError};
use crate::model::*;
use chrono::NaiveDate;
use indicatif::ProgressBar;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::Read;
use std::ops::RangeInclusive;
use std::path::Path;
use tracing::{debug, info, warn};

pub const COL_TITLE: &str = "Title";
pub const COL_TITLE_TYPE: &str = "Title Type";
pub const COL_YOUR_RATING: &str = "Your Rating";
pub const COL_IMDB_RATING: &str = "IMDb Rating";
pub const COL_DATE_RATED: &str = "Date Rated";
pub const COL_YEAR: &str = "Year";
pub const COL_RUNTIME: &str = "Runtime (mins)";
pub const COL_GENRES: &str = "Genres";
pub const COL_DIRECTORS: &str = "Directors";

const DATE_FORMAT: &str = "%Y-%m-%d";
const RELEASE_YEARS: RangeInclusive<i32> = 1850..=9999;

/// One data row, or the reason it could not be decoded from the CSV.
pub type RowResult = Result<RawRow, MalformedRecordError>;

/// Valid records plus the rows that were skipped, in input order.
#[derive(Debug, Default)]
pub struct LoadOutcome {
    pub records: Vec<RatingRecord>,
    pub rejected: Vec<MalformedRecordError>,
}

pub fn open_rows(path: &Path) -> Result<Vec<RowResult>, LoadError> {
    let file = File::open(path).map_err(|source| LoadError::Open { path: path.to_path_buf(), source })?;
    info!("Reading ratings from {}", path.display());
    read_rows(file)
}

/// Read every data row. A row that cannot be decoded (bad UTF-8, broken
/// quoting) becomes an `Err` entry in place; only I/O and header failures
/// abort the read.
pub fn read_rows<R: Read>(reader: R) -> Result<Vec<RowResult>, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = reader.headers()?.clone();

    let mut rows = Vec::new();
    for (row, result) in reader.deserialize::<RawRow>().enumerate() {
        match result {
            Ok(raw) => rows.push(Ok(raw)),
            Err(e) if matches!(e.kind(), csv::ErrorKind::Io(_)) => return Err(e.into()),
            Err(e) => rows.push(Err(undecodable(row, &headers, &e))),
        }
    }
    debug!("Read {} raw rows", rows.len());
    Ok(rows)
}

fn undecodable(row: usize, headers: &csv::StringRecord, err: &csv::Error) -> MalformedRecordError {
    let column = match err.kind() {
        csv::ErrorKind::Utf8 { err, .. } => Some(err.field()),
        csv::ErrorKind::Deserialize { err, .. } => err.field().map(|i| i as usize),
        _ => None,
    };
    let field = column.and_then(|i| headers.get(i)).unwrap_or("record");
    MalformedRecordError { row, field: field.to_string(), problem: format!("could not be decoded: {err}") }
}

/// Convert raw rows into records. Bad rows are skipped and reported, never fatal.
pub fn load_records(rows: Vec<RowResult>) -> LoadOutcome {
    let bar = ProgressBar::new(rows.len() as u64);
    bar.set_message("Loading ratings");

    let mut outcome = LoadOutcome::default();
    for (row, raw) in rows.into_iter().enumerate() {
        match raw.and_then(|raw| parse_record(row, &raw)) {
            Ok(record) => outcome.records.push(record),
            Err(e) => {
                warn!("Skipping {}", e);
                outcome.rejected.push(e);
            }
        }
        bar.inc(1);
    }
    bar.finish_and_clear();

    info!("Loaded {} ratings, rejected {} rows", outcome.records.len(), outcome.rejected.len());
    outcome
}

fn cell<'a>(raw: &'a RawRow, field: &str) -> Option<&'a str> {
    raw.get(field).map(|v| v.trim()).filter(|v| !v.is_empty())
}

fn required<'a>(row: usize, raw: &'a RawRow, field: &str) -> Result<&'a str, MalformedRecordError> {
    cell(raw, field).ok_or_else(|| MalformedRecordError::missing(row, field))
}

pub fn parse_record(row: usize, raw: &RawRow) -> Result<RatingRecord, MalformedRecordError> {
    let rating_text = required(row, raw, COL_YOUR_RATING)?;
    let user_rating = rating_text
        .parse::<u8>()
        .ok()
        .filter(|r| (1..=10).contains(r))
        .ok_or_else(|| MalformedRecordError::invalid(row, COL_YOUR_RATING, rating_text, "an integer 1-10"))?;

    let date_text = required(row, raw, COL_DATE_RATED)?;
    let rated_at = NaiveDate::parse_from_str(date_text, DATE_FORMAT)
        .map_err(|_| MalformedRecordError::invalid(row, COL_DATE_RATED, date_text, "a YYYY-MM-DD date"))?;

    let title = required(row, raw, COL_TITLE)?.to_string();

    let year_text = required(row, raw, COL_YEAR)?;
    let release_year = year_text
        .parse::<i32>()
        .ok()
        .filter(|y| RELEASE_YEARS.contains(y))
        .ok_or_else(|| MalformedRecordError::invalid(row, COL_YEAR, year_text, "a year 1850-9999"))?;

    let reference_rating = match cell(raw, COL_IMDB_RATING) {
        Some(text) => Some(
            text.parse::<f64>()
                .ok()
                .filter(|r| (0.0..=10.0).contains(r))
                .ok_or_else(|| MalformedRecordError::invalid(row, COL_IMDB_RATING, text, "a number 0-10"))?,
        ),
        None => None,
    };

    let runtime_minutes = match cell(raw, COL_RUNTIME) {
        Some(text) => Some(
            text.parse::<u32>()
                .map_err(|_| MalformedRecordError::invalid(row, COL_RUNTIME, text, "whole minutes"))?,
        ),
        None => None,
    };

    let content_type = ContentType::from_label(cell(raw, COL_TITLE_TYPE).unwrap_or(""));

    let genres: BTreeSet<String> = split_list(cell(raw, COL_GENRES)).collect();

    let mut directors: Vec<String> = Vec::new();
    for director in split_list(cell(raw, COL_DIRECTORS)) {
        if !directors.contains(&director) {
            directors.push(director);
        }
    }

    Ok(RatingRecord {
        title,
        content_type,
        user_rating,
        reference_rating,
        rated_at,
        release_year,
        runtime_minutes,
        genres,
        directors,
    })
}

fn split_list(text: Option<&str>) -> impl Iterator<Item = String> + '_ {
    text.unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}
