use csv::{ReaderBuilder, StringRecord, Trim};
use std::error::Error;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

use crate::types::{RatingRecord, PLACEHOLDER_STRENGTH_OF_SCHEDULE};

#[derive(Debug)]
pub enum CsvParseError {
    Io(std::io::Error),
    Csv(csv::Error),
}

impl std::fmt::Display for CsvParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CsvParseError::Io(e) => write!(f, "IO error: {}", e),
            CsvParseError::Csv(e) => write!(f, "CSV error: {}", e),
        }
    }
}

impl Error for CsvParseError {}

impl From<std::io::Error> for CsvParseError {
    fn from(err: std::io::Error) -> CsvParseError {
        CsvParseError::Io(err)
    }
}

impl From<csv::Error> for CsvParseError {
    fn from(err: csv::Error) -> CsvParseError {
        CsvParseError::Csv(err)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedLine {
    pub line: u64,
    pub content: String,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct ParsedRatings {
    pub records: Vec<RatingRecord>,
    pub skipped: Vec<SkippedLine>,
}

pub fn parse_ratings_file(path: &Path, season: i32) -> Result<ParsedRatings, CsvParseError> {
    let file = File::open(path)?;
    parse_ratings(file, season)
}

/// Parses `team_name, overall[, offense[, defense]]` lines after a header row.
///
/// Lines whose numbers don't parse are logged and skipped rather than failing
/// the whole file.
pub fn parse_ratings<R: Read>(reader: R, season: i32) -> Result<ParsedRatings, CsvParseError> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let mut parsed = ParsedRatings::default();

    for result in rdr.records() {
        let record = result?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();

        if record.iter().all(|field| field.is_empty()) {
            continue;
        }

        match parse_rating_line(&record, season) {
            Ok(rating) => {
                debug!("Parsed line {}: {:?}", line, rating);
                parsed.records.push(rating);
            }
            Err(reason) => {
                let content = record.iter().collect::<Vec<_>>().join(",");
                warn!("Skipping invalid line {} ({}): {}", line, reason, content);
                parsed.skipped.push(SkippedLine {
                    line,
                    content,
                    reason,
                });
            }
        }
    }

    Ok(parsed)
}

fn parse_rating_line(record: &StringRecord, season: i32) -> Result<RatingRecord, String> {
    if record.len() < 2 {
        return Err("expected at least team name and overall rating".to_string());
    }

    let team_name = record.get(0).unwrap_or_default();
    if team_name.is_empty() {
        return Err("empty team name".to_string());
    }

    let overall = record.get(1).unwrap_or_default();
    let power_rating = overall
        .parse::<f64>()
        .map_err(|_| format!("invalid overall rating '{}'", overall))?;

    Ok(RatingRecord {
        team_name: team_name.to_string(),
        power_rating,
        offense_rating: optional_rating(record, 2, "offense")?,
        defense_rating: optional_rating(record, 3, "defense")?,
        strength_of_schedule: PLACEHOLDER_STRENGTH_OF_SCHEDULE,
        season,
    })
}

fn optional_rating(record: &StringRecord, index: usize, label: &str) -> Result<f64, String> {
    match record.get(index) {
        Some(value) if !value.is_empty() => value
            .parse::<f64>()
            .map_err(|_| format!("invalid {} rating '{}'", label, value)),
        _ => Ok(0.0),
    }
}
