use std::io::{Read, Write};
use std::path::PathBuf;

use anyhow::Context;
use chrono::{Duration, NaiveDate, NaiveDateTime, Weekday};
use uuid::Uuid;

use crate::models::User;
use crate::retention::RETENTION_STEPS;

/// A source of user records for the retention graph.
pub trait UserSource {
    fn load_users(&self) -> anyhow::Result<Vec<User>>;
}

/// Semicolon-delimited, headerless user export with five columns per row:
/// id, signup date, onboarding percentage, application count, accepted
/// application count. Rows with any other field count are skipped, which
/// also drops blank lines.
pub struct CsvExport {
    path: PathBuf,
}

impl CsvExport {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl UserSource for CsvExport {
    fn load_users(&self) -> anyhow::Result<Vec<User>> {
        let file = std::fs::File::open(&self.path)
            .with_context(|| format!("failed to open {}", self.path.display()))?;
        parse_users(file).with_context(|| format!("failed to parse {}", self.path.display()))
    }
}

pub fn parse_users<R: Read>(input: R) -> anyhow::Result<Vec<User>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(false)
        .flexible(true)
        .from_reader(input);

    let mut users = Vec::new();
    for result in reader.records() {
        let record = result?;
        if record.len() != 5 {
            continue;
        }
        users.push(user_from_record(&record)?);
    }

    Ok(users)
}

fn user_from_record(record: &csv::StringRecord) -> anyhow::Result<User> {
    Ok(User {
        id: record[0].to_string(),
        created_at: parse_signup_date(&record[1])?,
        onboarding_percentage: leading_int(&record[2]),
        count_applications: leading_int(&record[3]),
        count_accepted_applications: leading_int(&record[4]),
    })
}

fn parse_signup_date(raw: &str) -> anyhow::Result<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|stamp| stamp.date())
        })
        .with_context(|| format!("unparseable signup date {raw:?}"))
}

/// Integer value of the leading digits of a field, 0 when there are none.
/// The export historically stored indeterminate numbers this way rather
/// than rejecting them.
pub fn leading_int(raw: &str) -> i32 {
    let trimmed = raw.trim_start();
    let (sign, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i32>().map(|n| sign * n).unwrap_or(0)
}

/// Deterministic stand-in for a real export: spreads `count` users evenly
/// across `weeks` consecutive signup weeks and cycles each user through the
/// onboarding step thresholds.
pub struct SampleData {
    count: usize,
    weeks: usize,
}

impl SampleData {
    pub fn new(count: usize, weeks: usize) -> Self {
        Self { count, weeks }
    }
}

impl UserSource for SampleData {
    fn load_users(&self) -> anyhow::Result<Vec<User>> {
        anyhow::ensure!(self.weeks > 0, "sample needs at least one week");
        anyhow::ensure!(
            self.weeks <= 50,
            "sample spans at most 50 weeks, got {}",
            self.weeks
        );
        anyhow::ensure!(
            self.count % self.weeks == 0,
            "{} users do not spread evenly over {} weeks",
            self.count,
            self.weeks
        );

        let first_monday = NaiveDate::from_isoywd_opt(2026, 2, Weekday::Mon)
            .context("invalid sample start week")?;
        let per_week = self.count / self.weeks;

        let mut users = Vec::with_capacity(self.count);
        for i in 0..self.count {
            let week = (i / per_week) as i64;
            let (_, percentage) = RETENTION_STEPS[i % RETENTION_STEPS.len()];
            users.push(User {
                id: Uuid::new_v4().to_string(),
                created_at: first_monday + Duration::weeks(week),
                onboarding_percentage: percentage,
                count_applications: 0,
                count_accepted_applications: 0,
            });
        }

        Ok(users)
    }
}

/// Writes users back out in the export format that `CsvExport` reads.
pub fn write_export<W: Write>(out: W, users: &[User]) -> anyhow::Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b';')
        .has_headers(false)
        .from_writer(out);

    for user in users {
        writer.serialize(user)?;
    }
    writer.flush()?;

    Ok(())
}
