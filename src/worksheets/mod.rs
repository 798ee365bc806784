use std::path::Path;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, TimeZone};
use lazy_static::lazy_static;
use rand::Rng;
use regex::Regex;

pub(crate) mod error;
pub(crate) mod operation;
pub(crate) mod scheduler;

pub use error::{WorksheetError, WorksheetResult};
pub use operation::Operation;

const UTF8_BOM: &[u8] = b"\xef\xbb\xbf";
const MARK_WRONG: &str = "❌";

lazy_static! {
    static ref QUESTION_FORMAT: Regex = Regex::new(r"^\s*(?P<x>\d{1,3})\s*(?P<operator>[+\-x÷])\s*(?P<y>\d{1,3})\s*=\s*(?P<answer>-?\d{1,4})?\s*$").unwrap();
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Question {
    pub x: i64,
    pub y: i64,
    pub operation: Operation,
}

impl Question {
    pub fn answer(&self) -> Option<i64> {
        self.operation.apply(self.x, self.y)
    }

    fn prompt(&self) -> String {
        format!("{} {} {} = ", self.x, self.operation.symbol(), self.y)
    }
}

#[derive(Clone, Debug)]
pub struct Worksheet {
    pub operation: Operation,
    pub questions: Vec<Question>,
}

impl Worksheet {
    /// Operands are drawn from 1..=12. Division draws divisor and quotient from 1..=10
    /// so every answer is a whole number.
    pub fn generate<R: Rng + ?Sized>(operation: Operation, count: usize, rng: &mut R) -> Self {
        let questions = (0..count)
            .map(|_| match operation {
                Operation::Div => {
                    let y = rng.gen_range(1..=10);
                    let quotient = rng.gen_range(1..=10);
                    Question { x: y * quotient, y, operation }
                }
                _ => Question { x: rng.gen_range(1..=12), y: rng.gen_range(1..=12), operation },
            })
            .collect();

        Worksheet { operation, questions }
    }

    pub fn blank(&self) -> Vec<u8> {
        self.render(false)
    }

    pub fn answer_key(&self) -> Vec<u8> {
        self.render(true)
    }

    fn render(&self, with_answers: bool) -> Vec<u8> {
        let mut sheet = String::new();
        for question in &self.questions {
            sheet.push_str(&question.prompt());
            if with_answers {
                if let Some(answer) = question.answer() {
                    sheet.push_str(&answer.to_string());
                }
            }
            sheet.push('\n');
        }
        sheet.push_str("\nTime: \n");
        sheet.into_bytes()
    }

    pub fn archive(&self, dir: &Path, filename: &str) -> WorksheetResult<()> {
        std::fs::create_dir_all(dir)?;
        std::fs::write(dir.join(filename), self.answer_key())?;
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct GradedWorksheet {
    pub success: usize,
    pub total: usize,
    pub contents: Vec<u8>,
}

/// Grades a submitted sheet. Lines that don't look like a question are dropped from the
/// output, wrong answers get the expected value appended.
pub fn validate(operation: Option<Operation>, submission: &[u8]) -> WorksheetResult<GradedWorksheet> {
    let submission = submission.strip_prefix(UTF8_BOM).unwrap_or(submission);
    let text = std::str::from_utf8(submission)?;

    let mut graded = String::new();
    let mut success = 0;
    let mut total = 0;
    let mut has_carriage_return: Option<bool> = None;

    for raw_line in text.split('\n') {
        let line = raw_line.strip_suffix('\r').unwrap_or(raw_line);
        let Some(question_found) = QUESTION_FORMAT.captures(line) else {
            continue;
        };

        let Some(line_operation) = operation.or_else(|| Operation::from_symbol(&question_found["operator"])) else {
            continue;
        };
        let (Ok(x), Ok(y)) = (question_found["x"].parse::<i64>(), question_found["y"].parse::<i64>()) else {
            continue;
        };
        let Some(expected) = line_operation.apply(x, y) else {
            continue;
        };
        let response = question_found.name("answer").and_then(|answer| answer.as_str().parse::<i64>().ok());

        let crlf = *has_carriage_return.get_or_insert(raw_line.ends_with('\r'));
        total += 1;

        graded.push_str(line.trim());
        if response == Some(expected) {
            success += 1;
        } else {
            graded.push_str(&format!(" {MARK_WRONG} {expected}"));
        }
        graded.push_str(if crlf { "\r\n" } else { "\n" });
    }

    if total == 0 {
        return Err(WorksheetError::NothingToGrade);
    }

    let line_ending = if has_carriage_return == Some(true) { "\r\n" } else { "\n" };
    graded.push_str(&format!("{line_ending}Results: {success}/{total}{line_ending}"));

    Ok(GradedWorksheet { success, total, contents: graded.into_bytes() })
}

pub const MAX_QUESTIONS: usize = 500;

/// Requested question counts must be positive and fit in one attachment.
pub fn question_count(requested: i64) -> WorksheetResult<usize> {
    if requested <= 0 {
        return Err(WorksheetError::NonPositiveQuestions);
    }
    match usize::try_from(requested) {
        Ok(count) if count <= MAX_QUESTIONS => Ok(count),
        _ => Err(WorksheetError::TooManyQuestions(MAX_QUESTIONS)),
    }
}

pub fn worksheet_filename(date: NaiveDate) -> String {
    date.format("%d-%m-%Y.txt").to_string()
}

pub fn graded_filename(submitted: &str) -> String {
    let stem = Path::new(submitted).file_stem().and_then(|stem| stem.to_str()).unwrap_or("worksheet");
    format!("{stem}-ANSWERS.txt")
}

/// Next occurrence of `hour`:00 in `now`'s offset, today if it hasn't passed yet.
pub fn next_target(now: DateTime<FixedOffset>, hour: u32) -> WorksheetResult<DateTime<FixedOffset>> {
    let naive = now.date_naive().and_hms_opt(hour, 0, 0).ok_or(WorksheetError::InvalidHour(hour))?;
    let target = now.offset().from_local_datetime(&naive).single().ok_or(WorksheetError::InvalidHour(hour))?;

    if now < target {
        Ok(target)
    } else {
        Ok(target + Duration::days(1))
    }
}
