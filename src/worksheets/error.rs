use thiserror::Error;

pub type WorksheetResult<T> = Result<T, WorksheetError>;

#[derive(Error, Debug)]
pub enum WorksheetError {
    #[error("unsupported operation: \"{0}\"")]
    UnsupportedOperation(String),
    #[error("no attachment found")]
    NoAttachment,
    #[error("integer must be positive")]
    NonPositiveQuestions,
    #[error("at most {0} questions fit on a worksheet")]
    TooManyQuestions(usize),
    #[error("submission is not valid UTF-8: {0}")]
    Decode(#[from] std::str::Utf8Error),
    #[error("no questions found to grade")]
    NothingToGrade,
    #[error("hour {0} is not a valid time of day")]
    InvalidHour(u32),
    #[error("failed to write answer key: {0}")]
    Archive(#[from] std::io::Error),
}
