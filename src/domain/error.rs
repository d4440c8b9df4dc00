#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    #[error("title is required")]
    EmptyTitle,

    #[error("title must be at most {max} characters (got {len})")]
    TitleTooLong { max: usize, len: usize },

    #[error("author is required")]
    EmptyAuthor,

    #[error("author must be at most {max} characters (got {len})")]
    AuthorTooLong { max: usize, len: usize },

    #[error("published year {year} out of range ({min}-{max})")]
    YearOutOfRange { year: i32, min: i32, max: i32 },

    #[error("unknown genre: '{0}'")]
    UnknownGenre(String),

    #[error("unknown status: '{0}'. Use: Available, Issued")]
    UnknownStatus(String),
}
