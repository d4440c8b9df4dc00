use chrono::Datelike;
use serde::{Deserialize, Serialize};

use super::genre::{Genre, Status};
use super::id::BookId;
use crate::domain::error::DomainError;

pub const TITLE_MAX_CHARS: usize = 200;
pub const AUTHOR_MAX_CHARS: usize = 100;
pub const MIN_PUBLISHED_YEAR: i32 = 1000;

/// ID採番前の書籍データ。create / update の入力。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookDraft {
    pub title: String,
    pub author: String,
    pub genre: Genre,
    pub published_year: i32,
    pub status: Status,
}

impl BookDraft {
    /// 現在の暦年を上限として検証する。
    pub fn validate(&self) -> Result<(), DomainError> {
        self.validate_at(chrono::Local::now().year())
    }

    /// `current_year` を上限として検証する。最初に違反したルールを返す。
    pub fn validate_at(&self, current_year: i32) -> Result<(), DomainError> {
        let title_len = self.title.chars().count();
        if self.title.trim().is_empty() {
            return Err(DomainError::EmptyTitle);
        }
        if title_len > TITLE_MAX_CHARS {
            return Err(DomainError::TitleTooLong {
                max: TITLE_MAX_CHARS,
                len: title_len,
            });
        }

        let author_len = self.author.chars().count();
        if self.author.trim().is_empty() {
            return Err(DomainError::EmptyAuthor);
        }
        if author_len > AUTHOR_MAX_CHARS {
            return Err(DomainError::AuthorTooLong {
                max: AUTHOR_MAX_CHARS,
                len: author_len,
            });
        }

        if !(MIN_PUBLISHED_YEAR..=current_year).contains(&self.published_year) {
            return Err(DomainError::YearOutOfRange {
                year: self.published_year,
                min: MIN_PUBLISHED_YEAR,
                max: current_year,
            });
        }

        Ok(())
    }
}

/// Storeに保存された書籍。`id` は作成時に採番され、以後変わらない。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub author: String,
    pub genre: Genre,
    pub published_year: i32,
    pub status: Status,
}

impl Book {
    pub fn from_draft(id: BookId, draft: BookDraft) -> Self {
        Self {
            id,
            title: draft.title,
            author: draft.author,
            genre: draft.genre,
            published_year: draft.published_year,
            status: draft.status,
        }
    }

    /// id以外のフィールドを取り出す。
    pub fn to_draft(&self) -> BookDraft {
        BookDraft {
            title: self.title.clone(),
            author: self.author.clone(),
            genre: self.genre,
            published_year: self.published_year,
            status: self.status,
        }
    }

    pub fn is_available(&self) -> bool {
        self.status == Status::Available
    }
}
