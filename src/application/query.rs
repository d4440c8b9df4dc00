use serde::Serialize;

use crate::domain::model::book::Book;
use crate::domain::model::genre::{Genre, Status};

/// 一覧の絞り込み条件。Noneの条件は全件一致。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookFilter {
    /// タイトルまたは著者への部分一致（大文字小文字を無視）
    pub search: Option<String>,
    pub genre: Option<Genre>,
    pub status: Option<Status>,
}

impl BookFilter {
    pub fn matches(&self, book: &Book) -> bool {
        let matches_search = match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(term) => {
                let term = term.to_lowercase();
                book.title.to_lowercase().contains(&term)
                    || book.author.to_lowercase().contains(&term)
            }
        };
        let matches_genre = self.genre.map_or(true, |g| book.genre == g);
        let matches_status = self.status.map_or(true, |s| book.status == s);

        matches_search && matches_genre && matches_status
    }

    /// 順序を保ったまま絞り込む。
    pub fn apply(&self, books: &[Book]) -> Vec<Book> {
        books.iter().filter(|b| self.matches(b)).cloned().collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CatalogStats {
    pub total: usize,
    pub available: usize,
    pub issued: usize,
}

impl CatalogStats {
    pub fn from_books(books: &[Book]) -> Self {
        let available = books.iter().filter(|b| b.is_available()).count();
        Self {
            total: books.len(),
            available,
            issued: books.len() - available,
        }
    }
}

/// コレクションに現れるジャンル（初出順、重複なし）
pub fn distinct_genres(books: &[Book]) -> Vec<Genre> {
    let mut genres = Vec::new();
    for book in books {
        if !genres.contains(&book.genre) {
            genres.push(book.genre);
        }
    }
    genres
}
