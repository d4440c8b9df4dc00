//! Plain-text rendering of the catalogue for tool output.

use crate::application::cache::CacheView;
use crate::application::query::{distinct_genres, BookFilter, CatalogStats};
use crate::domain::model::book::Book;

/// 1冊を1行で表す。`[id] title — author (genre, year) · status`
pub fn render_book_line(book: &Book) -> String {
    format!(
        "[{}] {} — {} ({}, {}) · {}",
        book.id, book.title, book.author, book.genre, book.published_year, book.status
    )
}

/// キャッシュの状態と絞り込み条件から一覧を描画する。
pub fn render_catalog(view: &CacheView, filter: &BookFilter) -> String {
    if view.is_loading {
        return "Loading books...".to_string();
    }
    if let Some(reason) = &view.error {
        return format!("Failed to load books: {reason}\nUse `refresh` to try again.");
    }

    let stats = CatalogStats::from_books(&view.books);
    let mut out = format!(
        "# Library ({} books: {} available, {} issued)\n",
        stats.total, stats.available, stats.issued
    );

    let shown = filter.apply(&view.books);
    if shown.is_empty() {
        out.push_str(if view.books.is_empty() {
            "\nNo books in the library yet. Use `create_book` to add one."
        } else {
            "\nNo books match the current filters."
        });
        return out;
    }

    if shown.len() != view.books.len() {
        out.push_str(&format!(
            "Showing {} of {} books\n",
            shown.len(),
            view.books.len()
        ));
    }
    out.push('\n');
    let lines: Vec<String> = shown.iter().map(render_book_line).collect();
    out.push_str(&lines.join("\n"));
    out
}

pub fn render_stats(books: &[Book]) -> String {
    let stats = CatalogStats::from_books(books);
    let genres: Vec<&str> = distinct_genres(books).iter().map(|g| g.label()).collect();
    format!(
        "Total: {}\nAvailable: {}\nIssued: {}\nGenres: {}",
        stats.total,
        stats.available,
        stats.issued,
        if genres.is_empty() {
            "(none)".to_string()
        } else {
            genres.join(", ")
        }
    )
}
