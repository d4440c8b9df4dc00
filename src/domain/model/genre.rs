use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::error::DomainError;

/// 書籍のジャンル。閉じた集合で、wire上は表示名の文字列。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Genre {
    Fiction,
    #[serde(rename = "Non-Fiction")]
    NonFiction,
    Mystery,
    Romance,
    #[serde(rename = "Science Fiction")]
    ScienceFiction,
    Fantasy,
    Biography,
    History,
    #[serde(rename = "Self-Help")]
    SelfHelp,
    #[serde(rename = "Classic Literature")]
    ClassicLiterature,
    #[serde(rename = "Dystopian Fiction")]
    DystopianFiction,
    #[serde(rename = "Coming-of-age")]
    ComingOfAge,
    Adventure,
    Thriller,
    Horror,
    Poetry,
    Drama,
    Comedy,
}

impl Genre {
    pub const ALL: [Genre; 18] = [
        Genre::Fiction,
        Genre::NonFiction,
        Genre::Mystery,
        Genre::Romance,
        Genre::ScienceFiction,
        Genre::Fantasy,
        Genre::Biography,
        Genre::History,
        Genre::SelfHelp,
        Genre::ClassicLiterature,
        Genre::DystopianFiction,
        Genre::ComingOfAge,
        Genre::Adventure,
        Genre::Thriller,
        Genre::Horror,
        Genre::Poetry,
        Genre::Drama,
        Genre::Comedy,
    ];

    /// 表示名（wire format と同じ）
    pub fn label(&self) -> &'static str {
        match self {
            Genre::Fiction => "Fiction",
            Genre::NonFiction => "Non-Fiction",
            Genre::Mystery => "Mystery",
            Genre::Romance => "Romance",
            Genre::ScienceFiction => "Science Fiction",
            Genre::Fantasy => "Fantasy",
            Genre::Biography => "Biography",
            Genre::History => "History",
            Genre::SelfHelp => "Self-Help",
            Genre::ClassicLiterature => "Classic Literature",
            Genre::DystopianFiction => "Dystopian Fiction",
            Genre::ComingOfAge => "Coming-of-age",
            Genre::Adventure => "Adventure",
            Genre::Thriller => "Thriller",
            Genre::Horror => "Horror",
            Genre::Poetry => "Poetry",
            Genre::Drama => "Drama",
            Genre::Comedy => "Comedy",
        }
    }
}

impl fmt::Display for Genre {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 表示名との大文字小文字を無視した一致で解決する。
impl FromStr for Genre {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Genre::ALL
            .iter()
            .copied()
            .find(|g| g.label().eq_ignore_ascii_case(needle))
            .ok_or_else(|| DomainError::UnknownGenre(s.to_string()))
    }
}

/// 貸出状態。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    Available,
    Issued,
}

impl Status {
    pub fn label(&self) -> &'static str {
        match self {
            Status::Available => "Available",
            Status::Issued => "Issued",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Status {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "available" => Ok(Status::Available),
            "issued" => Ok(Status::Issued),
            _ => Err(DomainError::UnknownStatus(s.to_string())),
        }
    }
}
