//! Shared test harness for integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use library_mcp::application::cache::{BookCache, CacheConfig};
use library_mcp::domain::model::book::{Book, BookDraft};
use library_mcp::domain::model::genre::{Genre, Status};
use library_mcp::domain::model::id::BookId;
use library_mcp::domain::store::{BookStore, StoreError};
use library_mcp::infra::mock_store::{Latency, MockBookStore};

// =============================================================================
// Cache builders
// =============================================================================

/// レイテンシなしの初期データ入りキャッシュ（未マウント）。
pub fn instant_cache() -> BookCache<MockBookStore> {
    BookCache::new(
        MockBookStore::seeded().with_latency(Latency::none()),
        CacheConfig::default(),
    )
}

/// 参照レイテンシのキャッシュ。`start_paused` のテストで使う。
pub fn reference_cache() -> BookCache<MockBookStore> {
    BookCache::new(MockBookStore::seeded(), CacheConfig::default())
}

pub async fn mounted_cache() -> BookCache<MockBookStore> {
    let cache = instant_cache();
    cache.mount().await;
    cache
}

// =============================================================================
// Drafts
// =============================================================================

pub fn dune() -> BookDraft {
    BookDraft {
        title: "Dune".into(),
        author: "Frank Herbert".into(),
        genre: Genre::ScienceFiction,
        published_year: 1965,
        status: Status::Available,
    }
}

pub fn draft_titled(title: &str) -> BookDraft {
    BookDraft {
        title: title.into(),
        ..dune()
    }
}

pub fn ids(books: &[Book]) -> Vec<u64> {
    books.iter().map(|b| b.id.get()).collect()
}

// =============================================================================
// ScriptedStore — 更新ごとに遅延を指定できるStore
// =============================================================================

/// `update` の呼び出しごとにキューから遅延を取り出してから委譲する。
/// 完了順を発行順と逆にして競合を再現するのに使う。
pub struct ScriptedStore {
    inner: MockBookStore,
    update_delays: Mutex<VecDeque<Duration>>,
}

impl ScriptedStore {
    pub fn new(update_delays: impl IntoIterator<Item = Duration>) -> Self {
        Self {
            inner: MockBookStore::seeded().with_latency(Latency::none()),
            update_delays: Mutex::new(update_delays.into_iter().collect()),
        }
    }

    pub fn snapshot(&self) -> Vec<Book> {
        self.inner.snapshot()
    }
}

#[async_trait]
impl BookStore for ScriptedStore {
    async fn list_all(&self) -> Result<Vec<Book>, StoreError> {
        self.inner.list_all().await
    }

    async fn create(&self, draft: BookDraft) -> Result<Book, StoreError> {
        self.inner.create(draft).await
    }

    async fn update(&self, id: BookId, draft: BookDraft) -> Result<Book, StoreError> {
        let delay = self.update_delays.lock().unwrap().pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.inner.update(id, draft).await
    }

    async fn delete(&self, id: BookId) -> Result<(), StoreError> {
        self.inner.delete(id).await
    }
}

// =============================================================================
// Assertion helpers
// =============================================================================

/// 結果がErrで、メッセージに指定文字列を含むことをassert。
pub fn assert_error_contains<T: std::fmt::Debug>(
    result: Result<T, impl std::fmt::Display>,
    expected: &str,
) {
    match result {
        Err(e) => {
            let msg = e.to_string();
            assert!(
                msg.contains(expected),
                "Expected error containing '{expected}', got: '{msg}'"
            );
        }
        Ok(v) => panic!("Expected error containing '{expected}', got Ok({v:?})"),
    }
}
