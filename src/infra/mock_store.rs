use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::model::book::{Book, BookDraft};
use crate::domain::model::genre::{Genre, Status};
use crate::domain::model::id::BookId;
use crate::domain::store::{BookStore, StoreError};

/// Storeの操作種別。レイテンシ・障害注入・呼び出し回数の単位。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    List,
    Create,
    Update,
    Delete,
}

/// 操作ごとの疑似レイテンシ。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Latency {
    pub list: Duration,
    pub create: Duration,
    pub update: Duration,
    pub delete: Duration,
}

impl Latency {
    /// 一覧 1000ms / 作成・更新 800ms / 削除 1000ms
    pub fn reference() -> Self {
        Self {
            list: Duration::from_millis(1000),
            create: Duration::from_millis(800),
            update: Duration::from_millis(800),
            delete: Duration::from_millis(1000),
        }
    }

    pub fn none() -> Self {
        Self::uniform(Duration::ZERO)
    }

    pub fn uniform(d: Duration) -> Self {
        Self {
            list: d,
            create: d,
            update: d,
            delete: d,
        }
    }

    fn of(&self, op: Operation) -> Duration {
        match op {
            Operation::List => self.list,
            Operation::Create => self.create,
            Operation::Update => self.update,
            Operation::Delete => self.delete,
        }
    }
}

impl Default for Latency {
    fn default() -> Self {
        Self::reference()
    }
}

struct Inner {
    books: Vec<Book>,
    next_id: u64,
    offline: bool,
    injected: HashMap<Operation, VecDeque<u16>>,
    calls: HashMap<Operation, usize>,
}

/// インメモリの疑似リモートStore。
/// IDは単調増加カウンタで採番し、削除後も再利用しない。
pub struct MockBookStore {
    inner: Mutex<Inner>,
    latency: Latency,
}

impl MockBookStore {
    pub fn new(books: Vec<Book>) -> Self {
        let next_id = books.iter().map(|b| b.id.get()).max().unwrap_or(0) + 1;
        Self {
            inner: Mutex::new(Inner {
                books,
                next_id,
                offline: false,
                injected: HashMap::new(),
                calls: HashMap::new(),
            }),
            latency: Latency::reference(),
        }
    }

    /// ID 1〜6 の初期データ入りStore。
    pub fn seeded() -> Self {
        Self::new(seed_books())
    }

    pub fn with_latency(mut self, latency: Latency) -> Self {
        self.latency = latency;
        self
    }

    /// 指定操作の次の呼び出しを一度だけ `status` で失敗させる。
    pub fn fail_next(&self, op: Operation, status: u16) {
        self.lock()
            .injected
            .entry(op)
            .or_default()
            .push_back(status);
    }

    /// trueの間、全操作が接続エラー（status なし）で失敗する。
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    pub fn call_count(&self, op: Operation) -> usize {
        self.lock().calls.get(&op).copied().unwrap_or(0)
    }

    /// 内部状態のスナップショット（レイテンシなし）。
    pub fn snapshot(&self) -> Vec<Book> {
        self.lock().books.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 呼び出しを記録し、注入された障害があれば取り出す。
    fn begin(&self, op: Operation) -> Option<StoreError> {
        let mut inner = self.lock();
        *inner.calls.entry(op).or_insert(0) += 1;
        if let Some(status) = inner.injected.get_mut(&op).and_then(|q| q.pop_front()) {
            return Some(StoreError::transport(
                Some(status),
                format!("injected failure on {op:?}"),
            ));
        }
        if inner.offline {
            return Some(StoreError::transport(None, "store is offline"));
        }
        None
    }

    async fn call(&self, op: Operation) -> Result<(), StoreError> {
        let fault = self.begin(op);
        let delay = self.latency.of(op);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match fault {
            Some(err) => {
                tracing::debug!(?op, %err, "mock store call failed");
                Err(err)
            }
            None => Ok(()),
        }
    }
}

impl Default for MockBookStore {
    fn default() -> Self {
        Self::seeded()
    }
}

#[async_trait]
impl BookStore for MockBookStore {
    async fn list_all(&self) -> Result<Vec<Book>, StoreError> {
        self.call(Operation::List).await?;
        Ok(self.lock().books.clone())
    }

    async fn create(&self, draft: BookDraft) -> Result<Book, StoreError> {
        self.call(Operation::Create).await?;
        let mut inner = self.lock();
        let id = BookId::new(inner.next_id);
        inner.next_id += 1;
        let book = Book::from_draft(id, draft);
        inner.books.push(book.clone());
        Ok(book)
    }

    async fn update(&self, id: BookId, draft: BookDraft) -> Result<Book, StoreError> {
        self.call(Operation::Update).await?;
        let mut inner = self.lock();
        let slot = inner
            .books
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or(StoreError::NotFound(id))?;
        *slot = Book::from_draft(id, draft);
        Ok(slot.clone())
    }

    async fn delete(&self, id: BookId) -> Result<(), StoreError> {
        self.call(Operation::Delete).await?;
        let mut inner = self.lock();
        let pos = inner
            .books
            .iter()
            .position(|b| b.id == id)
            .ok_or(StoreError::NotFound(id))?;
        inner.books.remove(pos);
        Ok(())
    }
}

fn seed(
    id: u64,
    title: &str,
    author: &str,
    genre: Genre,
    published_year: i32,
    status: Status,
) -> Book {
    Book {
        id: BookId::new(id),
        title: title.to_string(),
        author: author.to_string(),
        genre,
        published_year,
        status,
    }
}

pub fn seed_books() -> Vec<Book> {
    vec![
        seed(
            1,
            "The Great Gatsby",
            "F. Scott Fitzgerald",
            Genre::ClassicLiterature,
            1925,
            Status::Available,
        ),
        seed(
            2,
            "To Kill a Mockingbird",
            "Harper Lee",
            Genre::Fiction,
            1960,
            Status::Issued,
        ),
        seed(
            3,
            "1984",
            "George Orwell",
            Genre::DystopianFiction,
            1949,
            Status::Available,
        ),
        seed(
            4,
            "Pride and Prejudice",
            "Jane Austen",
            Genre::Romance,
            1813,
            Status::Available,
        ),
        seed(
            5,
            "The Catcher in the Rye",
            "J.D. Salinger",
            Genre::ComingOfAge,
            1951,
            Status::Issued,
        ),
        seed(
            6,
            "Lord of the Flies",
            "William Golding",
            Genre::Adventure,
            1954,
            Status::Available,
        ),
    ]
}
