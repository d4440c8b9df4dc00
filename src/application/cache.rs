//! Client-side fetch cache over a [`BookStore`].
//!
//! The cache owns the collection the presentation layer renders. Fetches are
//! deduplicated; mutations go to the store first and, once the store call
//! succeeds, patch the cached collection in place without a refetch.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::domain::model::book::{Book, BookDraft};
use crate::domain::model::id::BookId;
use crate::domain::store::{BookStore, StoreError};

use super::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// この間隔内に開始されたfetchへの再要求は1回のStore呼び出しにまとめる
    pub dedup_interval: Duration,
    pub revalidate_on_focus: bool,
    pub revalidate_on_reconnect: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dedup_interval: Duration::from_secs(60),
            revalidate_on_focus: false,
            revalidate_on_reconnect: true,
        }
    }
}

/// コレクションの読み込み状態。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Uninitialized,
    Loading,
    Ready(Vec<Book>),
    Failed(String),
}

/// 表示層に渡すスナップショット。Ready以外では `books` は空。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheView {
    pub books: Vec<Book>,
    pub is_loading: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    Loading,
    Loaded { count: usize },
    LoadFailed { reason: String },
    Created(Book),
    Updated(Book),
    Deleted(BookId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchMode {
    /// dedup window内の直近fetchを再利用する
    Dedup,
    /// windowを無視する。要求後に完了したfetchにのみ合流する
    Force,
}

struct CacheState {
    load: LoadState,
    /// 成功したfetchの開始時刻
    last_fetch_started: Option<Instant>,
    /// 完了したfetchの通し番号（成功・失敗とも）
    completed_fetches: u64,
}

pub struct BookCache<S> {
    store: S,
    config: CacheConfig,
    state: RwLock<CacheState>,
    fetch_gate: tokio::sync::Mutex<()>,
    id_locks: Mutex<HashMap<BookId, Arc<tokio::sync::Mutex<()>>>>,
    /// 直近のStore呼び出しが接続エラーで終わったか
    disconnected: AtomicBool,
    events: broadcast::Sender<CacheEvent>,
}

/// fetch途中で破棄された場合にLoadingを直前の状態へ戻す。
struct LoadingGuard<'a> {
    state: &'a RwLock<CacheState>,
    previous: Option<LoadState>,
}

impl LoadingGuard<'_> {
    fn disarm(mut self) {
        self.previous = None;
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
            if matches!(state.load, LoadState::Loading) {
                debug!("fetch cancelled, restoring previous state");
                state.load = previous;
            }
        }
    }
}

impl<S: BookStore> BookCache<S> {
    pub fn new(store: S, config: CacheConfig) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            store,
            config,
            state: RwLock::new(CacheState {
                load: LoadState::Uninitialized,
                last_fetch_started: None,
                completed_fetches: 0,
            }),
            fetch_gate: tokio::sync::Mutex::new(()),
            id_locks: Mutex::new(HashMap::new()),
            disconnected: AtomicBool::new(false),
            events,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> LoadState {
        self.read().load.clone()
    }

    pub fn view(&self) -> CacheView {
        match &self.read().load {
            LoadState::Uninitialized => CacheView::default(),
            LoadState::Loading => CacheView {
                is_loading: true,
                ..CacheView::default()
            },
            LoadState::Ready(books) => CacheView {
                books: books.clone(),
                ..CacheView::default()
            },
            LoadState::Failed(reason) => CacheView {
                error: Some(reason.clone()),
                ..CacheView::default()
            },
        }
    }

    pub fn books(&self) -> Vec<Book> {
        self.view().books
    }

    /// 初回マウント時の読み込み。Uninitialized以外では何もしない。
    /// 失敗はFailed状態になり、エラーとしては返さない。
    pub async fn mount(&self) -> CacheView {
        let uninitialized = matches!(self.read().load, LoadState::Uninitialized);
        if uninitialized {
            let _ = self.fetch(FetchMode::Dedup).await;
        }
        self.view()
    }

    /// 読み取り系の入口。未取得なら読み込み、それ以外はdedup付きで再検証する。
    pub async fn load(&self) -> CacheView {
        let uninitialized = matches!(self.read().load, LoadState::Uninitialized);
        if uninitialized {
            return self.mount().await;
        }
        self.revalidate().await
    }

    /// dedup付きの再検証。
    pub async fn revalidate(&self) -> CacheView {
        let _ = self.fetch(FetchMode::Dedup).await;
        self.view()
    }

    /// ユーザー操作による再取得。dedup windowを無視し、失敗は呼び出し側へ返す。
    pub async fn refresh(&self) -> Result<Vec<Book>, AppError> {
        self.fetch(FetchMode::Force).await
    }

    pub async fn on_focus(&self) -> CacheView {
        if self.config.revalidate_on_focus {
            let _ = self.fetch(FetchMode::Dedup).await;
        }
        self.view()
    }

    pub async fn on_reconnect(&self) -> CacheView {
        if self.config.revalidate_on_reconnect {
            info!("connection regained, revalidating books");
            let _ = self.fetch(FetchMode::Force).await;
        }
        self.view()
    }

    /// Storeに作成し、成功したらキャッシュ末尾に追加する。
    pub async fn create(&self, draft: BookDraft) -> Result<Book, AppError> {
        draft.validate()?;
        let result = self.store.create(draft).await;
        let reconnected = self.track(&result);
        let book = result.inspect_err(|e| {
            warn!(error = %e, "create failed, cache unchanged");
        })?;

        let patched = self.patch(|books| books.push(book.clone()));
        debug!(id = %book.id, patched, "book created");
        self.emit(CacheEvent::Created(book.clone()));
        if reconnected {
            self.on_reconnect().await;
        }
        Ok(book)
    }

    /// Storeを更新し、成功したら同じidのエントリを置き換える（順序維持）。
    /// 同一idへの変更はFIFOで直列化される。
    pub async fn update(&self, id: BookId, draft: BookDraft) -> Result<Book, AppError> {
        draft.validate()?;
        let lock = self.id_lock(id);
        let guard = lock.lock().await;

        let result = self.store.update(id, draft).await;
        let reconnected = self.track(&result);
        if let Ok(book) = &result {
            let patched = self.patch(|books| {
                if let Some(slot) = books.iter_mut().find(|b| b.id == id) {
                    *slot = book.clone();
                }
            });
            debug!(%id, patched, "book updated");
            self.emit(CacheEvent::Updated(book.clone()));
        }
        // パッチ適用後に解放し、同一idの次の変更はその後に反映される
        drop(guard);
        self.release_id_lock(id, lock);

        let book = result.inspect_err(|e| {
            warn!(%id, error = %e, "update failed, cache unchanged");
        })?;
        if reconnected {
            self.on_reconnect().await;
        }
        Ok(book)
    }

    /// Storeから削除し、成功したら同じidのエントリを除去する。
    pub async fn delete(&self, id: BookId) -> Result<(), AppError> {
        let lock = self.id_lock(id);
        let guard = lock.lock().await;

        let result = self.store.delete(id).await;
        let reconnected = self.track(&result);
        if result.is_ok() {
            let patched = self.patch(|books| books.retain(|b| b.id != id));
            debug!(%id, patched, "book deleted");
            self.emit(CacheEvent::Deleted(id));
        }
        drop(guard);
        self.release_id_lock(id, lock);

        result.inspect_err(|e| {
            warn!(%id, error = %e, "delete failed, cache unchanged");
        })?;
        if reconnected {
            self.on_reconnect().await;
        }
        Ok(())
    }

    // --- private ---

    async fn fetch(&self, mode: FetchMode) -> Result<Vec<Book>, AppError> {
        let seen = self.read().completed_fetches;
        let _gate = self.fetch_gate.lock().await;

        if let Some(outcome) = self.reusable(mode, seen) {
            debug!(?mode, "fetch deduplicated");
            return outcome;
        }

        let started = Instant::now();
        let mut loading = LoadingGuard {
            state: &self.state,
            previous: None,
        };
        {
            let mut state = self.write();
            // 既存データがある再検証中は表示を維持する
            if !matches!(state.load, LoadState::Ready(_)) {
                loading.previous = Some(std::mem::replace(&mut state.load, LoadState::Loading));
                drop(state);
                self.emit(CacheEvent::Loading);
            }
        }

        debug!(?mode, "fetching books from store");
        let result = self.store.list_all().await;
        loading.disarm();
        if self.track(&result) {
            info!("connection regained");
        }

        let mut state = self.write();
        state.completed_fetches += 1;
        match result {
            Ok(books) => {
                info!(count = books.len(), "books loaded");
                state.load = LoadState::Ready(books.clone());
                state.last_fetch_started = Some(started);
                drop(state);
                self.emit(CacheEvent::Loaded { count: books.len() });
                Ok(books)
            }
            Err(e) => {
                let reason = e.to_string();
                warn!(error = %reason, "failed to load books");
                state.load = LoadState::Failed(reason.clone());
                state.last_fetch_started = None;
                drop(state);
                self.emit(CacheEvent::LoadFailed {
                    reason: reason.clone(),
                });
                Err(AppError::Fetch(reason))
            }
        }
    }

    /// gate取得後に、Store呼び出しを省略できるか判定する。
    fn reusable(&self, mode: FetchMode, seen: u64) -> Option<Result<Vec<Book>, AppError>> {
        let state = self.read();

        // 待機中に別のfetchが完了していればその結果に合流する
        if state.completed_fetches > seen {
            return match &state.load {
                LoadState::Ready(books) => Some(Ok(books.clone())),
                LoadState::Failed(reason) => Some(Err(AppError::Fetch(reason.clone()))),
                LoadState::Uninitialized | LoadState::Loading => None,
            };
        }

        if mode == FetchMode::Force {
            return None;
        }
        match (&state.load, state.last_fetch_started) {
            (LoadState::Ready(books), Some(started))
                if started.elapsed() < self.config.dedup_interval =>
            {
                Some(Ok(books.clone()))
            }
            _ => None,
        }
    }

    /// 接続状態を更新する。切断後の最初の成功ならtrueを返す。
    fn track<T>(&self, result: &Result<T, StoreError>) -> bool {
        match result {
            Ok(_) => self.disconnected.swap(false, Ordering::SeqCst),
            Err(e) if e.is_disconnect() => {
                if !self.disconnected.swap(true, Ordering::SeqCst) {
                    warn!(error = %e, "store unreachable");
                }
                false
            }
            Err(_) => false,
        }
    }

    /// Ready時のみキャッシュへパッチを当てる。当てたかどうかを返す。
    fn patch(&self, f: impl FnOnce(&mut Vec<Book>)) -> bool {
        match &mut self.write().load {
            LoadState::Ready(books) => {
                f(books);
                true
            }
            _ => false,
        }
    }

    fn id_lock(&self, id: BookId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.id_locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(id).or_default().clone()
    }

    /// 待機者がいなければidのロックを破棄する。
    fn release_id_lock(&self, id: BookId, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self.id_locks.lock().unwrap_or_else(|e| e.into_inner());
        // map側と手元の2参照のみ
        if Arc::strong_count(&lock) == 2 {
            locks.remove(&id);
        }
    }

    fn emit(&self, event: CacheEvent) {
        // 購読者がいない場合のエラーは無視
        let _ = self.events.send(event);
    }

    fn read(&self) -> RwLockReadGuard<'_, CacheState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, CacheState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::genre::{Genre, Status};
    use crate::infra::mock_store::{Latency, MockBookStore, Operation};

    fn instant_cache() -> BookCache<MockBookStore> {
        BookCache::new(
            MockBookStore::seeded().with_latency(Latency::none()),
            CacheConfig::default(),
        )
    }

    fn dune() -> BookDraft {
        BookDraft {
            title: "Dune".into(),
            author: "Frank Herbert".into(),
            genre: Genre::ScienceFiction,
            published_year: 1965,
            status: Status::Available,
        }
    }

    #[test]
    fn default_config_matches_reference() {
        let cfg = CacheConfig::default();
        assert_eq!(cfg.dedup_interval, Duration::from_secs(60));
        assert!(!cfg.revalidate_on_focus);
        assert!(cfg.revalidate_on_reconnect);
    }

    #[tokio::test]
    async fn starts_uninitialized_with_empty_view() {
        let cache = instant_cache();
        assert_eq!(cache.state(), LoadState::Uninitialized);
        assert_eq!(cache.view(), CacheView::default());
    }

    #[tokio::test]
    async fn mount_loads_once() {
        let cache = instant_cache();
        let view = cache.mount().await;
        assert_eq!(view.books.len(), 6);
        assert!(!view.is_loading);

        cache.mount().await;
        assert_eq!(cache.store().call_count(Operation::List), 1);
    }

    #[tokio::test]
    async fn invalid_draft_never_reaches_store() {
        let cache = instant_cache();
        cache.mount().await;
        let mut bad = dune();
        bad.title = String::new();

        let err = cache.create(bad).await.unwrap_err();
        assert!(matches!(err, AppError::Domain(_)));
        assert_eq!(cache.store().call_count(Operation::Create), 0);
        assert_eq!(cache.books().len(), 6);
    }

    #[tokio::test]
    async fn mutation_before_load_is_not_patched() {
        let cache = instant_cache();
        let book = cache.create(dune()).await.unwrap();
        assert_eq!(cache.state(), LoadState::Uninitialized);

        // 次のfetchでStore側の結果が反映される
        cache.mount().await;
        assert!(cache.books().contains(&book));
    }

    #[tokio::test]
    async fn events_follow_operations() {
        let cache = instant_cache();
        let mut rx = cache.subscribe();

        cache.mount().await;
        let book = cache.create(dune()).await.unwrap();
        cache.delete(book.id).await.unwrap();

        assert_eq!(rx.recv().await.unwrap(), CacheEvent::Loading);
        assert_eq!(rx.recv().await.unwrap(), CacheEvent::Loaded { count: 6 });
        assert_eq!(rx.recv().await.unwrap(), CacheEvent::Created(book.clone()));
        assert_eq!(rx.recv().await.unwrap(), CacheEvent::Deleted(book.id));
    }

    #[tokio::test]
    async fn id_locks_are_released() {
        let cache = instant_cache();
        cache.mount().await;
        cache.delete(BookId::new(1)).await.unwrap();
        let _ = cache.delete(BookId::new(1)).await;
        assert!(cache.id_locks.lock().unwrap().is_empty());
    }
}
