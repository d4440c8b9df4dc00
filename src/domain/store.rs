use std::sync::Arc;

use async_trait::async_trait;

use super::model::book::{Book, BookDraft};
use super::model::id::BookId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// ネットワーク / HTTP 失敗。statusは応答がある場合のみ。
    #[error("transport error{}: {message}", .status.map(|s| format!(" (status {s})")).unwrap_or_default())]
    Transport {
        status: Option<u16>,
        message: String,
    },

    #[error("book not found: {0}")]
    NotFound(BookId),
}

impl StoreError {
    pub fn transport(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Transport {
            status,
            message: message.into(),
        }
    }

    /// 応答を得られなかった失敗（接続断）か。
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::Transport { status: None, .. })
    }
}

/// 書籍レコードの遠隔Storeの抽象。Infra層が実装する。
/// 失敗は回復せず常に呼び出し側へ返す。リトライは呼び出し側の責務。
#[async_trait]
pub trait BookStore: Send + Sync {
    /// 全件を取得する。戻り値はStore内部状態のコピー。
    async fn list_all(&self) -> Result<Vec<Book>, StoreError>;

    /// 新しいIDを採番して保存する。
    async fn create(&self, draft: BookDraft) -> Result<Book, StoreError>;

    /// id以外の全フィールドを置き換える。
    async fn update(&self, id: BookId, draft: BookDraft) -> Result<Book, StoreError>;

    async fn delete(&self, id: BookId) -> Result<(), StoreError>;
}

#[async_trait]
impl<S: BookStore + ?Sized> BookStore for Box<S> {
    async fn list_all(&self) -> Result<Vec<Book>, StoreError> {
        (**self).list_all().await
    }

    async fn create(&self, draft: BookDraft) -> Result<Book, StoreError> {
        (**self).create(draft).await
    }

    async fn update(&self, id: BookId, draft: BookDraft) -> Result<Book, StoreError> {
        (**self).update(id, draft).await
    }

    async fn delete(&self, id: BookId) -> Result<(), StoreError> {
        (**self).delete(id).await
    }
}

#[async_trait]
impl<S: BookStore + ?Sized> BookStore for Arc<S> {
    async fn list_all(&self) -> Result<Vec<Book>, StoreError> {
        (**self).list_all().await
    }

    async fn create(&self, draft: BookDraft) -> Result<Book, StoreError> {
        (**self).create(draft).await
    }

    async fn update(&self, id: BookId, draft: BookDraft) -> Result<Book, StoreError> {
        (**self).update(id, draft).await
    }

    async fn delete(&self, id: BookId) -> Result<(), StoreError> {
        (**self).delete(id).await
    }
}
