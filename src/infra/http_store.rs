use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};

use crate::domain::model::book::{Book, BookDraft};
use crate::domain::model::id::BookId;
use crate::domain::store::{BookStore, StoreError};

/// REST API (`/books`) に対するBookStore実装。
///
/// - `GET /books` → 200 `[Book]`
/// - `POST /books` → 201 `Book`
/// - `PUT /books/{id}` → 200 `Book`
/// - `DELETE /books/{id}` → 204
///
/// 2xx以外は `Transport`。ただし `PUT` / `DELETE` の 404 は `NotFound`。
pub struct HttpBookStore {
    client: Client,
    base_url: String,
}

impl HttpBookStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn collection_url(&self) -> String {
        format!("{}/books", self.base_url)
    }

    fn item_url(&self, id: BookId) -> String {
        format!("{}/books/{}", self.base_url, id)
    }
}

fn transport(err: reqwest::Error) -> StoreError {
    StoreError::transport(err.status().map(|s| s.as_u16()), err.to_string())
}

/// 非成功ステータスをStoreErrorへ変換する。`id` 指定時のみ404をNotFoundにする。
fn check(resp: Response, id: Option<BookId>) -> Result<Response, StoreError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    match id {
        Some(id) if status == StatusCode::NOT_FOUND => Err(StoreError::NotFound(id)),
        _ => Err(StoreError::transport(
            Some(status.as_u16()),
            format!("HTTP error! status: {status}"),
        )),
    }
}

#[async_trait]
impl BookStore for HttpBookStore {
    async fn list_all(&self) -> Result<Vec<Book>, StoreError> {
        let resp = self
            .client
            .get(self.collection_url())
            .send()
            .await
            .map_err(transport)?;
        check(resp, None)?.json().await.map_err(transport)
    }

    async fn create(&self, draft: BookDraft) -> Result<Book, StoreError> {
        let resp = self
            .client
            .post(self.collection_url())
            .json(&draft)
            .send()
            .await
            .map_err(transport)?;
        check(resp, None)?.json().await.map_err(transport)
    }

    async fn update(&self, id: BookId, draft: BookDraft) -> Result<Book, StoreError> {
        let resp = self
            .client
            .put(self.item_url(id))
            .json(&draft)
            .send()
            .await
            .map_err(transport)?;
        check(resp, Some(id))?.json().await.map_err(transport)
    }

    async fn delete(&self, id: BookId) -> Result<(), StoreError> {
        let resp = self
            .client
            .delete(self.item_url(id))
            .send()
            .await
            .map_err(transport)?;
        check(resp, Some(id))?;
        Ok(())
    }
}
