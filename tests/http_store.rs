//! HttpBookStore against a local REST server backed by the in-memory store.

mod common;

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};

use library_mcp::application::cache::{BookCache, CacheConfig};
use library_mcp::domain::model::book::BookDraft;
use library_mcp::domain::model::genre::Status;
use library_mcp::domain::model::id::BookId;
use library_mcp::domain::store::{BookStore, StoreError};
use library_mcp::infra::http_store::HttpBookStore;
use library_mcp::infra::mock_store::{Latency, MockBookStore};

type Backend = Arc<MockBookStore>;

fn error_response(err: StoreError) -> Response {
    match err {
        StoreError::NotFound(_) => StatusCode::NOT_FOUND.into_response(),
        StoreError::Transport { status, .. } => status
            .and_then(|s| StatusCode::from_u16(s).ok())
            .unwrap_or(StatusCode::SERVICE_UNAVAILABLE)
            .into_response(),
    }
}

async fn list(State(store): State<Backend>) -> Response {
    match store.list_all().await {
        Ok(books) => Json(books).into_response(),
        Err(e) => error_response(e),
    }
}

async fn create(State(store): State<Backend>, Json(draft): Json<BookDraft>) -> Response {
    match store.create(draft).await {
        Ok(book) => (StatusCode::CREATED, Json(book)).into_response(),
        Err(e) => error_response(e),
    }
}

async fn update(
    State(store): State<Backend>,
    Path(id): Path<u64>,
    Json(draft): Json<BookDraft>,
) -> Response {
    match store.update(BookId::new(id), draft).await {
        Ok(book) => Json(book).into_response(),
        Err(e) => error_response(e),
    }
}

async fn remove(State(store): State<Backend>, Path(id): Path<u64>) -> Response {
    match store.delete(BookId::new(id)).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

/// Spin up the REST server on an OS-assigned port, returning the base URL.
async fn spawn_test_server(backend: Backend) -> String {
    let app = Router::new()
        .route("/books", get(list).post(create))
        .route("/books/{id}", put(update).delete(remove))
        .with_state(backend);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://127.0.0.1:{}", port)
}

fn backend() -> Backend {
    Arc::new(MockBookStore::seeded().with_latency(Latency::none()))
}

#[tokio::test]
async fn list_returns_seeded_books() {
    let base = spawn_test_server(backend()).await;
    let store = HttpBookStore::new(base);
    let books = store.list_all().await.unwrap();
    assert_eq!(common::ids(&books), vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(books[2].title, "1984");
}

#[tokio::test]
async fn crud_roundtrip_through_cache() {
    let backend = backend();
    let base = spawn_test_server(backend.clone()).await;
    let cache = BookCache::new(HttpBookStore::new(base), CacheConfig::default());
    cache.mount().await;

    let dune = cache.create(common::dune()).await.unwrap();
    assert_eq!(dune.id, BookId::new(7));

    let mut draft = dune.to_draft();
    draft.status = Status::Issued;
    let updated = cache.update(dune.id, draft).await.unwrap();
    assert_eq!(updated.status, Status::Issued);

    cache.delete(BookId::new(4)).await.unwrap();

    assert_eq!(common::ids(&cache.books()), vec![1, 2, 3, 5, 6, 7]);
    assert_eq!(cache.books(), backend.snapshot());
}

#[tokio::test]
async fn missing_id_maps_to_not_found() {
    let base = spawn_test_server(backend()).await;
    let store = HttpBookStore::new(base);

    assert_eq!(
        store.delete(BookId::new(99)).await,
        Err(StoreError::NotFound(BookId::new(99)))
    );
    assert_eq!(
        store.update(BookId::new(98), common::dune()).await,
        Err(StoreError::NotFound(BookId::new(98)))
    );
}

#[tokio::test]
async fn server_error_maps_to_transport_with_status() {
    let backend = backend();
    let base = spawn_test_server(backend.clone()).await;
    let store = HttpBookStore::new(base);
    backend.set_offline(true);

    let err = store.list_all().await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::Transport {
            status: Some(503),
            ..
        }
    ));

    let err = store.create(common::dune()).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::Transport {
            status: Some(503),
            ..
        }
    ));
}

#[tokio::test]
async fn unknown_route_is_transport_error() {
    let base = spawn_test_server(backend()).await;
    let store = HttpBookStore::new(format!("{base}/v2"));
    let err = store.list_all().await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::Transport {
            status: Some(404),
            ..
        }
    ));
}
