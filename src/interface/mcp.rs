//! MCP Server for library-mcp
//!
//! MCP Protocol (stdio) <-> application::BookCache
//!
//! 6 tools: list_books, book_stats, create_book, update_book, delete_book, refresh

use std::sync::Arc;

use rmcp::{
    handler::server::{tool::ToolCallContext, tool::ToolRouter, wrapper::Parameters},
    model::{
        CallToolRequestParams, CallToolResult, Content, Implementation, ListToolsResult,
        PaginatedRequestParams, ProtocolVersion, ServerCapabilities, ServerInfo,
    },
    service::{NotificationContext, RequestContext, RoleServer},
    tool, tool_router,
    transport::stdio,
    ErrorData as McpError, ServerHandler, ServiceExt,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::application::cache::BookCache;
use crate::application::error::AppError;
use crate::application::query::BookFilter;
use crate::domain::model::book::BookDraft;
use crate::domain::model::genre::{Genre, Status};
use crate::domain::model::id::BookId;
use crate::domain::store::{BookStore, StoreError};

use super::render::{render_book_line, render_catalog, render_stats};

/// 実行時に選ばれたStoreを包むキャッシュ。
pub type SharedCache = Arc<BookCache<Box<dyn BookStore>>>;

// =============================================================================
// Public entry point
// =============================================================================

/// MCP Serverを起動する。初回読み込みはバックグラウンドで開始する。
pub async fn run(cache: SharedCache) -> anyhow::Result<()> {
    let mount = cache.clone();
    tokio::spawn(async move {
        mount.mount().await;
    });

    let server = LibraryMcpServer::new(cache);
    let service = server.serve(stdio()).await?;
    info!("MCP server ready on stdio");
    service.waiting().await?;
    Ok(())
}

// =============================================================================
// MCP Server
// =============================================================================

#[derive(Clone)]
struct LibraryMcpServer {
    cache: SharedCache,
    tool_router: ToolRouter<Self>,
}

impl LibraryMcpServer {
    fn new(cache: SharedCache) -> Self {
        Self {
            cache,
            tool_router: Self::tool_router(),
        }
    }

    /// 検証エラーとNotFoundは呼び出し側の誤り、それ以外はStore障害として返す。
    fn to_mcp_error(e: AppError) -> McpError {
        match &e {
            AppError::Domain(_) | AppError::Store(StoreError::NotFound(_)) => {
                McpError::invalid_params(format!("{e}"), None)
            }
            AppError::Store(StoreError::Transport { .. }) | AppError::Fetch(_) => {
                McpError::internal_error(format!("{e}. Please try again."), None)
            }
        }
    }
}

// =============================================================================
// ServerHandler impl
// =============================================================================

impl ServerHandler for LibraryMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "library-mcp".to_string(),
                title: Some("Library MCP — Book Catalogue".to_string()),
                description: Some(
                    "Book library with cached listing, search and optimistic edits.".to_string(),
                ),
                version: env!("CARGO_PKG_VERSION").to_string(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Manage a library of books.\n\
                 \n\
                 `list_books` shows the catalogue (filter by search text, genre, status). \
                 `create_book` / `update_book` / `delete_book` change records; the list \
                 reflects the change immediately. If loading failed, use `refresh`."
                    .to_string(),
            ),
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult {
            tools: self.tool_router.list_all(),
            next_cursor: None,
            meta: None,
        })
    }

    /// クライアントのセッション開始をフォーカス復帰として扱う。
    async fn on_initialized(&self, _context: NotificationContext<RoleServer>) {
        info!("client initialized");
        self.cache.on_focus().await;
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let tool_ctx = ToolCallContext::new(self, request, context);
        self.tool_router.call(tool_ctx).await
    }
}

// =============================================================================
// Request types
// =============================================================================

fn parse_genre(s: &str) -> Result<Genre, McpError> {
    s.parse::<Genre>().map_err(|e| {
        let known: Vec<&str> = Genre::ALL.iter().map(|g| g.label()).collect();
        McpError::invalid_params(format!("{e}. Use one of: {}", known.join(", ")), None)
    })
}

fn parse_status(s: &str) -> Result<Status, McpError> {
    s.parse::<Status>()
        .map_err(|e| McpError::invalid_params(format!("{e}"), None))
}

/// "all" と空文字は条件なしとして扱う。
fn optional_filter(s: Option<&str>) -> Option<&str> {
    s.map(str::trim)
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("all"))
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
struct McpListBooksRequest {
    #[schemars(description = "Case-insensitive text matched against title or author")]
    pub search: Option<String>,
    #[schemars(description = "Genre filter (e.g. 'Fiction', 'Science Fiction'). Omit or 'all' for every genre.")]
    pub genre: Option<String>,
    #[schemars(description = "Status filter: Available or Issued. Omit or 'all' for both.")]
    pub status: Option<String>,
}

impl McpListBooksRequest {
    fn to_filter(&self) -> Result<BookFilter, McpError> {
        Ok(BookFilter {
            search: self.search.clone(),
            genre: optional_filter(self.genre.as_deref())
                .map(parse_genre)
                .transpose()?,
            status: optional_filter(self.status.as_deref())
                .map(parse_status)
                .transpose()?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
struct McpBookFields {
    #[schemars(description = "Book title (1-200 characters)")]
    pub title: String,
    #[schemars(description = "Author name (1-100 characters)")]
    pub author: String,
    #[schemars(description = "Genre, e.g. 'Fiction', 'Mystery', 'Science Fiction'")]
    pub genre: String,
    #[schemars(description = "Year of publication (1000 to current year)")]
    pub published_year: i32,
    #[schemars(description = "Available or Issued")]
    pub status: String,
}

impl McpBookFields {
    fn to_draft(&self) -> Result<BookDraft, McpError> {
        Ok(BookDraft {
            title: self.title.trim().to_string(),
            author: self.author.trim().to_string(),
            genre: parse_genre(&self.genre)?,
            published_year: self.published_year,
            status: parse_status(&self.status)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
struct McpUpdateBookRequest {
    #[schemars(description = "Book ID from `list_books` output")]
    pub id: u64,
    #[serde(flatten)]
    pub fields: McpBookFields,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
struct McpDeleteBookRequest {
    #[schemars(description = "Book ID from `list_books` output")]
    pub id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
struct McpEmptyRequest {}

// =============================================================================
// Tool implementations
// =============================================================================

#[tool_router]
impl LibraryMcpServer {
    #[tool(
        name = "list_books",
        description = "Show the book catalogue with availability counts. Optional filters: search (title/author), genre, status.",
        annotations(
            read_only_hint = true,
            destructive_hint = false,
            open_world_hint = false
        )
    )]
    async fn list_books(
        &self,
        Parameters(req): Parameters<McpListBooksRequest>,
    ) -> Result<CallToolResult, McpError> {
        let filter = req.to_filter()?;
        let view = self.cache.load().await;
        Ok(CallToolResult::success(vec![Content::text(
            render_catalog(&view, &filter),
        )]))
    }

    #[tool(
        name = "book_stats",
        description = "Show total, available and issued counts and the genres present in the library.",
        annotations(
            read_only_hint = true,
            destructive_hint = false,
            open_world_hint = false
        )
    )]
    async fn book_stats(
        &self,
        #[allow(unused_variables)] Parameters(_req): Parameters<McpEmptyRequest>,
    ) -> Result<CallToolResult, McpError> {
        let view = self.cache.load().await;
        if let Some(reason) = view.error {
            return Err(McpError::internal_error(
                format!("Failed to load books: {reason}"),
                None,
            ));
        }
        Ok(CallToolResult::success(vec![Content::text(render_stats(
            &view.books,
        ))]))
    }

    #[tool(
        name = "create_book",
        description = "Add a new book. The store assigns its ID.",
        annotations(
            read_only_hint = false,
            destructive_hint = false,
            idempotent_hint = false,
            open_world_hint = false
        )
    )]
    async fn create_book(
        &self,
        Parameters(req): Parameters<McpBookFields>,
    ) -> Result<CallToolResult, McpError> {
        let draft = req.to_draft()?;
        let book = self
            .cache
            .create(draft)
            .await
            .map_err(Self::to_mcp_error)?;
        Ok(CallToolResult::success(vec![Content::text(format!(
            "Book added: \"{}\" has been added to your library.\n{}",
            book.title,
            render_book_line(&book)
        ))]))
    }

    #[tool(
        name = "update_book",
        description = "Replace every field of an existing book. The ID never changes.",
        annotations(
            read_only_hint = false,
            destructive_hint = false,
            idempotent_hint = true,
            open_world_hint = false
        )
    )]
    async fn update_book(
        &self,
        Parameters(req): Parameters<McpUpdateBookRequest>,
    ) -> Result<CallToolResult, McpError> {
        let draft = req.fields.to_draft()?;
        let book = self
            .cache
            .update(BookId::new(req.id), draft)
            .await
            .map_err(Self::to_mcp_error)?;
        Ok(CallToolResult::success(vec![Content::text(format!(
            "Book updated: \"{}\" has been updated.\n{}",
            book.title,
            render_book_line(&book)
        ))]))
    }

    #[tool(
        name = "delete_book",
        description = "Remove a book from the library permanently.",
        annotations(
            read_only_hint = false,
            destructive_hint = true,
            idempotent_hint = false,
            open_world_hint = false
        )
    )]
    async fn delete_book(
        &self,
        Parameters(req): Parameters<McpDeleteBookRequest>,
    ) -> Result<CallToolResult, McpError> {
        let id = BookId::new(req.id);
        let title = self
            .cache
            .books()
            .into_iter()
            .find(|b| b.id == id)
            .map(|b| b.title);
        self.cache.delete(id).await.map_err(Self::to_mcp_error)?;
        let message = match title {
            Some(title) => format!("Book deleted: \"{title}\" has been removed from your library."),
            None => format!("Book deleted: {id} has been removed from your library."),
        };
        Ok(CallToolResult::success(vec![Content::text(message)]))
    }

    #[tool(
        name = "refresh",
        description = "Reload the catalogue from the store, ignoring the cache. Use after a failed load.",
        annotations(
            read_only_hint = true,
            destructive_hint = false,
            idempotent_hint = true,
            open_world_hint = false
        )
    )]
    async fn refresh(
        &self,
        #[allow(unused_variables)] Parameters(_req): Parameters<McpEmptyRequest>,
    ) -> Result<CallToolResult, McpError> {
        let books = self.cache.refresh().await.map_err(Self::to_mcp_error)?;
        Ok(CallToolResult::success(vec![Content::text(format!(
            "Reloaded {} books.",
            books.len()
        ))]))
    }
}

// =============================================================================
// Tests
// =============================================================================
