//! Book library catalogue: a deduplicating fetch cache with optimistic
//! mutations over a record store, exposed as an MCP server.

pub mod domain {
    pub mod error;
    pub mod store;

    pub mod model {
        pub mod book;
        pub mod genre;
        pub mod id;
    }
}

pub mod application {
    pub mod cache;
    pub mod error;
    pub mod query;
}

pub mod infra {
    pub mod http_store;
    pub mod mock_store;
}

pub mod interface {
    pub mod mcp;
    pub mod render;
}
