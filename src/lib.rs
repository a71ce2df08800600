//! # sqm
//!
//! An object-query compiler: queries written against entities and their
//! associations become a typed semantic query tree (SQM), which renders to
//! SQL for one of several dialects.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    Query text (HQL)                      │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [hql: lexer + two-phase parser]
//! ┌─────────────────────────────────────────────────────────┐
//! │                      Parse tree                          │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [semantic: domain model + function registry]
//! ┌─────────────────────────────────────────────────────────┐
//! │     SQM (copyable, mutable; also built via criteria)     │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [translate: lowering per dialect]
//! ┌─────────────────────────────────────────────────────────┐
//! │                  SQL + parameter bindings                │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! [`QueryEngine`] runs the whole pipeline for one dialect and domain model.

pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod function;
pub mod hql;
pub mod semantic;
pub mod sql;
pub mod sqm;
pub mod temporal;
pub mod translate;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::domain::{Attribute, DomainModel, EntityType, StaticDomainModel};
    pub use crate::engine::QueryEngine;
    pub use crate::error::{QueryError, QueryResult};
    pub use crate::function::FunctionRegistry;
    pub use crate::sql::dialect::{Dialect, SqlDialect};
    pub use crate::sqm::{
        CopyContext, CreationOptions, NodeBuilder, NodeId, ResultType, SelectStatement, SqmExpr,
        SqmPredicate, SqmType,
    };
    pub use crate::temporal::TemporalUnit;
    pub use crate::translate::{ParameterBinding, RenderedQuery};
}

pub use config::Settings;
pub use domain::{DomainModel, EntityType, StaticDomainModel};
pub use engine::QueryEngine;
pub use error::{QueryError, QueryResult};
pub use function::FunctionRegistry;
pub use sql::dialect::{Dialect, SqlDialect};
pub use sqm::{ResultType, SelectStatement};
pub use translate::{render, RenderError, RenderedQuery};
