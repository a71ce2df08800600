//! Query engine: the high-level entry point.
//!
//! Bundles a dialect, its function registry and a domain model, and runs
//! the pipeline:
//!
//! ```text
//! query text → hql::parse → semantic::build → SelectStatement → translate::render → SQL
//! ```
//!
//! # Example
//!
//! ```ignore
//! use sqm::{Dialect, QueryEngine, StaticDomainModel};
//!
//! let domain = StaticDomainModel::from_file("model.toml".as_ref())?;
//! let engine = QueryEngine::new(Dialect::Postgres, Arc::new(domain));
//! let rendered = engine.compile("select p.name from Person p where p.age > :age")?;
//! println!("{}", rendered.sql);
//! ```

use std::sync::Arc;

use tracing::{debug, enabled, trace, Level};

use crate::domain::DomainModel;
use crate::error::{QueryError, QueryResult};
use crate::function::{FunctionDescriptor, FunctionRegistry};
use crate::hql;
use crate::semantic;
use crate::sql::dialect::{Dialect, SqlDialect};
use crate::sqm::node::{CreationOptions, NodeBuilder};
use crate::sqm::printer::SqmTreePrinter;
use crate::sqm::select::{ResultType, SelectStatement};
use crate::translate::{self, RenderedQuery};

/// Translates and renders queries for one dialect and domain model.
#[derive(Debug, Clone)]
pub struct QueryEngine {
    dialect: Dialect,
    functions: Arc<FunctionRegistry>,
    domain: Arc<dyn DomainModel>,
    options: CreationOptions,
    builder: NodeBuilder,
}

impl QueryEngine {
    /// An engine with the dialect's function registry and default options.
    pub fn new(dialect: Dialect, domain: Arc<dyn DomainModel>) -> Self {
        let mut registry = FunctionRegistry::new();
        dialect.initialize_function_registry(&mut registry);
        let functions = Arc::new(registry);
        let options = CreationOptions::default();
        let builder = NodeBuilder::new(domain.clone(), functions.clone(), options);
        Self {
            dialect,
            functions,
            domain,
            options,
            builder,
        }
    }

    pub fn with_options(mut self, options: CreationOptions) -> Self {
        self.options = options;
        self.rebuild();
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    pub fn domain(&self) -> &dyn DomainModel {
        self.domain.as_ref()
    }

    pub fn options(&self) -> CreationOptions {
        self.options
    }

    /// The builder new trees are created with. Statements built before a
    /// registry change keep the registry they were built against.
    pub fn node_builder(&self) -> &NodeBuilder {
        &self.builder
    }

    /// Register `descriptor` under `key`, replacing any existing function.
    pub fn register_function(
        &mut self,
        key: &str,
        descriptor: FunctionDescriptor,
    ) -> Arc<FunctionDescriptor> {
        let registered = Arc::make_mut(&mut self.functions).register(key, descriptor);
        self.rebuild();
        registered
    }

    /// Mutate the registry in place, e.g. through its descriptor builders.
    pub fn configure_functions(&mut self, configure: impl FnOnce(&mut FunctionRegistry)) {
        configure(Arc::make_mut(&mut self.functions));
        self.rebuild();
    }

    fn rebuild(&mut self) {
        self.builder = NodeBuilder::new(self.domain.clone(), self.functions.clone(), self.options);
    }

    /// An empty statement for the builder API.
    pub fn criteria(&self, result_type: ResultType) -> SelectStatement {
        SelectStatement::criteria(&self.builder, result_type)
    }

    /// Parse and analyze `query` into a semantic tree.
    pub fn translate(&self, query: &str, result_type: ResultType) -> QueryResult<SelectStatement> {
        debug!(hql = %query, dialect = self.dialect.name(), "translating query");

        let ast = hql::parse(query).map_err(|failure| QueryError::parse(failure, query))?;
        let statement = semantic::build(&ast, result_type, &self.builder)
            .map_err(|error| QueryError::semantic(error, query))?;

        if enabled!(Level::TRACE) {
            trace!(tree = %SqmTreePrinter::print(&statement), "semantic tree");
        }
        Ok(statement)
    }

    /// Render a statement for this engine's dialect.
    pub fn render(&self, statement: &SelectStatement) -> QueryResult<RenderedQuery> {
        Ok(translate::render(statement, self.dialect, &self.functions)?)
    }

    /// Translate and render in one step.
    pub fn compile(&self, query: &str) -> QueryResult<RenderedQuery> {
        let statement = self.translate(query, ResultType::Object)?;
        self.render(&statement)
    }

    /// Render the row-counting variant of `query`.
    pub fn count_query(&self, query: &str) -> QueryResult<RenderedQuery> {
        let statement = self.translate(query, ResultType::Object)?;
        let count = statement
            .create_count_query()
            .map_err(|error| QueryError::semantic(error, query))?;
        self.render(&count)
    }
}
