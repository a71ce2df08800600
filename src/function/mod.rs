//! Function registry: name → descriptor.
//!
//! Every function call in a query is resolved here during semantic analysis
//! (argument validation and return type) and again while rendering (the SQL
//! form). Keys are case-insensitive. Registering under an existing key
//! replaces the previous descriptor, so dialects override the standard set
//! simply by registering after it. Alternate keys name another key rather
//! than a descriptor, so they follow later replacements of that key.
//!
//! ```ignore
//! let mut registry = FunctionRegistry::standard();
//! registry
//!     .named_descriptor_builder("len")
//!     .set_exact_argument_count(1)
//!     .set_invariant_type(SqmType::Integer)
//!     .register_as("length");
//! ```

pub mod descriptor;
pub mod pattern;
pub mod return_type;
pub mod standard;
pub mod validator;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

pub use descriptor::{
    Emulation, FunctionDescriptor, FunctionKind, FunctionRendering, NamedDescriptorBuilder,
    PatternDescriptorBuilder,
};
pub use pattern::{PatternError, PatternPart, PatternTemplate};
pub use return_type::ReturnTypeResolver;
pub use validator::{ArgumentsValidator, ParameterType};

use crate::sqm::types::SqmType;

#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, Arc<FunctionDescriptor>>,
    /// alternate key → primary key
    alternate_keys: HashMap<String, String>,
}

impl FunctionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the functions every dialect supports.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        standard::register_standard_functions(&mut registry);
        registry
    }

    fn key(name: &str) -> String {
        name.to_ascii_lowercase()
    }

    /// Register a descriptor, replacing any previous one under the same key.
    /// A direct registration also supersedes an alternate key of that name.
    pub fn register(&mut self, key: &str, descriptor: FunctionDescriptor) -> Arc<FunctionDescriptor> {
        let descriptor = Arc::new(descriptor);
        let key = Self::key(key);
        self.alternate_keys.remove(&key);
        if let Some(previous) = self.functions.insert(key.clone(), descriptor.clone()) {
            debug!(
                function = %key,
                previous = ?previous.rendering,
                replacement = ?descriptor.rendering,
                "function registration replaced"
            );
        }
        descriptor
    }

    /// Make `alternate` resolve to whatever is registered under `existing`,
    /// now and after `existing` is replaced.
    ///
    /// Returns `false` when nothing is registered under `existing`.
    pub fn register_alternate_key(&mut self, alternate: &str, existing: &str) -> bool {
        let Some(primary) = self.primary_key(existing) else {
            return false;
        };
        let alternate = Self::key(alternate);
        if alternate == primary {
            return true;
        }
        self.functions.remove(&alternate);
        self.alternate_keys.insert(alternate, primary);
        true
    }

    /// The key `name` is registered under, following an alternate key.
    fn primary_key(&self, name: &str) -> Option<String> {
        let key = Self::key(name);
        if self.functions.contains_key(&key) {
            return Some(key);
        }
        self.alternate_keys
            .get(&key)
            .filter(|primary| self.functions.contains_key(*primary))
            .cloned()
    }

    pub fn find(&self, name: &str) -> Option<Arc<FunctionDescriptor>> {
        let key = self.primary_key(name)?;
        self.functions.get(&key).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.primary_key(name).is_some()
    }

    /// Registered keys and alternate keys, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .functions
            .keys()
            .chain(self.alternate_keys.keys())
            .map(String::as_str)
            .collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.functions.len() + self.alternate_keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty() && self.alternate_keys.is_empty()
    }

    pub fn named_descriptor_builder(&mut self, name: &str) -> NamedDescriptorBuilder<'_> {
        NamedDescriptorBuilder::new(self, name)
    }

    pub fn pattern_descriptor_builder(
        &mut self,
        name: &str,
        pattern: &str,
    ) -> Result<PatternDescriptorBuilder<'_>, PatternError> {
        PatternDescriptorBuilder::new(self, name, pattern)
    }

    /// Register `name` as a plain named function with unchecked arguments.
    pub fn register_named(&mut self, name: &str) -> Arc<FunctionDescriptor> {
        self.named_descriptor_builder(name).register()
    }

    /// Register a pattern function returning `ty`.
    pub fn register_pattern(
        &mut self,
        name: &str,
        pattern: &str,
        ty: SqmType,
    ) -> Result<Arc<FunctionDescriptor>, PatternError> {
        Ok(self
            .pattern_descriptor_builder(name, pattern)?
            .set_invariant_type(ty)
            .register())
    }
}
