//! # openapi-parser
//!
//! Swagger 2.0 / OpenAPI 3.x support for openapi-connector.
//! Loads and dereferences specs, validates them, upgrades 2.0 documents,
//! extracts operations and derives the method names they are exposed under.

mod auth;
mod error;
mod operations;
mod parser;
mod refs;
mod resolver;
mod source;
mod types;
mod upgrade;
mod validator;

pub mod naming;

pub use auth::{credentials_for, AuthScheme, Authorization, Credential, OAuthToken};
pub use error::{ParseResult, SpecError};
pub use naming::{MapToMethods, MethodNames, OperationIndexer};
pub use operations::{escape_identifier, OperationExtractor};
pub use parser::OpenApiParser;
pub use refs::RefResolver;
pub use resolver::{ResolveOptions, ResolvedSpec, SpecResolver};
pub use source::{SpecFormat, SpecSource};
pub use types::*;
pub use upgrade::upgrade_to_openapi3;
pub use validator::{SpecValidator, ValidateOptions, ValidationReport};
