//! forumport - PunBB to Discourse-style forum migration.
//!
//! Core library exposing domain modules for workspace crates.

// Model types use `from_str` methods that return Option<Self>,
// not Result<Self, Error> as std::str::FromStr requires.
#![allow(clippy::should_implement_trait)]

pub mod config;
pub mod identity;
pub mod models;
pub mod rewrite;
pub mod schema;
pub mod source;
pub mod target;

pub use config::{Config, MigrationRules, Settings, VirtualGroup};
pub use identity::{IdentityError, IdentityResolver};
pub use models::EntityKind;
pub use rewrite::{QuoteLookup, QuoteReference, QuoteTarget, Rewriter};
pub use source::{PostFilter, SourceError, SourceStore};
pub use target::{TargetError, TargetStore};
