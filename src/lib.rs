//! datascope builds a self-describing catalog of "targets" (tables) and
//! their columns/relations by introspecting a relational store's live
//! schema metadata, then serves generic, reflection-free CRUD, paginated
//! listing, and recursive relation materialization against any registered
//! target — no target-specific code anywhere.
//!
//! The engine drives everything through the [`store::Store`] repository
//! seam; [`store::MemStore`] is the in-memory reference backend. The
//! [`rest`] module is the default HTTP consumer of the engine.

pub mod analyzer;
pub mod classify;
pub mod engine;
pub mod error;
pub mod logger;
pub mod materialize;
pub mod meta;
pub mod model;
pub mod page;
pub mod persist;
pub mod resolver;
pub mod rest;
pub mod store;

#[cfg(test)]
pub(crate) mod testkit;

pub use classify::classify;
pub use engine::{Engine, LIST_DEPTH};
pub use error::AppError;
pub use meta::{ColumnMeta, HumanizeLabels, LabelService, RelationKind, RelationMeta, TableMeta};
pub use model::{ActingUser, Column, DisplayType, Record, Target, TargetData};
pub use page::{Filter, FilterOp, Page, PageParams, QuerySpec, SortOrder};
pub use persist::{SaveHandler, StripFields};
pub use rest::{build_router, serve, AppJson, ErrorResponse, RequestState};
pub use store::{MemStore, Store};
