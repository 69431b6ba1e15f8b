//! # techpub
//!
//! Ingests S1000D-style technical publications into a SQLite-backed
//! content tree and serves the materialized data to UI consumers.
//!
//! A source directory holds one structure document (`PMC-*`) describing
//! the publication's table of contents, plus the content documents
//! (`DMC-*`) it references and an optional `media/` directory of image
//! assets. Ingestion is a four-stage batch pipeline per publication:
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   ┌────────────┐
//! │ Staging load │──▶│ Materialize  │──▶│  Normalize    │──▶│ Serialize  │
//! │ DMC-* files  │   │ ordered tree │   │ leaf content │   │ tree JSON  │
//! └──────────────┘   └──────────────┘   └──────────────┘   └────────────┘
//! ```
//!
//! Staging rows are scoped to a single run and removed when it finishes,
//! success or failure. Materialization resolves every leaf reference
//! against the staged identities inside one transaction; a malformed
//! subtree aborts the publication without persisting a partial tree.
//!
//! ## Quick Start
//!
//! ```bash
//! tpub init                        # create database
//! tpub ingest ./pubs/engine-manual # ingest one publication directory
//! tpub tree DEMO-A-00-0-0-00-00-A-022-A-D
//! tpub serve                       # start the read API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`xml`] | Element tree over quick-xml |
//! | [`identity`] | Content document identity extraction |
//! | [`staging`] | Run-scoped staging of content documents |
//! | [`structure`] | Structure document parsing |
//! | [`materialize`] | Ordered tree persistence |
//! | [`normalize`] | Leaf display-record extraction |
//! | [`serialize`] | External tree snapshot |
//! | [`ingest`] | Pipeline orchestration |
//! | [`server`] | Read-only HTTP API |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod config;
pub mod db;
pub mod error;
pub mod identity;
pub mod ingest;
pub mod materialize;
pub mod migrate;
pub mod models;
pub mod normalize;
pub mod serialize;
pub mod server;
pub mod staging;
pub mod structure;
pub mod tree_cmd;
pub mod xml;
