//! Descriptors of auxiliary database containers for integration test deployments, and the
//! builders assembling them into Kubernetes resources.
//!
//! ```
//! use xtf_builder::{
//!     db::{Database, OfficialPostgresqlBuilder, SqlDatabase, deployment},
//!     image::ImageRegistry,
//! };
//!
//! let postgresql = OfficialPostgresqlBuilder::new()
//!     .username("user")
//!     .password("secret")
//!     .db_name("orders")
//!     .with_readiness_probe(true)
//!     .build();
//!
//! assert_eq!(postgresql.port(), 5432);
//! assert_eq!(
//!     postgresql.jdbc_connection_string(),
//!     "jdbc:postgresql://postgresql:5432/orders"
//! );
//!
//! let images = ImageRegistry::new().with_image("postgresql", "docker.io/library/postgres:16");
//! let container = deployment::build_container(&postgresql, &images).unwrap();
//! assert!(container.readiness_probe.is_some());
//! ```
pub mod builder;
pub mod config;
pub mod db;
pub mod image;

// External re-exports
pub use k8s_openapi;
