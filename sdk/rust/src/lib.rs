//! Client SDK for the artifact gateway API, as published by the proxy
//! under `/api/v1/`.

pub mod client;

pub use client::{ArtifactClient, ImageQuery, ObjectRef, QueryResponse};
