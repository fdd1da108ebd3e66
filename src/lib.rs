//! Salesforge Lead Scoring Library
//!
//! Scores business leads against a fixed four-dimension rubric, records every
//! scoring action in an append-only audit trail, and retrieves similar leads
//! through vector search over an Elasticsearch index.
//!
//! # Modules
//!
//! - `audit`: Append-only action log for batch sessions.
//! - `batch`: Batch scoring pass over the whole leads index.
//! - `circuit_breaker`: Circuit breaker guarding the embedding service.
//! - `config`: Configuration management.
//! - `embedding`: Embedding service client with response cache.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers.
//! - `models`: Lead documents, audit entries, and request types.
//! - `scoring`: The scoring rubric, tiers, and reasoning text.
//! - `search_client`: Elasticsearch REST client and the store contract.
//! - `similarity`: Similar-lead retrieval.

pub mod audit;
pub mod batch;
pub mod circuit_breaker;
pub mod config;
pub mod embedding;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod scoring;
pub mod search_client;
pub mod similarity;
