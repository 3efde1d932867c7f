//! The Pipeline and its Stage Tools (C5/C6) for the documentation job
//! orchestration engine: fetch a repository snapshot, scan and classify
//! its tree, analyze code files, generate documentation via a language
//! model, publish the result, and clean up the workspace.

pub mod analyze;
pub mod cleanup;
pub mod fetch;
pub mod generate;
pub mod github;
pub mod pipeline;
pub mod publish;
pub mod s3_store;
pub mod scan;

pub use analyze::ExtractorRegistry;
pub use cleanup::Cleaner;
pub use fetch::GitFetcher;
pub use generate::{Generator, HttpModelClient, ModelError, ModelResponse};
pub use github::{owner_repo, GitHubError, PrPublisher};
pub use pipeline::Pipeline;
pub use publish::Publisher;
pub use s3_store::S3ArtifactStore;
pub use scan::WalkScanner;
