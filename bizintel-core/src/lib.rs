pub mod completion;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod models;
pub mod parse;
pub mod prompt;
pub mod retrieval;
pub mod validate;

pub use completion::{CompletionBackend, CompletionError, CompletionRequest, OpenAiCompletionClient};
pub use config::BizintelConfig;
pub use embeddings::{EmbeddingBackend, EmbeddingError, OpenAiEmbeddingClient};
pub use error::{BizintelError, EncodingError, FieldIssue, SchemaMismatch, ValidationError};
pub use prompt::Prompt;
pub use retrieval::{PolicyIndex, RetrievalError};
