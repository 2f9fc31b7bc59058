mod tools;

pub use tools::{FetchLibraryDocumentationRequest, GetLibraryContentRequest, KnowledgeTools, SearchLibrariesRequest};
