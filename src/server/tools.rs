use std::sync::Arc;
use rmcp::model::{AnnotateAble, CallToolResult, Content, Implementation, ListResourcesResult, PaginatedRequestParam, ProtocolVersion, RawResource, Resource, ServerCapabilities, ServerInfo};
use serde_json::{Value, json};
use serde::{Deserialize, Serialize};

use rmcp::{
    Error as McpError, RoleServer, ServerHandler, model::*, schemars,
    service::RequestContext, tool,
};

use crate::service::{DEFAULT_MAX_CHARS, DocsService, FetchRequest};

const INDEX_RESOURCE_URI: &str = "kb://index";

type Service = Arc<DocsService>;

#[derive(Clone)]
pub struct KnowledgeTools {
    pub service: Service,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SearchLibrariesRequest {
    #[schemars(description = "library name, keywords or description to search for, e.g. \"fastapi web framework\"")]
    pub query: String,

    #[schemars(description = "optional client IP forwarded in the request headers")]
    pub client_ip: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct FetchLibraryDocumentationRequest {
    #[schemars(description = "Context7-compatible library ID from search_libraries, e.g. \"/tiangolo/fastapi\"")]
    pub library_id: String,

    #[schemars(description = "optional topic to focus the documentation on, e.g. \"routing\"")]
    pub topic: Option<String>,

    #[schemars(description = "optional maximum number of tokens to retrieve")]
    pub tokens: Option<u32>,

    #[schemars(description = "optional client IP forwarded in the request headers")]
    pub client_ip: Option<String>,

    #[schemars(description = "save the documentation to the knowledge base (default true)")]
    #[serde(default = "default_true")]
    pub save_to_file: bool,

    #[schemars(description = "clone or update the GitHub repository referenced by the documentation")]
    #[serde(default)]
    pub sync_repo: bool,

    #[schemars(description = "the search query that led to this library, recorded in INDEX.md")]
    pub search_query: Option<String>,
}

fn default_max_chars() -> usize {
    DEFAULT_MAX_CHARS
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetLibraryContentRequest {
    #[schemars(description = "documentation file name from list_downloaded_libraries, e.g. \"tiangolo_fastapi.md\"")]
    pub filename: String,

    #[schemars(description = "maximum number of characters to return (default 10000)")]
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
}

fn tool_error(error: &anyhow::Error) -> CallToolResult {
    tracing::error!("tool call failed: {:#}", error);
    CallToolResult::error(vec![Content::text(
        json!({ "error": format!("{error:#}") }).to_string(),
    )])
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, McpError> {
    serde_json::to_value(value).map_err(|e| McpError::internal_error(e.to_string(), None))
}

#[tool(tool_box)]
impl KnowledgeTools {

    pub fn new(service: Service) -> Self {
        Self {
            service,
        }
    }

    fn _create_resource_text(&self, uri: &str, name: &str) -> Resource {
        RawResource::new(uri, name.to_string()).no_annotation()
    }

    #[tool(description = "Search documentation libraries by name or topic. Returns Context7-compatible library IDs to use with fetch_library_documentation.")]
    async fn search_libraries(
        &self,
        #[tool(aggr)] SearchLibrariesRequest { query, client_ip }: SearchLibrariesRequest,
    ) -> Result<CallToolResult, McpError> {
        match self.service.search(&query, client_ip.as_deref()).await {
            Ok(report) => Ok(CallToolResult::success(vec![Content::text(
                to_json(&report)?.to_string(),
            )])),
            Err(e) => Ok(tool_error(&e)),
        }
    }

    #[tool(description = "Fetch documentation for a library, save it to the local knowledge base, optionally clone its GitHub repository, and record it in INDEX.md")]
    async fn fetch_library_documentation(
        &self,
        #[tool(aggr)] request: FetchLibraryDocumentationRequest,
    ) -> Result<CallToolResult, McpError> {
        let request = FetchRequest {
            library_id: request.library_id,
            topic: request.topic,
            tokens: request.tokens,
            client_ip: request.client_ip,
            save_to_file: request.save_to_file,
            sync_repo: request.sync_repo,
            search_query: request.search_query,
        };

        match self.service.fetch(&request).await {
            Ok(report) => Ok(CallToolResult::success(vec![Content::text(
                to_json(&report)?.to_string(),
            )])),
            Err(e) => Ok(tool_error(&e)),
        }
    }

    #[tool(description = "List documentation previously saved to the knowledge base")]
    async fn list_downloaded_libraries(&self) -> Result<CallToolResult, McpError> {
        let base_directory = self.service.knowledge_base_dir().await;
        match self.service.list_libraries().await {
            Ok(libraries) => {
                let response = json!({
                    "message": format!("Found {} downloaded libraries", libraries.len()),
                    "base_directory": base_directory,
                    "libraries": to_json(&libraries)?,
                });
                Ok(CallToolResult::success(vec![Content::text(response.to_string())]))
            }
            Err(e) => Ok(tool_error(&e)),
        }
    }

    #[tool(description = "Read a saved documentation file, truncated to max_chars characters")]
    async fn get_library_content(
        &self,
        #[tool(aggr)] GetLibraryContentRequest { filename, max_chars }: GetLibraryContentRequest,
    ) -> Result<CallToolResult, McpError> {
        match self.service.read_library(&filename, max_chars).await {
            Ok(content) => Ok(CallToolResult::success(vec![Content::text(
                to_json(&content)?.to_string(),
            )])),
            Err(e) => Ok(tool_error(&e)),
        }
    }
}


#[tool(tool_box)]
impl ServerHandler for KnowledgeTools {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder()
                .enable_resources()
                .enable_tools()
                .build(),
            server_info: Implementation::from_build_env(),
            instructions: Some("This server searches Context7 documentation libraries and keeps a local knowledge base. Use 'search_libraries' to find a library ID, 'fetch_library_documentation' to download its documentation (optionally with 'sync_repo' to clone its repository), 'list_downloaded_libraries' to see what is stored, and 'get_library_content' to read a stored file. The knowledge base index is available as the 'kb://index' resource.".to_string()),
        }
    }

    async fn list_resources(
        &self,
        _request: PaginatedRequestParam,
        _: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        Ok(ListResourcesResult {
            resources: vec![
                self._create_resource_text(INDEX_RESOURCE_URI, "knowledge-base-index"),
            ],
            next_cursor: None,
        })
    }

    async fn read_resource(
        &self,
        ReadResourceRequestParam { uri }: ReadResourceRequestParam,
        _: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        if uri != INDEX_RESOURCE_URI {
            return Err(McpError::resource_not_found(
                "resource_not_found",
                Some(json!({
                    "uri": uri
                })),
            ));
        }

        match self.service.read_index().await {
            Ok(Some(index)) => Ok(ReadResourceResult {
                contents: vec![ResourceContents::text(index, uri)],
            }),
            Ok(None) => Err(McpError::resource_not_found(
                "index_not_found",
                Some(json!({ "uri": uri })),
            )),
            Err(e) => Err(McpError::internal_error(format!("{e:#}"), None)),
        }
    }

    async fn list_resource_templates(
        &self,
        _request: PaginatedRequestParam,
        _: RequestContext<RoleServer>,
    ) -> Result<ListResourceTemplatesResult, McpError> {
        Ok(ListResourceTemplatesResult {
            next_cursor: None,
            resource_templates: Vec::new(),
        })
    }
}
