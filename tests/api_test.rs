mod common;

use common::{DOC_WITH_SOURCE, ScriptedRunner};
use context7_kb::api::{ApiError, Context7Client, FetchOptions, SearchResult, format_search_results};
use context7_kb::config::Config;
use context7_kb::library::LibraryId;
use context7_kb::repository::SyncOutcome;
use context7_kb::service::{DocsService, FetchRequest};
use context7_kb::sync::{KnowledgeBase, RepositoryReport};
use serde_json::json;
use std::path::Path;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> Context7Client {
    let config = Config {
        api_base_url: server.uri(),
        ..Config::default()
    };
    Context7Client::new(&config).unwrap()
}

fn service_for(server: &MockServer, root: &Path) -> DocsService<ScriptedRunner> {
    DocsService::new(
        client_for(server),
        KnowledgeBase::new(root, ScriptedRunner::working()),
    )
}

async fn mount_fastapi_docs(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/v1/tiangolo/fastapi"))
        .and(query_param("type", "txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(DOC_WITH_SOURCE))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_search_parses_results() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/search"))
        .and(query_param("query", "fastapi"))
        .and(header("x-context7-source", "mcp-server"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {
                    "title": "FastAPI",
                    "id": "/tiangolo/fastapi",
                    "description": "Modern web framework",
                    "totalSnippets": 120,
                    "trustScore": 9.5,
                    "versions": ["0.110.0"]
                },
                {
                    "id": "/other/fastapi-utils",
                    "totalSnippets": -1,
                    "trustScore": -1
                }
            ]
        })))
        .mount(&server)
        .await;

    let results = client_for(&server).search("fastapi", None).await.unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].id, "/tiangolo/fastapi");
    assert_eq!(results[0].total_snippets, Some(120));
    assert_eq!(results[0].trust_score, Some(9.5));
    assert_eq!(results[1].title, "N/A");
    assert_eq!(results[1].total_snippets, None);
    assert_eq!(results[1].trust_score, None);
}

#[tokio::test]
async fn test_client_ip_header_is_forwarded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/search"))
        .and(header("mcp-client-ip", "203.0.113.7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let results = client_for(&server)
        .search("anything", Some("203.0.113.7"))
        .await
        .unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn test_rate_limit_is_distinguished() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/search"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let err = client_for(&server).search("fastapi", None).await.unwrap_err();
    assert!(err.is_rate_limited());
    assert_eq!(err.to_string(), "Rate limited. Please try again later.");
}

#[tokio::test]
async fn test_malformed_search_body_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/search"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let err = client_for(&server).search("fastapi", None).await.unwrap_err();
    assert!(matches!(err, ApiError::Json(_)));
    assert!(!err.is_rate_limited());
}

#[tokio::test]
async fn test_fetch_sends_filters() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/tiangolo/fastapi"))
        .and(query_param("type", "txt"))
        .and(query_param("tokens", "5000"))
        .and(query_param("topic", "routing"))
        .respond_with(ResponseTemplate::new(200).set_body_string("routing docs"))
        .expect(1)
        .mount(&server)
        .await;

    let id = LibraryId::parse("/tiangolo/fastapi").unwrap();
    let options = FetchOptions {
        topic: Some("routing".to_string()),
        tokens: Some(5000),
    };
    let text = client_for(&server)
        .fetch_documentation(&id, &options, None)
        .await
        .unwrap();
    assert_eq!(text, "routing docs");
}

#[tokio::test]
async fn test_fetch_without_content() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/org/empty"))
        .respond_with(ResponseTemplate::new(200).set_body_string("No content available"))
        .mount(&server)
        .await;

    let id = LibraryId::parse("org/empty").unwrap();
    let err = client_for(&server)
        .fetch_documentation(&id, &FetchOptions::default(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::NoContent));
}

#[tokio::test]
async fn test_fetch_error_status_carries_message() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/org/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Library not found"))
        .mount(&server)
        .await;

    let id = LibraryId::parse("org/missing").unwrap();
    let err = client_for(&server)
        .fetch_documentation(&id, &FetchOptions::default(), None)
        .await
        .unwrap_err();
    match err {
        ApiError::Status { status, message } => {
            assert_eq!(status, 404);
            assert_eq!(message, "Library not found");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_format_search_results() {
    assert_eq!(
        format_search_results(&[]),
        "No documentation libraries found matching your query."
    );

    let results = vec![
        SearchResult {
            title: "FastAPI".to_string(),
            id: "/tiangolo/fastapi".to_string(),
            description: "Modern web framework".to_string(),
            total_snippets: Some(120),
            trust_score: Some(9.0),
            versions: vec!["0.110.0".to_string(), "0.109.0".to_string()],
        },
        SearchResult {
            title: "Gradio".to_string(),
            id: "/gradio-app/gradio".to_string(),
            description: "ML apps".to_string(),
            total_snippets: None,
            trust_score: None,
            versions: Vec::new(),
        },
    ];

    let expected = "- Title: FastAPI\n\
- Context7-compatible library ID: /tiangolo/fastapi\n\
- Description: Modern web framework\n\
- Code Snippets: 120\n\
- Trust Score: 9\n\
- Versions: 0.110.0, 0.109.0\n\
----------\n\
- Title: Gradio\n\
- Context7-compatible library ID: /gradio-app/gradio\n\
- Description: ML apps";
    assert_eq!(format_search_results(&results), expected);
}

#[tokio::test]
async fn test_service_fetch_saves_and_syncs() {
    let server = MockServer::start().await;
    mount_fastapi_docs(&server).await;
    let temp_dir = tempfile::tempdir().unwrap();
    let service = service_for(&server, temp_dir.path());

    let request = FetchRequest {
        sync_repo: true,
        search_query: Some("python web framework".to_string()),
        ..FetchRequest::new("/tiangolo/fastapi")
    };
    let report = service.fetch(&request).await.unwrap();

    assert_eq!(report.library_id.as_str(), "tiangolo/fastapi");
    assert_eq!(report.title.as_deref(), Some("FastAPI"));
    assert_eq!(report.content, DOC_WITH_SOURCE);
    assert_eq!(report.saved_to, Some(temp_dir.path().join("tiangolo_fastapi.md")));
    assert!(matches!(
        report.repository,
        Some(RepositoryReport::Synchronized { outcome: SyncOutcome::Cloned, .. })
    ));

    // Identifiers come from the index, so underscores in names survive the listing
    let libraries = service.list_libraries().await.unwrap();
    assert_eq!(libraries.len(), 1);
    assert_eq!(libraries[0].library_id, "/tiangolo/fastapi");
    assert!(libraries[0].document.has_repository);

    let index = service.read_index().await.unwrap().unwrap();
    assert!(index.contains("## /tiangolo/fastapi"));
    assert!(index.contains("- **Search Query**: \"python web framework\""));

    let content = service.read_library("tiangolo_fastapi.md", 9).await.unwrap();
    assert!(content.truncated);
    assert!(content.content.starts_with("# FastAPI"));
}

#[tokio::test]
async fn test_service_fetch_without_saving() {
    let server = MockServer::start().await;
    mount_fastapi_docs(&server).await;
    let temp_dir = tempfile::tempdir().unwrap();
    let service = service_for(&server, temp_dir.path());

    let request = FetchRequest {
        save_to_file: false,
        ..FetchRequest::new("tiangolo/fastapi")
    };
    let report = service.fetch(&request).await.unwrap();

    assert_eq!(report.saved_to, None);
    assert_eq!(report.repository, None);
    assert!(service.list_libraries().await.unwrap().is_empty());
    assert!(!temp_dir.path().join("INDEX.md").exists());
    assert_eq!(service.read_index().await.unwrap(), None);
}

#[tokio::test]
async fn test_service_search_report() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{ "title": "FastAPI", "id": "/tiangolo/fastapi", "description": "web" }]
        })))
        .mount(&server)
        .await;
    let temp_dir = tempfile::tempdir().unwrap();
    let service = service_for(&server, temp_dir.path());

    let report = service.search("fastapi", None).await.unwrap();
    assert_eq!(report.message, "Found 1 libraries matching 'fastapi'");
    assert!(report.formatted_text.contains("- Context7-compatible library ID: /tiangolo/fastapi"));
}
