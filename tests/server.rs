use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use vaultqa::answer::Answerer;
use vaultqa::config::parse_config;
use vaultqa::formatter::{create_formatter, DisabledFormatter, Formatter};
use vaultqa::server::build_router;
use vaultqa::state::IndexHandle;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn setup_vault() -> TempDir {
    let tmp = TempDir::new().unwrap();
    write(
        tmp.path(),
        "GS1DK Services Index.md",
        "# Services\n- [[GS1 Basis|Basis abonnement]]\n",
    );
    write(
        tmp.path(),
        "services/GS1 Basis.md",
        "# GS1 Basis\nGrundlæggende medlemskab.\n## Priser\nBasic package: 500 kr\n",
    );
    write(tmp.path(), "misc/Office.md", "# Office\nThe office is in Copenhagen.\n");
    tmp
}

/// Start the router on an ephemeral port and return its base URL.
async fn start(vault: &Path, formatter: Option<Arc<dyn Formatter>>) -> String {
    let config = parse_config(&format!(
        "[vault]\nroot = {:?}\n[formatter]\nbackend = \"disabled\"\n",
        vault.display().to_string()
    ))
    .unwrap();
    let lexicon = Arc::new(config.lexicon().unwrap());
    let (handle, _) = IndexHandle::build(config.vault.clone(), lexicon).unwrap();
    let formatter = formatter.unwrap_or_else(|| create_formatter(&config.formatter).unwrap());
    let answerer = Arc::new(Answerer::new(
        Arc::new(handle),
        formatter,
        config.retrieval.clone(),
    ));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = build_router(answerer);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_health_reports_sections() {
    let vault = setup_vault();
    let base = start(vault.path(), None).await;

    let resp = reqwest::get(format!("{}/health", base)).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["sections"], 4);
    assert!(body["built_at"].is_string());
}

#[tokio::test]
async fn test_chat_answers_with_records_and_sources() {
    let vault = setup_vault();
    let base = start(vault.path(), None).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/chat", base))
        .json(&serde_json::json!({ "text": "Hvad koster Basis abonnement?" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["outcome"], "facts");
    assert!(body["reply"].as_str().unwrap().contains("Basic package: 500 kr"));
    assert_eq!(
        body["sources"][0],
        "services/GS1 Basis.md#Priser (lines 4-4)"
    );
    assert_eq!(body["records"][0]["confidence"], "high");
}

#[tokio::test]
async fn test_chat_not_found_and_history() {
    let vault = setup_vault();
    let base = start(vault.path(), None).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/chat", base))
        .json(&serde_json::json!({
            "text": "Tell me about zebras",
            "history": [{ "role": "user", "content": "hej" }, { "role": "assistant", "content": "Hej!" }],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["outcome"], "not-found");
    assert_eq!(body["reply"], "I can't find that in the vault.");
    assert_eq!(body["sources"], serde_json::json!([]));
}

#[tokio::test]
async fn test_chat_empty_text_is_bad_request() {
    let vault = setup_vault();
    let base = start(vault.path(), None).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/chat", base))
        .json(&serde_json::json!({ "text": "   " }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");
}

struct Broken;

#[async_trait::async_trait]
impl Formatter for Broken {
    fn name(&self) -> &str {
        "broken"
    }

    async fn format(
        &self,
        _request: &vaultqa::formatter::FormatRequest<'_>,
    ) -> anyhow::Result<String> {
        anyhow::bail!("model offline")
    }
}

#[tokio::test]
async fn test_formatter_failure_is_503_with_records() {
    let vault = setup_vault();
    let base = start(vault.path(), Some(Arc::new(Broken))).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/chat", base))
        .json(&serde_json::json!({ "text": "Hvad koster Basis abonnement?" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 503);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "formatting_unavailable");
    assert_eq!(body["error"]["message"], "model offline");
    assert_eq!(body["records"][0]["fields"]["price"], "500 kr");
    assert_eq!(body["sources"][0], "services/GS1 Basis.md#Priser (lines 4-4)");
}

#[tokio::test]
async fn test_identity_does_not_need_formatter() {
    let vault = setup_vault();
    let base = start(vault.path(), Some(Arc::new(Broken))).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/chat", base))
        .json(&serde_json::json!({ "text": "Hvem er du?" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["outcome"], "identity");
    assert_eq!(body["reply"], "Jeg hedder Dory, jeg er din digitale praktikant.");
}

#[tokio::test]
async fn test_rebuild_picks_up_new_notes() {
    let vault = setup_vault();
    let base = start(vault.path(), Some(Arc::new(DisabledFormatter))).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/index/rebuild", base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let report: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(report["unchanged"], true);

    write(vault.path(), "misc/Parking.md", "# Parking\nNo parking on site.\n");
    let resp = client
        .post(format!("{}/index/rebuild", base))
        .send()
        .await
        .unwrap();
    let report: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(report["unchanged"], false);
    assert_eq!(report["sections"], 5);

    let health: serde_json::Value = reqwest::get(format!("{}/health", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["sections"], 5);
}

#[tokio::test]
async fn test_classify_endpoint() {
    let vault = setup_vault();
    let base = start(vault.path(), None).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/classify", base))
        .json(&serde_json::json!({ "text": "Hvad koster Basis abonnement?" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["route"], "price");
    assert_eq!(body["is_info_seeking"], true);
    assert_eq!(body["references_known_term"], true);
}
