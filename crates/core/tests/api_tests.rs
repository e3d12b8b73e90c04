//! Library API integration tests
use std::sync::Arc;

use gleaner_core::config::ExtraField;
use gleaner_core::*;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ARTICLE_TITLE: &str = "City Council Approves New Riverside Park";

fn get_fixture(name: &str) -> String {
    std::fs::read_to_string(format!("../../tests/fixtures/{}", name)).unwrap()
}

fn img_sources(html: &str) -> Vec<String> {
    let doc = Document::parse_fragment(html);
    doc.select("img").unwrap().iter().filter_map(|img| img.attr("src").map(str::to_string)).collect()
}

#[test]
fn test_extract_article_api() {
    let html = get_fixture("news_article.html");
    let options = ExtractOptions::with_url("https://harbordaily.example/local/riverside-park");
    let article = extract_article(&html, &options).expect("should extract");

    assert_eq!(article.title, ARTICLE_TITLE);
    assert_eq!(article.byline.as_deref(), Some("Jane Rivera"));
    assert_eq!(article.site_name.as_deref(), Some("Harbor Daily"));
    assert!(article.content.contains("abandoned rail yard"));
    assert!(!article.content.contains("Copyright Harbor Daily"));
    assert!(!article.content.contains("dataLayer"));
    assert!(article.length >= 250);
    assert_eq!(article.length, article.text_content.chars().count());
}

#[test]
fn test_can_extract_article() {
    assert!(can_extract_article(&get_fixture("news_article.html")));
    assert!(!can_extract_article(&get_fixture("empty_content.html")));
    assert!(!can_extract_article("<p>short</p>"));
}

#[test]
fn test_empty_page_is_not_extracted() {
    assert!(extract_article(&get_fixture("empty_content.html"), &ExtractOptions::default()).is_none());
}

#[test]
fn test_refined_article() {
    let html = get_fixture("news_article.html");
    let options = ExtractOptions::with_url("https://harbordaily.example/local/riverside-park");
    let article = Readability::new().extract_refined(&html, &options).expect("should extract");

    assert!(article.content.starts_with(&format!("<h1>{ARTICLE_TITLE}</h1>")));
    assert_eq!(article.content.matches("<h1>").count(), 1);

    let sources = img_sources(&article.content);
    assert!(sources.iter().all(|src| !src.contains("/avatars/")));
    assert!(sources.iter().all(|src| !src.contains("/thumbs/")));
    assert!(sources.iter().filter(|src| src.contains("riverside-1200.jpg")).count() <= 1);
    assert!(article.content.contains("riverside-1200.jpg"));
}

#[test]
fn test_readability_builder() {
    let config = ReadabilityConfig::builder().min_score(10.0).char_threshold(300).min_text_length(100).build();
    let reader = Readability::with_config(config);
    let article = reader.extract(&get_fixture("news_article.html"), &ExtractOptions::default());
    assert!(article.is_some());
}

#[test]
fn test_selector_extraction() {
    let html = get_fixture("news_article.html");
    let rules = vec![
        SelectorItem::new("article", Operation::Include, 0),
        SelectorItem::new(".author-bio, figure, noscript, iframe", Operation::Exclude, 1),
    ];
    let content = apply_selector_config(&html, &rules);

    assert!(content.starts_with("<article"));
    assert!(content.contains("restored wetland"));
    assert!(!content.contains("By Jane Rivera"));
    assert!(!content.contains("<figure"));
    assert!(!content.contains("Related stories"));
}

#[test]
fn test_output_formats() {
    let html = get_fixture("news_article.html");
    let article = extract_article(&html, &ExtractOptions::default()).unwrap();

    let json: serde_json::Value = serde_json::from_str(&article.to_format(OutputFormat::Json).unwrap()).unwrap();
    assert_eq!(json["title"], ARTICLE_TITLE);
    assert!(json.get("textContent").is_some());
    assert!(json.get("siteName").is_some());

    let text = article.to_format(OutputFormat::PlainText).unwrap();
    assert!(!text.contains('<'));
}

#[test]
fn test_proxy_rewrite_of_refined_content() {
    let html = get_fixture("news_article.html");
    let options = ExtractOptions::with_url("https://harbordaily.example/local/riverside-park");
    let article = Readability::new().extract_refined(&html, &options).unwrap();
    let presented = rewrite_through_proxy(&article.content, "http://127.0.0.1:7000/proxy");

    for src in img_sources(&presented) {
        assert!(src.starts_with("http://127.0.0.1:7000/proxy?url=") || src.starts_with("data:"), "{src}");
    }
}

#[tokio::test]
async fn test_authenticated_load_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string(get_fixture("login_page.html")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/session/create"))
        .and(body_string_contains("authenticity_token=tok-7f3a9c"))
        .and(body_string_contains("email=ada%40example.com"))
        .respond_with(ResponseTemplate::new(200).insert_header("set-cookie", "sid=s3ss10n; Path=/"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/local/riverside-park"))
        .and(header("cookie", "sid=s3ss10n"))
        .respond_with(ResponseTemplate::new(200).set_body_string(get_fixture("news_article.html")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/logout"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET")).respond_with(ResponseTemplate::new(401)).mount(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(ConfigStore::open(FileBackend::new(dir.path())).unwrap());
    let mut auth = FeedAuthConfig::new(format!("{}/login", server.uri()), "ada@example.com", "hunter2");
    auth.username_field = "email".into();
    auth.password_field = "pass".into();
    auth.extra_fields.push(ExtraField::new("authenticity_token", ""));
    auth.logout_url = Some(format!("{}/logout", server.uri()));
    store.save_auth_config("harbor", &auth, "master-secret").unwrap();

    let transport = Arc::new(HttpTransport::new(FetchConfig::default()).unwrap());
    let loader = ArticleLoader::new(transport, store);
    let sink = session::RecordingSink::new();
    let request = LoadRequest::new("harbor", format!("{}/local/riverside-park", server.uri()), ExtractionMode::Readability)
        .with_master_secret("master-secret");

    let LoadOutcome::Displayed(view) = loader.load(&request, &sink).await else {
        panic!("expected the article to be displayed");
    };
    assert_eq!(view.title.as_deref(), Some(ARTICLE_TITLE));
    assert!(view.content.contains("restored wetland"));
    assert_eq!(sink.states().last(), Some(&LoadState::Done));
    assert!(sink.states().contains(&LoadState::LoggingOut));
}

#[tokio::test]
async fn test_load_without_credentials_asks_for_them() {
    let server = MockServer::start().await;
    Mock::given(method("GET")).respond_with(ResponseTemplate::new(401)).mount(&server).await;

    let store = Arc::new(ConfigStore::open(MemoryBackend::new()).unwrap());
    let transport = Arc::new(HttpTransport::new(FetchConfig::default()).unwrap());
    let loader = ArticleLoader::new(transport, store);
    let sink = session::RecordingSink::new();
    let request = LoadRequest::new("intranet", format!("{}/memo", server.uri()), ExtractionMode::Readability);

    let outcome = loader.load(&request, &sink).await;
    assert!(matches!(outcome, LoadOutcome::CredentialsNeeded(ref domain) if *domain == server.uri()));
}
