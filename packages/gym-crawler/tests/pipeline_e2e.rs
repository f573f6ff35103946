//! End-to-end runs over a mock site: wiremock serves robots.txt and the
//! sitemap, `MockBrowser` serves rendered pages, `MockAI` answers prompts.

use gym_crawler::testing::{MemorySink, MockAI, MockBrowser, MockDocument};
use gym_crawler::{
    CrawlerConfig, ExtractorConfig, FactRecord, GymPipeline, GymStatus, GymTarget,
    MergeStrategy, ModelSelector, PipelineConfig, ScrollConfig,
};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LOCATION_PAGE: &str =
    "<html><body><nav>Menu</nav><main><h1>Sede Miraflores: Av. Larco 123</h1></main></body></html>";
const PRICING_PAGE: &str =
    "<html><body><main><table><tr><td>Plan Anual S/ 1500</td></tr></table></main></body></html>";
const HOME_PAGE: &str =
    "<html><body><main><p>Bienvenidos. Sede Miraflores: Av. Larco 123</p></main></body></html>";

const LOCATION_JSON: &str = r#"{
  "locations": [{"search_summary": "", "full_address": "Av. Larco 123", "district": "Miraflores"}],
  "prices": [], "schedules": [], "disciplines": []
}"#;
const PRICE_JSON: &str = r#"{
  "locations": [], "schedules": [], "disciplines": [],
  "prices": [{"plan_description": "Plan Anual", "value": "S/ 1500", "currency": "PEN", "recurrence": "anual"}]
}"#;
const MERGED_JSON: &str = r#"{
  "gym": "Zenda",
  "locations": [
    {"search_summary": "Sede Miraflores en Av. Larco 123.", "full_address": "Av. Larco 123", "district": "Miraflores"},
    {"search_summary": "Sede Miraflores.", "full_address": "av. larco 123", "district": "MIRAFLORES"}
  ],
  "prices": [{"search_summary": "", "plan_description": "Plan Anual", "value": 1500, "currency": "PEN", "recurrence": "anual"}],
  "schedules": [],
  "disciplines": []
}"#;

async fn mock_site() -> MockServer {
    let server = MockServer::start().await;
    let uri = server.uri();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(format!("User-agent: *\nDisallow: /admin\nSitemap: {uri}/sitemap.xml\n")),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>{uri}/sedes</loc><lastmod>2024-10-01</lastmod><changefreq>monthly</changefreq></url>
  <url><loc>{uri}/precios</loc></url>
  <url><loc>https://cdn.example.com/sedes</loc></url>
</urlset>"#
        )))
        .mount(&server)
        .await;

    server
}

fn browser_for(uri: &str) -> MockBrowser {
    MockBrowser::new()
        .with_page(format!("{uri}/sedes"), LOCATION_PAGE)
        .with_page(format!("{uri}/precios"), PRICING_PAGE)
        .with_page(uri, HOME_PAGE)
}

fn ai_for(uri: &str) -> MockAI {
    MockAI::new()
        .with_response(
            ModelSelector::Categorizer,
            format!(
                r#"{{"locations": ["{uri}/sedes"], "pricing": ["{uri}/precios"], "schedules": [], "disciplines": []}}"#
            ),
        )
        .with_response(ModelSelector::ScheduleClassifier, "NO")
        .with_response_for(ModelSelector::Extraction, "Plan Anual S/ 1500", PRICE_JSON)
        .with_response_for(ModelSelector::Extraction, "Sede Miraflores:", LOCATION_JSON)
        .with_response(ModelSelector::Merger, MERGED_JSON)
}

fn config(strategy: MergeStrategy) -> PipelineConfig {
    PipelineConfig::default()
        .with_merge_strategy(strategy)
        .with_crawler(
            CrawlerConfig::default()
                .with_scroll(ScrollConfig::default().with_max_steps(2).with_pause(Duration::ZERO)),
        )
        .with_extractor(ExtractorConfig::default())
}

async fn run_two_page_site(strategy: MergeStrategy) {
    let server = mock_site().await;
    let uri = server.uri();
    let ai = ai_for(&uri);
    let browser = browser_for(&uri);

    let pipeline = GymPipeline::new(ai, MemorySink::new(), config(strategy)).unwrap();
    let reports = pipeline
        .run(&browser, &[GymTarget::new("Zenda", &uri)], &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(reports.len(), 1);
    let report = &reports[0];
    assert!(matches!(report.status, GymStatus::Stored { .. }), "{report:?}");
    assert_eq!(report.urls_discovered, 2, "cross-host entry must be filtered");
    assert_eq!(report.urls_attempted, 3, "two categorized pages plus the homepage");
    assert!(report.failed_urls.is_empty());
    assert!(!report.merge_fell_back);

    let datasets = pipeline.sink().datasets();
    assert_eq!(datasets.len(), 1);
    let dataset = &datasets[0];
    assert_eq!(dataset.gym, "Zenda");
    assert_eq!(dataset.locations.len(), 1);
    assert_eq!(dataset.prices.len(), 1);
    assert!(dataset.schedules.is_empty());
    assert!(dataset.locations.iter().all(|l| !l.search_summary().trim().is_empty()));
    assert!(dataset.prices.iter().all(|p| !p.search_summary().trim().is_empty()));
    assert_eq!(dataset.prices[0].value, Some(1500.0));
}

#[tokio::test]
async fn test_two_page_site_deterministic_merge() {
    run_two_page_site(MergeStrategy::Deterministic).await;
}

#[tokio::test]
async fn test_two_page_site_llm_merge() {
    run_two_page_site(MergeStrategy::Llm).await;
}

#[tokio::test]
async fn test_llm_merge_garbage_falls_back_to_deterministic() {
    let server = mock_site().await;
    let uri = server.uri();
    let ai = ai_for(&uri).with_response_for(ModelSelector::Merger, "Zenda", "I could not merge this data");
    let browser = browser_for(&uri);

    let pipeline = GymPipeline::new(ai, MemorySink::new(), config(MergeStrategy::Llm)).unwrap();
    let reports = pipeline
        .run(&browser, &[GymTarget::new("Zenda", &uri)], &CancellationToken::new())
        .await
        .unwrap();

    let report = &reports[0];
    assert!(report.merge_fell_back);
    assert_eq!(report.degraded_raw_output.as_deref(), Some("I could not merge this data"));
    let dataset = pipeline.sink().get("Zenda").unwrap();
    assert_eq!(dataset.locations.len(), 1);
    assert_eq!(dataset.prices.len(), 1);
}

#[tokio::test]
async fn test_robots_without_sitemap_skips_gym_and_continues() {
    let bare = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow:\n"))
        .mount(&bare)
        .await;

    let site = mock_site().await;
    let uri = site.uri();
    let ai = ai_for(&uri);
    let browser = browser_for(&uri);

    let pipeline =
        GymPipeline::new(ai, MemorySink::new(), config(MergeStrategy::Deterministic)).unwrap();
    let reports = pipeline
        .run(
            &browser,
            &[
                GymTarget::new("Sin Sitemap", bare.uri()),
                GymTarget::new("Zenda", &uri),
            ],
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(reports.len(), 2);
    assert!(matches!(reports[0].status, GymStatus::Skipped { .. }));
    assert_eq!(reports[0].urls_discovered, 0);
    assert!(matches!(reports[1].status, GymStatus::Stored { .. }));
    assert!(pipeline.sink().get("Sin Sitemap").is_none());
    assert_eq!(pipeline.ai().calls_for(ModelSelector::Categorizer).len(), 1);
}

#[tokio::test]
async fn test_denylisted_iframe_never_reaches_extractor() {
    let server = mock_site().await;
    let uri = server.uri();
    let stripe = "https://js.stripe.com/v3/checkout";
    let widget = "https://app.glofox.com/schedule-widget";

    let browser = MockBrowser::new()
        .with_document(
            format!("{uri}/precios"),
            MockDocument::new(PRICING_PAGE).with_frames([stripe, widget]),
        )
        .with_document(stripe, MockDocument::new("<body><p>Pay now card number</p></body>"))
        .with_document(widget, MockDocument::new("<body><p>Plan Anual S/ 1500 widget</p></body>"))
        .with_page(format!("{uri}/sedes"), LOCATION_PAGE)
        .with_page(&uri, HOME_PAGE);
    let ai = ai_for(&uri);

    let pipeline =
        GymPipeline::new(ai, MemorySink::new(), config(MergeStrategy::Deterministic)).unwrap();
    let reports = pipeline
        .run(&browser, &[GymTarget::new("Zenda", &uri)], &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(reports[0].frames_extracted, 1);
    assert!(!browser.navigations().iter().any(|n| n == stripe));
    let extraction_prompts = pipeline.ai().calls_for(ModelSelector::Extraction);
    assert!(extraction_prompts.iter().any(|c| c.prompt.contains(widget)));
    assert!(extraction_prompts
        .iter()
        .all(|c| !c.prompt.contains(stripe) && !c.prompt.contains("card number")));
}

#[tokio::test]
async fn test_override_urls_replace_sitemap_discovery() {
    let server = MockServer::start().await;
    let uri = server.uri();
    let ai = ai_for(&uri);
    let browser = browser_for(&uri);

    let config = config(MergeStrategy::Deterministic)
        .with_url_overrides([format!("{uri}/precios"), "https://other.example/precios".to_string()]);
    let pipeline = GymPipeline::new(ai, MemorySink::new(), config).unwrap();
    let reports = pipeline
        .run(&browser, &[GymTarget::new("Zenda", &uri)], &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(reports[0].urls_discovered, 1);
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_cancelled_run_stores_nothing() {
    let server = mock_site().await;
    let uri = server.uri();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let pipeline = GymPipeline::new(
        ai_for(&uri),
        MemorySink::new(),
        config(MergeStrategy::Deterministic),
    )
    .unwrap();
    let reports = pipeline
        .run(&browser_for(&uri), &[GymTarget::new("Zenda", &uri)], &cancel)
        .await
        .unwrap();

    assert!(reports.is_empty());
    assert_eq!(pipeline.sink().write_count(), 0);
}
