use gym_crawler::{ChangeFrequency, ResolverConfig, SitemapResolver};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn serve(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

fn urlset(urls: &[String]) -> String {
    let body: String = urls
        .iter()
        .map(|u| format!("<url><loc>{u}</loc><changefreq>weekly</changefreq></url>"))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{body}</urlset>"#
    )
}

fn resolver() -> SitemapResolver {
    SitemapResolver::new(ResolverConfig::default()).unwrap()
}

#[tokio::test]
async fn test_index_with_overlapping_children_returns_union_once() {
    let server = MockServer::start().await;
    let uri = server.uri();

    serve(&server, "/robots.txt", format!("Sitemap: {uri}/sitemap_index.xml\n")).await;
    serve(
        &server,
        "/sitemap_index.xml",
        format!(
            r#"<?xml version="1.0"?>
<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <sitemap><loc>{uri}/pages.xml</loc></sitemap>
  <sitemap><loc>{uri}/sedes.xml</loc></sitemap>
  <sitemap><loc>{uri}/pages.xml</loc></sitemap>
</sitemapindex>"#
        ),
    )
    .await;
    serve(
        &server,
        "/pages.xml",
        urlset(&[format!("{uri}/"), format!("{uri}/precios"), format!("{uri}/horarios")]),
    )
    .await;
    serve(
        &server,
        "/sedes.xml",
        urlset(&[format!("{uri}/precios"), format!("{uri}/sedes/miraflores")]),
    )
    .await;

    let entries = resolver().resolve(&uri).await;
    let locations: Vec<&str> = entries.iter().map(|e| e.location.as_str()).collect();

    assert_eq!(
        locations,
        vec![
            format!("{uri}/"),
            format!("{uri}/precios"),
            format!("{uri}/horarios"),
            format!("{uri}/sedes/miraflores"),
        ]
    );
    assert!(entries
        .iter()
        .all(|e| e.change_frequency == Some(ChangeFrequency::Weekly)));

    let child_fetches = server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == "/pages.xml")
        .count();
    assert_eq!(child_fetches, 1);
}

#[tokio::test]
async fn test_malformed_child_does_not_affect_siblings() {
    let server = MockServer::start().await;
    let uri = server.uri();

    serve(
        &server,
        "/robots.txt",
        format!("Sitemap: {uri}/broken.xml\nSitemap: {uri}/good.xml\n"),
    )
    .await;
    serve(&server, "/broken.xml", "<urlset><url><loc>".to_string()).await;
    serve(&server, "/good.xml", urlset(&[format!("{uri}/sedes")])).await;

    let entries = resolver().resolve(&uri).await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].location, format!("{uri}/sedes"));
}

#[tokio::test]
async fn test_missing_robots_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    assert!(resolver().resolve(&server.uri()).await.is_empty());
}

#[tokio::test]
async fn test_self_referencing_index_terminates() {
    let server = MockServer::start().await;
    let uri = server.uri();

    serve(&server, "/robots.txt", format!("Sitemap: {uri}/index.xml\n")).await;
    serve(
        &server,
        "/index.xml",
        format!(
            r#"<sitemapindex><sitemap><loc>{uri}/index.xml</loc></sitemap><sitemap><loc>{uri}/pages.xml</loc></sitemap></sitemapindex>"#
        ),
    )
    .await;
    serve(&server, "/pages.xml", urlset(&[format!("{uri}/precios")])).await;

    let entries = resolver().resolve(&uri).await;
    assert_eq!(entries.len(), 1);
}
