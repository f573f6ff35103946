//! Sitemap XML parsing.
//!
//! Elements are matched by local name, so documents with or without the
//! `http://www.sitemaps.org/schemas/sitemap/0.9` namespace parse the same.

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::types::sitemap::{parse_lastmod, SitemapEntry};

/// A parsed sitemap document.
#[derive(Debug, Clone, PartialEq)]
pub enum SitemapDocument {
    /// `<sitemapindex>`: nested sitemap locations to fetch next
    Index(Vec<String>),
    /// `<urlset>`: page entries
    UrlSet(Vec<SitemapEntry>),
}

/// Errors from sitemap parsing.
#[derive(Debug, thiserror::Error)]
pub enum SitemapParseError {
    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("unexpected root element: {0}")]
    UnexpectedRoot(String),

    #[error("document has no root element")]
    Empty,
}

#[derive(Default)]
struct Pending {
    loc: String,
    lastmod: String,
    changefreq: String,
    priority: String,
}

impl Pending {
    fn into_entry(self) -> Option<SitemapEntry> {
        if self.loc.is_empty() {
            return None;
        }
        Some(SitemapEntry {
            location: self.loc,
            last_modified: parse_lastmod(&self.lastmod),
            change_frequency: self.changefreq.parse().ok(),
            priority: self.priority.trim().parse::<f32>().ok(),
        })
    }
}

/// Parse one sitemap document, deciding index vs. urlset from its root.
pub fn parse_sitemap(xml: &str) -> Result<SitemapDocument, SitemapParseError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut root: Option<String> = None;
    // 1 = root, 2 = <url>/<sitemap>, 3 = their fields
    let mut depth = 0usize;
    let mut in_item = false;
    let mut current_tag = String::new();
    let mut pending = Pending::default();
    let mut nested = Vec::new();
    let mut entries = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                depth += 1;
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                match root.as_deref() {
                    None => {
                        if name != "urlset" && name != "sitemapindex" {
                            return Err(SitemapParseError::UnexpectedRoot(name));
                        }
                        root = Some(name);
                    }
                    Some(_) if depth == 2 && (name == "url" || name == "sitemap") => {
                        in_item = true;
                        pending = Pending::default();
                    }
                    // Extension children such as <image:loc> sit deeper and are ignored
                    Some(_) if in_item && depth == 3 => current_tag = name,
                    Some(_) => current_tag.clear(),
                }
            }
            Event::Empty(e) if root.is_none() => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                return match name.as_str() {
                    "urlset" => Ok(SitemapDocument::UrlSet(Vec::new())),
                    "sitemapindex" => Ok(SitemapDocument::Index(Vec::new())),
                    _ => Err(SitemapParseError::UnexpectedRoot(name)),
                };
            }
            Event::End(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                match name.as_str() {
                    "url" if in_item && depth == 2 => {
                        in_item = false;
                        if let Some(entry) = std::mem::take(&mut pending).into_entry() {
                            entries.push(entry);
                        }
                    }
                    "sitemap" if in_item && depth == 2 => {
                        in_item = false;
                        let loc = std::mem::take(&mut pending).loc;
                        if !loc.is_empty() {
                            nested.push(loc);
                        }
                    }
                    _ => {}
                }
                current_tag.clear();
                depth = depth.saturating_sub(1);
            }
            Event::Text(e) if in_item => {
                let text = e.unescape().unwrap_or_default();
                set_field(&mut pending, &current_tag, text.trim());
            }
            Event::CData(e) if in_item => {
                let text = String::from_utf8_lossy(&e.into_inner()).to_string();
                set_field(&mut pending, &current_tag, text.trim());
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    match root.as_deref() {
        Some("sitemapindex") => Ok(SitemapDocument::Index(nested)),
        Some(_) => Ok(SitemapDocument::UrlSet(entries)),
        None => Err(SitemapParseError::Empty),
    }
}

fn set_field(pending: &mut Pending, tag: &str, text: &str) {
    let slot = match tag {
        "loc" => &mut pending.loc,
        "lastmod" => &mut pending.lastmod,
        "changefreq" => &mut pending.changefreq,
        "priority" => &mut pending.priority,
        _ => return,
    };
    slot.push_str(text);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::sitemap::ChangeFrequency;

    #[test]
    fn test_parse_urlset() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
        <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
          <url>
            <loc>https://gym.pe/</loc>
            <priority>1.0</priority>
          </url>
          <url>
            <loc>https://gym.pe/precios</loc>
            <lastmod>2024-01-15</lastmod>
            <changefreq>weekly</changefreq>
          </url>
        </urlset>"#;

        let SitemapDocument::UrlSet(entries) = parse_sitemap(xml).unwrap() else {
            panic!("expected urlset");
        };
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].location, "https://gym.pe/");
        assert_eq!(entries[0].priority, Some(1.0));
        assert!(entries[0].last_modified.is_none());
        assert_eq!(entries[1].change_frequency, Some(ChangeFrequency::Weekly));
        assert!(entries[1].last_modified.is_some());
    }

    #[test]
    fn test_parse_index_with_prefix_namespace() {
        let xml = r#"<?xml version="1.0"?>
        <sm:sitemapindex xmlns:sm="http://www.sitemaps.org/schemas/sitemap/0.9">
          <sm:sitemap><sm:loc>https://gym.pe/page-sitemap.xml</sm:loc></sm:sitemap>
          <sm:sitemap><sm:loc><![CDATA[https://gym.pe/post-sitemap.xml]]></sm:loc></sm:sitemap>
        </sm:sitemapindex>"#;

        assert_eq!(
            parse_sitemap(xml).unwrap(),
            SitemapDocument::Index(vec![
                "https://gym.pe/page-sitemap.xml".to_string(),
                "https://gym.pe/post-sitemap.xml".to_string(),
            ])
        );
    }

    #[test]
    fn test_escaped_loc_is_unescaped() {
        let xml = r#"<urlset><url><loc>https://gym.pe/?a=1&amp;b=2</loc></url></urlset>"#;
        let SitemapDocument::UrlSet(entries) = parse_sitemap(xml).unwrap() else {
            panic!("expected urlset");
        };
        assert_eq!(entries[0].location, "https://gym.pe/?a=1&b=2");
    }

    #[test]
    fn test_image_extension_does_not_leak_into_loc() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
        <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9"
                xmlns:image="http://www.google.com/schemas/sitemap-image/1.1">
          <url>
            <loc>https://gym.pe/sedes</loc>
            <image:image>
              <image:loc>https://static.wixstatic.com/media/a.jpg</image:loc>
              <image:title>Sede Surco</image:title>
            </image:image>
            <lastmod>2024-05-01</lastmod>
          </url>
          <url>
            <image:image><image:loc>https://static.wixstatic.com/media/b.jpg</image:loc></image:image>
            <loc>https://gym.pe/precios</loc>
          </url>
        </urlset>"#;

        let SitemapDocument::UrlSet(entries) = parse_sitemap(xml).unwrap() else {
            panic!("expected urlset");
        };
        let locations: Vec<&str> = entries.iter().map(|e| e.location.as_str()).collect();
        assert_eq!(locations, vec!["https://gym.pe/sedes", "https://gym.pe/precios"]);
        assert!(entries[0].last_modified.is_some());
    }

    #[test]
    fn test_rejects_html_and_garbage() {
        assert!(matches!(
            parse_sitemap("<html><body>404</body></html>"),
            Err(SitemapParseError::UnexpectedRoot(_))
        ));
        assert!(parse_sitemap("").is_err());
        assert!(parse_sitemap("<urlset><url><loc>x</url>").is_err());
    }

    #[test]
    fn test_bad_metadata_becomes_none() {
        let xml = r#"<urlset><url>
            <loc>https://gym.pe/a</loc>
            <lastmod>yesterday</lastmod>
            <changefreq>sometimes</changefreq>
            <priority>high</priority>
        </url></urlset>"#;
        let SitemapDocument::UrlSet(entries) = parse_sitemap(xml).unwrap() else {
            panic!("expected urlset");
        };
        assert_eq!(entries[0], SitemapEntry::new("https://gym.pe/a"));
    }
}
