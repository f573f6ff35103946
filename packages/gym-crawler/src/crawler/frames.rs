//! Frame selection: which embedded documents are worth extracting.

use std::collections::HashSet;

use url::Url;

/// Whether a frame URL belongs to a denylisted third party.
///
/// Entries with a dot match the host or any subdomain of it; bare words
/// match anywhere in the host. URLs without a host are skipped.
pub fn should_skip_frame(frame_url: &str, skip_domains: &[String]) -> bool {
    let Some(host) = Url::parse(frame_url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
    else {
        return true;
    };

    skip_domains.iter().any(|entry| {
        let entry = entry.trim().to_ascii_lowercase();
        if entry.is_empty() {
            false
        } else if entry.contains('.') {
            host == entry || host.ends_with(&format!(".{entry}"))
        } else {
            host.contains(&entry)
        }
    })
}

/// Frames to crawl, in document order.
///
/// Drops blank and `srcdoc` frames, non-HTTP schemes, the main document
/// itself, denylisted hosts and repeats.
pub fn select_frames(frame_urls: &[String], main_url: &str, skip_domains: &[String]) -> Vec<String> {
    let main = normalize(main_url);
    let mut seen = HashSet::new();

    frame_urls
        .iter()
        .map(|u| u.trim())
        .filter(|u| !u.is_empty() && !u.starts_with("about:"))
        .filter(|u| u.starts_with("http://") || u.starts_with("https://"))
        .filter(|u| normalize(u) != main)
        .filter(|u| !should_skip_frame(u, skip_domains))
        .filter(|u| seen.insert(normalize(u)))
        .map(str::to_string)
        .collect()
}

fn normalize(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => url.to_string(),
    }
}
