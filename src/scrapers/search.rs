//! Search-result page parsing and candidate filtering.

use scraper::{Html, Selector};
use tracing::debug;

use super::RetrievalError;

/// Appended to every supplier/product query.
pub const QUERY_SUFFIX: &str = "specifications";

/// Social and video platforms never used as a content source.
pub const DENIED_DOMAINS: &[&str] = &["facebook.com", "twitter.com", "youtube.com", "instagram.com"];

/// Build the search query for a supplier/product pair.
pub fn build_query(supplier: &str, product: &str) -> String {
    format!("{} {} {}", supplier.trim(), product.trim(), QUERY_SUFFIX)
}

/// Check if URL belongs to the target domain or one of its subdomains.
pub fn url_matches_domain(url: &str, target_domain: &str) -> bool {
    if let Ok(parsed) = url::Url::parse(url) {
        if let Some(host) = parsed.host_str() {
            // A trailing dot names the same host in absolute form
            let host = host.trim_end_matches('.').to_ascii_lowercase();
            let target = target_domain.trim_end_matches('.').to_ascii_lowercase();
            return host == target || host.ends_with(&format!(".{}", target));
        }
    }
    false
}

/// True if the URL points at a denylisted platform.
pub fn is_denied(url: &str) -> bool {
    DENIED_DOMAINS.iter().any(|d| url_matches_domain(url, d))
}

/// Decoded value of `key` in the query string of `href`.
fn query_value(href: &str, key: &str) -> Option<String> {
    let query = href.split_once('?')?.1;
    query.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        if k != key {
            return None;
        }
        urlencoding::decode(&v.replace('+', " "))
            .ok()
            .map(|s| s.into_owned())
    })
}

/// Extract the target URL from a result href.
///
/// DuckDuckGo wraps results as `//duckduckgo.com/l/?uddg=<url>` and Google as
/// `/url?q=<url>`; direct links are kept, other relative links are dropped.
pub fn extract_result_url(href: &str) -> Option<String> {
    let href = href.trim();

    let unwrapped = if href.contains("duckduckgo.com/l/") || href.starts_with("/l/?") {
        query_value(href, "uddg")?
    } else if href.starts_with("/url?") || href.contains("google.com/url?") {
        query_value(href, "q")?
    } else {
        href.to_string()
    };

    if unwrapped.starts_with("http://") || unwrapped.starts_with("https://") {
        Some(unwrapped)
    } else if unwrapped.starts_with("//") {
        Some(format!("https:{}", unwrapped))
    } else {
        None
    }
}

/// Domain of the search engine itself, without `www.`/`html.` prefixes.
fn engine_domain(search_url: &str) -> Option<(String, Option<u16>)> {
    let parsed = url::Url::parse(search_url).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    let domain = host
        .strip_prefix("www.")
        .or_else(|| host.strip_prefix("html."))
        .unwrap_or(&host)
        .to_string();
    Some((domain, parsed.port_or_known_default()))
}

fn is_engine_link(url: &str, engine: &Option<(String, Option<u16>)>) -> bool {
    let Some((domain, port)) = engine else {
        return false;
    };
    let same_port = url::Url::parse(url)
        .map(|u| u.port_or_known_default() == *port)
        .unwrap_or(false);
    same_port && url_matches_domain(url, domain)
}

/// Parse candidate result URLs from a search page, in page order.
///
/// Reads `a.result__a` anchors; when there are none, every `a[href]` is
/// considered. Links back to the search engine are discarded, as are
/// duplicates. The denylist is applied separately.
pub fn parse_result_links(html: &str, search_url: &str) -> Result<Vec<String>, RetrievalError> {
    let document = Html::parse_document(html);

    let result_selector = Selector::parse("a.result__a")
        .map_err(|e| RetrievalError::Parse(format!("Failed to parse selector: {:?}", e)))?;
    let any_link_selector = Selector::parse("a[href]")
        .map_err(|e| RetrievalError::Parse(format!("Failed to parse selector: {:?}", e)))?;

    let mut hrefs: Vec<&str> = document
        .select(&result_selector)
        .filter_map(|el| el.value().attr("href"))
        .collect();
    if hrefs.is_empty() {
        hrefs = document
            .select(&any_link_selector)
            .filter_map(|el| el.value().attr("href"))
            .collect();
    }

    let engine = engine_domain(search_url);
    let mut seen = std::collections::HashSet::new();
    let links: Vec<String> = hrefs
        .into_iter()
        .filter_map(extract_result_url)
        .filter(|url| !is_engine_link(url, &engine))
        .filter(|url| seen.insert(url.clone()))
        .collect();

    debug!("Parsed {} candidate links from search page", links.len());
    Ok(links)
}
