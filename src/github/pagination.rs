use std::marker::PhantomData;

use reqwest::header::{HeaderMap, LINK};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use super::client::GitHubClient;
use crate::error::{ContributionError, Result};

/// Cursor over a paginated list endpoint, one page per request.
///
/// Follows `Link: <...>; rel="next"` until the header no longer names a next
/// page. A cursor cannot be rewound; build a new one to start over.
pub struct Pages<'a, T> {
    client: &'a GitHubClient,
    next: Option<Url>,
    fetched: usize,
    _item: PhantomData<T>,
}

impl<'a, T: DeserializeOwned> Pages<'a, T> {
    pub(crate) fn new(client: &'a GitHubClient, first: Url) -> Self {
        Self {
            client,
            next: Some(first),
            fetched: 0,
            _item: PhantomData,
        }
    }

    /// Fetch the next page, or `None` once the listing is exhausted
    pub async fn next_page(&mut self) -> Result<Option<Vec<T>>> {
        let Some(url) = self.next.take() else {
            return Ok(None);
        };

        let response = self.client.get(url.clone()).await?;
        let next = next_link(response.headers());
        let body = response.text().await?;
        let items = decode_page(url.as_str(), &body)?;

        self.fetched += 1;
        debug!(url = %url, page = self.fetched, items = items.len(), "Fetched page");

        self.next = next;
        Ok(Some(items))
    }

    /// Drain every remaining page into one vector
    pub async fn collect_all(mut self) -> Result<Vec<T>> {
        let mut all = Vec::new();
        while let Some(page) = self.next_page().await? {
            all.extend(page);
        }
        Ok(all)
    }
}

/// Extract the `rel="next"` target from a `Link` header
pub fn next_link(headers: &HeaderMap) -> Option<Url> {
    headers
        .get_all(LINK)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .find_map(|part| {
            let mut pieces = part.split(';');
            let target = pieces.next()?.trim();
            let is_next = pieces.any(|p| {
                let p = p.trim();
                p == "rel=\"next\"" || p == "rel=next"
            });
            if !is_next {
                return None;
            }
            let target = target.strip_prefix('<')?.strip_suffix('>')?;
            Url::parse(target).ok()
        })
}

/// List endpoints return bare arrays; search endpoints wrap them in `items`
fn decode_page<T: DeserializeOwned>(url: &str, body: &str) -> Result<Vec<T>> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| ContributionError::unexpected(url, format!("invalid JSON: {}", e)))?;

    let items = match value {
        Value::Array(list) => Value::Array(list),
        Value::Object(mut map) => match map.remove("items") {
            Some(items) => items,
            None => {
                return Err(ContributionError::unexpected(
                    url,
                    "expected a list or an object with 'items'",
                ))
            }
        },
        _ => {
            return Err(ContributionError::unexpected(
                url,
                "expected a list or an object with 'items'",
            ))
        }
    };

    serde_json::from_value(items)
        .map_err(|e| ContributionError::unexpected(url, format!("unexpected item shape: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Item {
        id: u64,
    }

    fn headers(link: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(LINK, HeaderValue::from_str(link).unwrap());
        headers
    }

    #[test]
    fn test_next_link() {
        let link = r#"<https://api.github.com/repositories/1/pulls?page=2>; rel="next", <https://api.github.com/repositories/1/pulls?page=5>; rel="last""#;
        let next = next_link(&headers(link)).unwrap();
        assert_eq!(next.as_str(), "https://api.github.com/repositories/1/pulls?page=2");
    }

    #[test]
    fn test_next_link_absent_on_last_page() {
        let link = r#"<https://api.github.com/repositories/1/pulls?page=1>; rel="prev", <https://api.github.com/repositories/1/pulls?page=1>; rel="first""#;
        assert!(next_link(&headers(link)).is_none());
        assert!(next_link(&HeaderMap::new()).is_none());
    }

    #[test]
    fn test_decode_bare_list() {
        let items: Vec<Item> = decode_page("u", r#"[{"id": 1}, {"id": 2}]"#).unwrap();
        assert_eq!(items, vec![Item { id: 1 }, Item { id: 2 }]);
    }

    #[test]
    fn test_decode_search_envelope() {
        let body = r#"{"total_count": 1, "incomplete_results": false, "items": [{"id": 7}]}"#;
        let items: Vec<Item> = decode_page("u", body).unwrap();
        assert_eq!(items, vec![Item { id: 7 }]);
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert!(matches!(
            decode_page::<Item>("u", "not json"),
            Err(ContributionError::UnexpectedResponse { .. })
        ));
        assert!(matches!(
            decode_page::<Item>("u", r#"{"message": "oops"}"#),
            Err(ContributionError::UnexpectedResponse { .. })
        ));
        assert!(matches!(
            decode_page::<Item>("u", r#"[{"name": "no id"}]"#),
            Err(ContributionError::UnexpectedResponse { .. })
        ));
    }
}
