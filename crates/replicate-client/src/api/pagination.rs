use serde::Deserialize;

/// One page of a cursor-paginated listing.
///
/// `next` and `previous` hold opaque cursor URLs owned by the server; a missing
/// `next` means the listing is exhausted.
#[derive(Debug, Deserialize)]
pub struct Page<T> {
    pub results: Vec<T>,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
}

impl<T> Page<T> {
    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_page_with_cursors() {
        let payload = json!({
            "results": [{"x": 1}, {"x": 2}],
            "next": "https://api.replicate.com/v1/predictions?cursor=cD0yMDIz",
            "previous": null,
        });

        let page: Page<serde_json::Value> = serde_json::from_value(payload).unwrap();
        assert_eq!(page.results.len(), 2);
        assert!(page.has_next());
        assert!(page.previous.is_none());
    }

    #[test]
    fn decodes_page_without_cursors() {
        let page: Page<serde_json::Value> =
            serde_json::from_str(r#"{ "results": [] }"#).unwrap();
        assert!(page.results.is_empty());
        assert!(!page.has_next());
    }
}
