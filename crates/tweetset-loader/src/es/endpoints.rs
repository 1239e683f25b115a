//! Indexing service URL builders

/// Index create/delete URL
pub fn index_url(base_url: &str, index: &str) -> String {
    format!("{}/{}", base_url, index)
}

/// Index settings URL
pub fn settings_url(base_url: &str, index: &str) -> String {
    format!("{}/{}/_settings", base_url, index)
}

/// Bulk API URL
pub fn bulk_url(base_url: &str) -> String {
    format!("{}/_bulk", base_url)
}

/// Search URL for one index
pub fn search_url(base_url: &str, index: &str) -> String {
    format!("{}/{}/_search", base_url, index)
}

/// Single document URL
pub fn document_url(base_url: &str, index: &str, id: &str) -> String {
    format!("{}/{}/_doc/{}", base_url, index, id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls() {
        let base = "http://localhost:9200";
        assert_eq!(index_url(base, "tweetsets"), "http://localhost:9200/tweetsets");
        assert_eq!(
            settings_url(base, "tweets-abc123"),
            "http://localhost:9200/tweets-abc123/_settings"
        );
        assert_eq!(bulk_url(base), "http://localhost:9200/_bulk");
        assert_eq!(
            search_url(base, "tweets-abc123"),
            "http://localhost:9200/tweets-abc123/_search"
        );
        assert_eq!(
            document_url(base, "tweetsets", "abc123"),
            "http://localhost:9200/tweetsets/_doc/abc123"
        );
    }
}
