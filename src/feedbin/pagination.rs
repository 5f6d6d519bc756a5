use std::collections::HashMap;

/// Parses a `Link` header into a `rel -> url` map.
///
/// Format: `<https://api.feedbin.com/v2/feeds/1/entries.json?page=2>; rel="next", <…>; rel="last"`.
/// A relation value may list several space-separated names; each one maps to the same URL.
/// Malformed parts are skipped rather than failing the whole header.
pub fn parse_link_header(header: &str) -> HashMap<String, String> {
    let mut links = HashMap::new();

    for part in header.split(',') {
        let mut segments = part.split(';');
        let Some(target) = segments.next().map(str::trim) else {
            continue;
        };
        let Some(url) = target
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .map(str::trim)
        else {
            tracing::debug!(part = %part, "Skipping link without <url>");
            continue;
        };
        if url.is_empty() {
            continue;
        }

        for param in segments {
            let Some((key, value)) = param.split_once('=') else {
                continue;
            };
            if !key.trim().eq_ignore_ascii_case("rel") {
                continue;
            }
            for rel in value.trim().trim_matches('"').split_whitespace() {
                links.insert(rel.to_ascii_lowercase(), url.to_string());
            }
        }
    }

    links
}

/// Returns the `next` URL of a `Link` header, if there is one.
pub fn next_link(header: &str) -> Option<String> {
    parse_link_header(header).remove("next")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parses_feedbin_style_header() {
        let header = r#"<https://api.feedbin.com/v2/feeds/1079883/entries.json?page=2>; rel="next", <https://api.feedbin.com/v2/feeds/1079883/entries.json?page=5>; rel="last""#;
        let links = parse_link_header(header);

        assert_eq!(
            links.get("next").map(String::as_str),
            Some("https://api.feedbin.com/v2/feeds/1079883/entries.json?page=2")
        );
        assert_eq!(
            links.get("last").map(String::as_str),
            Some("https://api.feedbin.com/v2/feeds/1079883/entries.json?page=5")
        );
    }

    #[test]
    fn test_last_page_has_no_next() {
        let header = r#"<https://x.test/e.json?page=1>; rel="first", <https://x.test/e.json?page=2>; rel="prev""#;
        assert_eq!(next_link(header), None);
    }

    #[test]
    fn test_unquoted_and_multi_valued_rel() {
        let header = "<https://x.test/e.json?page=3>; rel=next, <https://x.test/e.json?page=9>; rel=\"last end\"";
        let links = parse_link_header(header);
        assert_eq!(links["next"], "https://x.test/e.json?page=3");
        assert_eq!(links["last"], "https://x.test/e.json?page=9");
        assert_eq!(links["end"], "https://x.test/e.json?page=9");
    }

    #[test]
    fn test_malformed_parts_are_skipped() {
        let header = r#"garbage, <>; rel="prev", <https://x.test/e.json?page=2>; rel="next""#;
        assert_eq!(next_link(header).as_deref(), Some("https://x.test/e.json?page=2"));
        assert!(parse_link_header("").is_empty());
    }
}
