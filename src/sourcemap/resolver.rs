use base64::Engine;
use reqwest::Client;
use url::Url;

use super::map::{OriginalPosition, SourceMap};
use super::position::locate;
use crate::model::finding::path_basename;
use crate::model::SourceContent;

/// Lines of original source kept on each side of the matched lines.
const CONTEXT_MARGIN: i64 = 5;

const SOURCE_MAP_DIRECTIVE: &str = "//# sourceMappingURL=";

/// Resolves the source context for one or more anchor substrings of a
/// bundle, falling back at every stage:
///
/// 1. anchors located in the raw bundle text (first occurrence each),
/// 2. `sourceMappingURL` directive extracted and resolved,
/// 3. map fetched (or decoded from an inline `data:` URL),
/// 4. anchor positions translated and the original file windowed.
///
/// Any failure along the way yields the sentinel fallback content built
/// from `fallback_payload` — a broken source map never aborts detection.
pub async fn resolve_source_content(
    client: &Client,
    bundle_content: &str,
    bundle_url: &str,
    anchors: &[&str],
    fallback_payload: &str,
) -> SourceContent {
    match try_resolve(client, bundle_content, bundle_url, anchors).await {
        Some(content) => content,
        None => SourceContent::fallback(fallback_payload.to_string(), bundle_url),
    }
}

async fn try_resolve(
    client: &Client,
    bundle_content: &str,
    bundle_url: &str,
    anchors: &[&str],
) -> Option<SourceContent> {
    let positions: Vec<_> = anchors
        .iter()
        .map(|anchor| locate(bundle_content, anchor))
        .filter(|pos| pos.is_found())
        .collect();
    if positions.is_empty() {
        return None;
    }

    let reference = extract_sourcemap_ref(bundle_content)?;
    let map_url = resolve_sourcemap_ref(&reference, bundle_url)?;
    let map = fetch_sourcemap(client, &map_url).await?;

    let originals: Vec<OriginalPosition> = positions
        .iter()
        .map(|pos| map.lookup(pos.line, pos.column))
        .collect::<Option<Vec<_>>>()?;
    let first = originals.first()?;
    if first.source.is_empty() {
        return None;
    }
    // A window only makes sense inside one original file.
    if originals.iter().any(|o| o.source_index != first.source_index) {
        return None;
    }

    let original_text = map.content_for(first.source_index)?;
    let lines: Vec<&str> = original_text.lines().collect();
    if lines.is_empty() {
        return None;
    }

    let match_lines: Vec<i64> = originals.iter().map(|o| o.line).collect();
    let min_line = *match_lines.iter().min()?;
    let max_line = *match_lines.iter().max()?;
    let start = (min_line - CONTEXT_MARGIN).max(0);
    let end = (max_line + CONTEXT_MARGIN).min(lines.len() as i64 - 1);
    if start > end {
        return None;
    }

    let content = lines[start as usize..=end as usize].join("\n");

    Some(SourceContent {
        content,
        content_filename: path_basename(&first.source),
        content_start_line_num: start,
        content_end_line_num: end,
        exact_match_numbers: match_lines,
    })
}

/// Pulls the source-map reference out of the bundle's trailing comment.
pub fn extract_sourcemap_ref(bundle_content: &str) -> Option<String> {
    let index = bundle_content.rfind(SOURCE_MAP_DIRECTIVE)?;
    let rest = &bundle_content[index + SOURCE_MAP_DIRECTIVE.len()..];
    let reference = rest
        .split(|c: char| c.is_whitespace())
        .next()
        .unwrap_or("")
        .trim();
    if reference.is_empty() {
        None
    } else {
        Some(reference.to_string())
    }
}

/// Resolves a source-map reference against the bundle URL. Handles
/// absolute URLs, root-relative paths, relative paths and inline `data:`
/// URLs (returned untouched).
pub fn resolve_sourcemap_ref(reference: &str, bundle_url: &str) -> Option<String> {
    if reference.starts_with("data:") {
        return Some(reference.to_string());
    }
    let base = Url::parse(bundle_url).ok()?;
    base.join(reference).ok().map(|u| u.to_string())
}

/// Fetches and parses a source-map document. Inline `data:` URLs are
/// decoded locally; anything non-OK or unparseable is `None`.
pub async fn fetch_sourcemap(client: &Client, map_url: &str) -> Option<SourceMap> {
    if let Some(rest) = map_url.strip_prefix("data:") {
        let (meta, payload) = rest.split_once(',')?;
        if meta.contains("base64") {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(payload.trim())
                .ok()?;
            return serde_json::from_slice(&bytes).ok();
        }
        return serde_json::from_str(payload).ok();
    }

    let response = client.get(map_url).send().await.ok()?;
    if !response.status().is_success() {
        return None;
    }
    let text = response.text().await.ok()?;
    serde_json::from_str(&text).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_trailing_directive() {
        let bundle = "var x=1;\n//# sourceMappingURL=app.js.map\n";
        assert_eq!(extract_sourcemap_ref(bundle).as_deref(), Some("app.js.map"));
    }

    #[test]
    fn missing_directive_is_none() {
        assert_eq!(extract_sourcemap_ref("var x=1;"), None);
        assert_eq!(extract_sourcemap_ref("//# sourceMappingURL=\n"), None);
    }

    #[test]
    fn last_directive_wins() {
        let bundle = "//# sourceMappingURL=old.map\nvar x=1;\n//# sourceMappingURL=new.map";
        assert_eq!(extract_sourcemap_ref(bundle).as_deref(), Some("new.map"));
    }

    #[test]
    fn resolves_reference_forms() {
        let bundle = "https://cdn.example.com/assets/app.js";
        assert_eq!(
            resolve_sourcemap_ref("https://maps.example.com/app.js.map", bundle).as_deref(),
            Some("https://maps.example.com/app.js.map")
        );
        assert_eq!(
            resolve_sourcemap_ref("/maps/app.js.map", bundle).as_deref(),
            Some("https://cdn.example.com/maps/app.js.map")
        );
        assert_eq!(
            resolve_sourcemap_ref("app.js.map", bundle).as_deref(),
            Some("https://cdn.example.com/assets/app.js.map")
        );
        assert_eq!(
            resolve_sourcemap_ref("data:application/json;base64,e30=", bundle).as_deref(),
            Some("data:application/json;base64,e30=")
        );
    }

    #[test]
    fn unparseable_bundle_url_is_none() {
        assert_eq!(resolve_sourcemap_ref("app.js.map", "not a url"), None);
    }

    #[tokio::test]
    async fn inline_data_url_map_is_decoded_locally() {
        // {"version":3,"sources":["src/a.ts"],"mappings":"AAAA"}
        let payload = base64::engine::general_purpose::STANDARD.encode(
            r#"{"version":3,"sources":["src/a.ts"],"mappings":"AAAA"}"#,
        );
        let url = format!("data:application/json;base64,{}", payload);
        let map = fetch_sourcemap(&Client::new(), &url).await.unwrap();
        assert_eq!(map.sources, vec!["src/a.ts"]);
    }

    #[tokio::test]
    async fn no_directive_falls_back_to_payload() {
        let client = Client::new();
        let content = resolve_source_content(
            &client,
            "const key = \"sk-abc\";",
            "https://host.example/app.js",
            &["sk-abc"],
            r#"{"api_key":"sk-abc"}"#,
        )
        .await;

        assert_eq!(content.content, r#"{"api_key":"sk-abc"}"#);
        assert_eq!(content.content_filename, "app.js");
        assert_eq!(content.content_start_line_num, -1);
        assert_eq!(content.content_end_line_num, -1);
        assert_eq!(content.exact_match_numbers, vec![-1]);
    }

    #[tokio::test]
    async fn inline_map_resolves_to_original_window() {
        let original = (0..20)
            .map(|i| {
                if i == 12 {
                    "const apiKey = \"sk-windowed\";".to_string()
                } else {
                    format!("// line {}", i)
                }
            })
            .collect::<Vec<_>>()
            .join("\n");

        // Generated line 1 column 0 maps to original line 12 of source 0:
        // fields [0, 0, 12, 0] == "AAYA" (12 -> 24 -> 'Y').
        let map_json = serde_json::json!({
            "version": 3,
            "sources": ["webpack://demo/src/config.ts"],
            "sourcesContent": [original],
            "mappings": "AAYA",
        });
        let payload =
            base64::engine::general_purpose::STANDARD.encode(map_json.to_string());
        let bundle = format!(
            "var k=\"sk-windowed\";\n//# sourceMappingURL=data:application/json;base64,{}",
            payload
        );

        let content = resolve_source_content(
            &Client::new(),
            &bundle,
            "https://host.example/app.js",
            &["sk-windowed"],
            "{}",
        )
        .await;

        assert_eq!(content.content_filename, "config.ts");
        assert_eq!(content.content_start_line_num, 7);
        assert_eq!(content.content_end_line_num, 17);
        assert_eq!(content.exact_match_numbers, vec![12]);
        assert!(content.content.contains("sk-windowed"));
    }
}
