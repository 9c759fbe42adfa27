use serde::Deserialize;

/// Parsed source-map document — the fields of the standard v3 JSON shape
/// this tool consumes (`names`, `sourceRoot` and the rest are ignored).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMap {
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub sources_content: Vec<Option<String>>,
    #[serde(default)]
    pub mappings: String,
}

/// A generated position translated back to original-source coordinates.
/// Line and column are 0-indexed, matching the mappings encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct OriginalPosition {
    pub source_index: usize,
    pub source: String,
    pub line: i64,
    pub column: i64,
}

impl SourceMap {
    /// Translates a generated position (1-indexed line, 1-indexed column,
    /// as produced by `position::locate`) into original coordinates.
    ///
    /// Uses the standard greatest-lower-bound rule: the last segment on
    /// the generated line whose column does not exceed the target wins.
    /// Returns `None` for positions before any mapped segment, segments
    /// without source info, or malformed VLQ data.
    pub fn lookup(&self, line: i64, column: i64) -> Option<OriginalPosition> {
        if line < 1 || column < 1 {
            return None;
        }
        let target_line = (line - 1) as usize;
        let target_column = column - 1;

        // Source/line/column deltas accumulate across the whole mappings
        // string; only the generated column resets per line.
        let mut source_index: i64 = 0;
        let mut source_line: i64 = 0;
        let mut source_column: i64 = 0;
        let mut best: Option<(i64, i64, i64)> = None;

        for (line_index, line_mappings) in self.mappings.split(';').enumerate() {
            if line_index > target_line {
                break;
            }
            let mut generated_column: i64 = 0;
            for segment in line_mappings.split(',') {
                if segment.is_empty() {
                    continue;
                }
                let fields = decode_vlq_segment(segment)?;
                generated_column += *fields.first()?;
                if fields.len() >= 4 {
                    source_index += fields[1];
                    source_line += fields[2];
                    source_column += fields[3];
                    if line_index == target_line && generated_column <= target_column {
                        best = Some((source_index, source_line, source_column));
                    }
                }
            }
        }

        let (index, line, column) = best?;
        let source = self.sources.get(index as usize)?.clone();
        Some(OriginalPosition {
            source_index: index as usize,
            source,
            line,
            column,
        })
    }

    /// Embedded content of the original file at `source_index`, if the
    /// bundler inlined it.
    pub fn content_for(&self, source_index: usize) -> Option<&str> {
        self.sources_content
            .get(source_index)
            .and_then(|c| c.as_deref())
    }
}

const VLQ_CONTINUATION: i64 = 0x20;
const VLQ_VALUE_MASK: i64 = 0x1f;

fn base64_digit(ch: char) -> Option<i64> {
    match ch {
        'A'..='Z' => Some(ch as i64 - 'A' as i64),
        'a'..='z' => Some(ch as i64 - 'a' as i64 + 26),
        '0'..='9' => Some(ch as i64 - '0' as i64 + 52),
        '+' => Some(62),
        '/' => Some(63),
        _ => None,
    }
}

/// Decodes one comma-separated mappings segment into its signed fields.
/// Returns `None` on any non-base64 character or a dangling continuation.
fn decode_vlq_segment(segment: &str) -> Option<Vec<i64>> {
    let mut fields = Vec::with_capacity(5);
    let mut value: i64 = 0;
    let mut shift: u32 = 0;

    for ch in segment.chars() {
        let digit = base64_digit(ch)?;
        value |= (digit & VLQ_VALUE_MASK) << shift;
        if digit & VLQ_CONTINUATION != 0 {
            shift += 5;
            if shift > 60 {
                return None;
            }
        } else {
            let negative = value & 1 == 1;
            let mut decoded = value >> 1;
            if negative {
                decoded = -decoded;
            }
            fields.push(decoded);
            value = 0;
            shift = 0;
        }
    }
    if shift != 0 {
        return None;
    }
    Some(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(mappings: &str) -> SourceMap {
        SourceMap {
            sources: vec!["src/config.ts".to_string()],
            sources_content: vec![Some("line0\nline1\nline2\n".to_string())],
            mappings: mappings.to_string(),
        }
    }

    #[test]
    fn decodes_zero_segment() {
        assert_eq!(decode_vlq_segment("AAAA"), Some(vec![0, 0, 0, 0]));
    }

    #[test]
    fn decodes_positive_and_negative_values() {
        // 'C' = 2 -> +1, 'D' = 3 -> -1
        assert_eq!(decode_vlq_segment("CD"), Some(vec![1, -1]));
        // "iB" = 34 -> continuation: 2 | (1 << 5) = 34 -> +17
        assert_eq!(decode_vlq_segment("iB"), Some(vec![17]));
    }

    #[test]
    fn rejects_malformed_segments() {
        assert_eq!(decode_vlq_segment("!"), None);
        // 'g' sets the continuation bit with nothing following
        assert_eq!(decode_vlq_segment("g"), None);
    }

    #[test]
    fn lookup_walks_line_deltas() {
        // Three generated lines, each mapping column 0 to successive
        // original lines of source 0.
        let map = map("AAAA;AACA;AACA");
        let original = map.lookup(3, 6).unwrap();
        assert_eq!(original.source, "src/config.ts");
        assert_eq!(original.line, 2);
        assert_eq!(original.column, 0);
    }

    #[test]
    fn lookup_takes_greatest_segment_at_or_before_column() {
        // Generated line 1: column 0 -> original line 0, column 17 ->
        // original line 1.
        let map = map("AAAA,iBACA");
        let at_match = map.lookup(1, 18).unwrap();
        assert_eq!(at_match.line, 1);

        let before_match = map.lookup(1, 5).unwrap();
        assert_eq!(before_match.line, 0);
    }

    #[test]
    fn lookup_on_unmapped_line_is_none() {
        let map = map("AAAA");
        assert!(map.lookup(2, 1).is_none());
    }

    #[test]
    fn content_for_reads_inlined_source() {
        let map = map("AAAA");
        assert_eq!(map.content_for(0), Some("line0\nline1\nline2\n"));
        assert_eq!(map.content_for(1), None);
    }
}
