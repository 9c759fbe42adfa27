/// Position of a substring in bundle text: 1-indexed line and column.
/// `{-1, -1}` is the "not found" sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextPosition {
    pub line: i64,
    pub column: i64,
}

impl TextPosition {
    pub const NOT_FOUND: TextPosition = TextPosition {
        line: -1,
        column: -1,
    };

    pub fn is_found(&self) -> bool {
        self.line >= 0
    }
}

/// Locates the first occurrence of `needle` in `content`.
pub fn locate(content: &str, needle: &str) -> TextPosition {
    if needle.is_empty() {
        return TextPosition::NOT_FOUND;
    }
    let Some(index) = content.find(needle) else {
        return TextPosition::NOT_FOUND;
    };

    let before = &content[..index];
    let line = before.matches('\n').count() as i64 + 1;
    let line_start = before.rfind('\n').map(|p| p + 1).unwrap_or(0);
    let column = (index - line_start) as i64 + 1;

    TextPosition { line, column }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locates_on_first_line() {
        let content = r#"const secret = "mysecret123";"#;
        assert_eq!(
            locate(content, "mysecret123"),
            TextPosition {
                line: 1,
                column: 17
            }
        );
    }

    #[test]
    fn locates_on_later_line() {
        let content = "var a = 1;\nvar b = 2;\nvar key = \"AKIA\";\n";
        assert_eq!(locate(content, "AKIA"), TextPosition { line: 3, column: 12 });
    }

    #[test]
    fn absent_needle_is_sentinel() {
        assert_eq!(locate("nothing here", "AKIA"), TextPosition::NOT_FOUND);
        assert!(!locate("nothing here", "AKIA").is_found());
    }

    #[test]
    fn only_first_occurrence_is_reported() {
        let content = "x\nkey key\n";
        assert_eq!(locate(content, "key"), TextPosition { line: 2, column: 1 });
    }
}
