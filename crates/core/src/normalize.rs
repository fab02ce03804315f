use crate::error::NormalizeError;
use regex::Regex;

pub trait ContentNormalizer: Send + Sync {
    fn normalize(&self, raw: &str) -> Result<String, NormalizeError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlNormalizer;

impl ContentNormalizer for HtmlNormalizer {
    fn normalize(&self, raw: &str) -> Result<String, NormalizeError> {
        strip_html(raw)
    }
}

pub fn strip_html(raw: &str) -> Result<String, NormalizeError> {
    let line_break =
        Regex::new(r"(?i)<br\s*/?>").map_err(|error| NormalizeError(error.to_string()))?;
    let block_end = Regex::new(r"(?i)</(?:p|div|h[1-6]|li|ul|ol|blockquote|pre|tr|table)>")
        .map_err(|error| NormalizeError(error.to_string()))?;
    let tag = Regex::new(r"<[^>]*>").map_err(|error| NormalizeError(error.to_string()))?;

    let text = line_break.replace_all(raw, "\n");
    let text = block_end.replace_all(&text, "\n");
    let text = tag.replace_all(&text, "");
    let text = decode_entities(&text)?;

    Ok(collapse_whitespace(&text))
}

fn decode_entities(text: &str) -> Result<String, NormalizeError> {
    let numeric =
        Regex::new(r"&#(x?[0-9a-fA-F]+);").map_err(|error| NormalizeError(error.to_string()))?;

    let decoded = numeric.replace_all(text, |captures: &regex::Captures<'_>| {
        let body = &captures[1];
        let parsed = if let Some(hex) = body.strip_prefix('x').or_else(|| body.strip_prefix('X')) {
            u32::from_str_radix(hex, 16).ok()
        } else {
            body.parse::<u32>().ok()
        };

        match parsed.and_then(char::from_u32) {
            Some(value) => value.to_string(),
            None => captures[0].to_string(),
        }
    });

    Ok(decoded
        .replace("&nbsp;", " ")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&"))
}

pub fn collapse_whitespace(text: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut blank_pending = false;

    for line in text.lines() {
        let compact = line.split_whitespace().collect::<Vec<_>>().join(" ");

        if compact.is_empty() {
            blank_pending = !lines.is_empty();
            continue;
        }

        if blank_pending {
            lines.push(String::new());
            blank_pending = false;
        }
        lines.push(compact);
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::{collapse_whitespace, strip_html, ContentNormalizer, HtmlNormalizer};

    #[test]
    fn tags_are_stripped_and_blocks_become_lines() {
        let html = "<div><h1>Groceries</h1><ul><li>Apples</li><li>Rye bread</li></ul></div>";
        let text = strip_html(html).unwrap();
        assert_eq!(text, "Groceries\nApples\nRye bread");
    }

    #[test]
    fn br_tags_become_newlines() {
        let text = strip_html("line one<br>line two<br/>line three").unwrap();
        assert_eq!(text, "line one\nline two\nline three");
    }

    #[test]
    fn entities_are_decoded() {
        let text = strip_html("Tom &amp; Jerry &lt;3 &#39;quotes&#39; &#x41;").unwrap();
        assert_eq!(text, "Tom & Jerry <3 'quotes' A");
    }

    #[test]
    fn plain_text_passes_through() {
        let text = strip_html("just a plain note about 15/12 meetings").unwrap();
        assert_eq!(text, "just a plain note about 15/12 meetings");
    }

    #[test]
    fn whitespace_runs_collapse() {
        let input = "a  \t b\n\n\n\nc\u{a0}d";
        assert_eq!(collapse_whitespace(input), "a b\n\nc d");
    }

    #[test]
    fn normalizer_trait_delegates_to_strip_html() {
        let normalizer = HtmlNormalizer;
        let text = normalizer.normalize("<p>hello</p>").unwrap();
        assert_eq!(text, "hello");
    }
}
