/// Maximum token length to index.
/// Longer runs are almost always embedded data (base64 blobs, hex dumps)
/// rather than searchable words.
const MAX_TOKEN_LENGTH: usize = 128;

/// A normalized token with its position in the original text.
///
/// Offsets count code points of the input, not bytes, so a span can be
/// sliced back out of the original text regardless of encoding width.
/// `end` is exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub term: String,
    pub start: u32,
    pub end: u32,
}

/// Tokenize page text into normalized, positioned tokens.
///
/// Rules: case-fold, split on anything that is not alphanumeric, discard
/// empty tokens. Pure function of its input — indexing and querying both
/// depend on it producing identical output for identical text.
pub fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut token_start: u32 = 0;

    for (pos, ch) in text.chars().enumerate() {
        if ch.is_alphanumeric() {
            if current.is_empty() {
                token_start = pos as u32;
            }
            // Case folding can expand a char (e.g. İ), which keeps the
            // term normalized while offsets still track the source text.
            for folded in ch.to_lowercase() {
                current.push(folded);
            }
        } else if !current.is_empty() {
            push_token(&mut tokens, &mut current, token_start, pos as u32);
        }
    }

    if !current.is_empty() {
        let end = text.chars().count() as u32;
        push_token(&mut tokens, &mut current, token_start, end);
    }

    tokens
}

fn push_token(tokens: &mut Vec<Token>, current: &mut String, start: u32, end: u32) {
    if current.len() <= MAX_TOKEN_LENGTH {
        tokens.push(Token {
            term: std::mem::take(current),
            start,
            end,
        });
    } else {
        current.clear();
    }
}

/// Slice a text by code-point offsets, the coordinate space token spans
/// are expressed in.
pub fn slice_by_chars(text: &str, start: u32, end: u32) -> &str {
    let byte_at = |n: usize| {
        text.char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .nth(n)
            .unwrap_or(text.len())
    };
    &text[byte_at(start as usize)..byte_at(end as usize)]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms(text: &str) -> Vec<String> {
        tokenize(text).into_iter().map(|t| t.term).collect()
    }

    #[test]
    fn test_basic_split() {
        assert_eq!(terms("hello world"), vec!["hello", "world"]);
    }

    #[test]
    fn test_case_folding() {
        assert_eq!(terms("Hello WORLD"), vec!["hello", "world"]);
    }

    #[test]
    fn test_punctuation_boundaries() {
        assert_eq!(
            terms("one,two;three.four"),
            vec!["one", "two", "three", "four"]
        );
    }

    #[test]
    fn test_offsets_are_code_points() {
        let text = "héllo wörld";
        let tokens = tokenize(text);
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].start, 0);
        assert_eq!(tokens[0].end, 5);
        assert_eq!(tokens[1].start, 6);
        assert_eq!(tokens[1].end, 11);
        assert_eq!(slice_by_chars(text, 6, 11), "wörld");
    }

    #[test]
    fn test_deterministic() {
        let text = "The quick brown fox, the quick brown fox.";
        assert_eq!(tokenize(text), tokenize(text));
    }

    #[test]
    fn test_no_empty_tokens() {
        assert!(terms("  ,,  .. !!").is_empty());
    }

    #[test]
    fn test_trailing_token() {
        let tokens = tokenize("end");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].end, 3);
    }

    #[test]
    fn test_overlong_token_dropped() {
        let long = "x".repeat(200);
        let text = format!("short {} tail", long);
        assert_eq!(terms(&text), vec!["short", "tail"]);
    }

    #[test]
    fn test_slice_round_trip() {
        let text = "alpha beta gamma";
        for token in tokenize(text) {
            assert_eq!(slice_by_chars(text, token.start, token.end), token.term);
        }
    }
}
