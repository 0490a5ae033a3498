use crate::error::{Error, Result};
use crate::utils::tokenizer::tokenize;

/// A parsed search query: normalized terms in input order.
///
/// Multi-term queries are an AND — every term must occur on a matching
/// page. Normalization goes through the indexing tokenizer so query terms
/// and indexed terms can never disagree on case or boundaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedQuery {
    pub terms: Vec<String>,
}

impl ParsedQuery {
    /// Terms with duplicates removed, input order preserved.
    pub fn unique_terms(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for term in &self.terms {
            if !seen.contains(&term.as_str()) {
                seen.push(term.as_str());
            }
        }
        seen
    }
}

/// Parse a query string into a term list.
///
/// A query that is empty or normalizes to nothing searchable is a syntax
/// error, reported immediately with no partial results.
pub fn parse_query(input: &str) -> Result<ParsedQuery> {
    if input.trim().is_empty() {
        return Err(Error::QuerySyntax("empty query".to_string()));
    }

    let terms: Vec<String> = tokenize(input).into_iter().map(|t| t.term).collect();
    if terms.is_empty() {
        return Err(Error::QuerySyntax(format!(
            "no searchable terms in {input:?}"
        )));
    }

    Ok(ParsedQuery { terms })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_query() {
        let q = parse_query("hello").unwrap();
        assert_eq!(q.terms, vec!["hello"]);
    }

    #[test]
    fn test_multi_term_normalized() {
        let q = parse_query("Hello, World!").unwrap();
        assert_eq!(q.terms, vec!["hello", "world"]);
    }

    #[test]
    fn test_empty_query_rejected() {
        assert!(matches!(parse_query(""), Err(Error::QuerySyntax(_))));
        assert!(matches!(parse_query("   "), Err(Error::QuerySyntax(_))));
    }

    #[test]
    fn test_punctuation_only_rejected() {
        assert!(matches!(parse_query("?!,."), Err(Error::QuerySyntax(_))));
    }

    #[test]
    fn test_unique_terms_keeps_order() {
        let q = parse_query("the quick the brown").unwrap();
        assert_eq!(q.unique_terms(), vec!["the", "quick", "brown"]);
    }
}
