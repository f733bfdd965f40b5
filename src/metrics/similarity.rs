// Set-overlap scores used for consistency auditing and tool precision

use std::collections::HashSet;
use std::hash::Hash;

/// Word-set Jaccard similarity between two texts (0.0 = disjoint, 1.0 = same words)
///
/// Words are whitespace-separated and compared verbatim, so callers lower-case
/// first when case should not matter. Either text being empty yields 0.0.
pub fn word_similarity(text1: &str, text2: &str) -> f64 {
    let words1: HashSet<&str> = text1.split_whitespace().collect();
    let words2: HashSet<&str> = text2.split_whitespace().collect();

    if words1.is_empty() || words2.is_empty() {
        return 0.0;
    }

    jaccard(&words1, &words2)
}

/// Precision of tool selection: |expected ∩ actual| / |expected ∪ actual|
///
/// An empty expectation is vacuously satisfied (1.0).
pub fn tool_precision<S: AsRef<str>>(expected: &[S], actual: &[S]) -> f64 {
    let expected: HashSet<&str> = expected.iter().map(AsRef::as_ref).collect();
    if expected.is_empty() {
        return 1.0;
    }
    let actual: HashSet<&str> = actual.iter().map(AsRef::as_ref).collect();

    jaccard(&expected, &actual)
}

fn jaccard<T: Eq + Hash>(a: &HashSet<T>, b: &HashSet<T>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    // Jaccard similarity: |A ∩ B| / |A ∪ B|
    a.intersection(b).count() as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_texts() {
        let text = "busca productos lacteos";
        assert_eq!(word_similarity(text, text), 1.0);
    }

    #[test]
    fn test_completely_different() {
        let sim = word_similarity("fresh fruit", "vegetarian cart");
        assert_eq!(sim, 0.0);
    }

    #[test]
    fn test_partial_overlap() {
        // {show, me, dairy, products} vs {show, me, breakfast, products}: 3 / 5
        let sim = word_similarity("show me dairy products", "show me breakfast products");
        assert!((sim - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_empty_texts() {
        assert_eq!(word_similarity("", ""), 0.0);
        assert_eq!(word_similarity("hello", ""), 0.0);
        assert_eq!(word_similarity("   ", "hello"), 0.0);
    }

    #[test]
    fn test_case_sensitive_by_itself() {
        assert_eq!(word_similarity("MILK", "milk"), 0.0);
        assert_eq!(word_similarity(&"MILK".to_lowercase(), "milk"), 1.0);
    }

    #[test]
    fn test_precision_vacuous() {
        let empty: [&str; 0] = [];
        assert_eq!(tool_precision(&empty, &["search_products"]), 1.0);
        assert_eq!(tool_precision(&empty, &empty), 1.0);
    }

    #[test]
    fn test_precision_half() {
        assert_eq!(tool_precision(&["a", "b"], &["a"]), 0.5);
    }

    #[test]
    fn test_precision_counts_extra_tools() {
        // expected {a}, actual {a, b, c}: 1 / 3
        let p = tool_precision(&["a"], &["a", "b", "c"]);
        assert!((p - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(tool_precision(&["a"], &["b"]), 0.0);
    }

    #[test]
    fn test_precision_ignores_duplicates() {
        assert_eq!(tool_precision(&["a", "a"], &["a", "a", "a"]), 1.0);
    }
}
