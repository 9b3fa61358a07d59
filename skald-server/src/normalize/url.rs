//! URL extraction from normalized text
//!
//! Finds scheme-qualified (`http://`, `https://`) and bare URLs. Bare URLs
//! must carry a domain suffix from the allowlist below. Matches are
//! parenthetical-aware: `http://example.com/a(b)` is one span including the
//! parenthetical. Each match becomes one QR block, in order of appearance,
//! duplicates preserved.

use regex::Regex;
use std::sync::LazyLock;

/// Domain-suffix allowlist for bare URLs (generic TLDs plus country codes)
const TLDS: &str = "com|net|org|edu|gov|mil|aero|asia|biz|cat|coop|info|int|jobs|mobi|museum|name|post|pro|tel|travel|ac|ad|ae|af|ag|ai|al|am|ao|aq|ar|as|at|au|aw|ax|az|ba|bb|bd|be|bf|bg|bh|bi|bj|bm|bn|bo|br|bs|bt|bw|by|bz|ca|cc|cd|cf|cg|ch|ci|ck|cl|cm|cn|co|cr|cu|cv|cx|cy|cz|de|dj|dk|dm|do|dz|ec|ee|eg|er|es|et|eu|fi|fj|fk|fm|fo|fr|ga|gb|gd|ge|gf|gg|gh|gi|gl|gm|gn|gp|gq|gr|gs|gt|gu|gw|gy|hk|hm|hn|hr|ht|hu|id|ie|il|im|in|io|iq|ir|is|it|je|jm|jo|jp|ke|kg|kh|ki|km|kn|kp|kr|kw|ky|kz|la|lb|lc|li|lk|lr|ls|lt|lu|lv|ly|ma|mc|md|me|mg|mh|mk|ml|mm|mn|mo|mp|mq|mr|ms|mt|mu|mv|mw|mx|my|mz|na|nc|ne|nf|ng|ni|nl|no|np|nr|nu|nz|om|pa|pe|pf|pg|ph|pk|pl|pm|pn|pr|ps|pt|pw|py|qa|re|ro|rs|ru|rw|sa|sb|sc|sd|se|sg|sh|si|sj|sk|sl|sm|sn|so|sr|ss|st|su|sv|sx|sy|sz|tc|td|tf|tg|th|tj|tk|tl|tm|tn|to|tr|tt|tv|tw|tz|ua|ug|uk|us|uy|uz|va|vc|ve|vg|vi|vn|vu|wf|ws|ye|yt|za|zm|zw";

static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    // Two branches:
    // - scheme-qualified or slash-terminated domain, followed by a path that
    //   may contain (nested) parentheticals and must not end on trailing
    //   punctuation
    // - bare domain with an allowlisted suffix
    let pattern = format!(
        r#"(?i)\b(?:(?:https?://|[a-z0-9.\-]+[.](?:{tlds})/)(?:[^\s()<>{{}}\[\]]+|\([^\s()]*?\([^\s()]+\)[^\s()]*?\)|\([^\s]+?\))+(?:\([^\s()]*?\([^\s()]+\)[^\s()]*?\)|\([^\s]+?\)|[^\s`!()\[\]{{}};:'".,<>?«»“”‘’])|[a-z0-9]+(?:[.\-][a-z0-9]+)*[.](?:{tlds})\b/?)"#,
        tlds = TLDS
    );
    Regex::new(&pattern).expect("URL pattern must compile")
});

/// Extract every URL in the text, in order of appearance
///
/// Bare-domain matches directly adjacent to `@` are dropped so email
/// addresses do not turn into QR codes.
pub fn extract_urls(text: &str) -> Vec<String> {
    URL_RE
        .find_iter(text)
        .filter(|m| {
            let before = text[..m.start()].chars().next_back();
            let after = text[m.end()..].chars().next();
            before != Some('@') && after != Some('@')
        })
        .map(|m| m.as_str().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheme_qualified() {
        let urls = extract_urls("check https://example.com/path?a=1 out");
        assert_eq!(urls, vec!["https://example.com/path?a=1"]);
    }

    #[test]
    fn test_parenthetical_span() {
        let urls = extract_urls("see http://example.com/a(b) now");
        assert_eq!(urls, vec!["http://example.com/a(b)"]);
    }

    #[test]
    fn test_bare_domain() {
        let urls = extract_urls("just example.com here");
        assert_eq!(urls, vec!["example.com"]);
    }

    #[test]
    fn test_email_not_matched() {
        let urls = extract_urls("mail me at someone@example.com please");
        assert!(urls.is_empty());
    }

    #[test]
    fn test_multiple_in_order_duplicates_preserved() {
        let urls = extract_urls("a.com then b.net then a.com");
        assert_eq!(urls, vec!["a.com", "b.net", "a.com"]);
    }

    #[test]
    fn test_trailing_punctuation_excluded() {
        let urls = extract_urls("go to https://example.com/x.");
        assert_eq!(urls, vec!["https://example.com/x"]);
    }

    #[test]
    fn test_no_urls() {
        assert!(extract_urls("nothing to see here").is_empty());
    }
}
