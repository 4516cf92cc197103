//! Header merging for outbound mail.
//!
//! Computed headers always win. Caller-supplied headers are appended only
//! when their name is not protected, not already present, and safe to put
//! on the wire.

use std::collections::BTreeMap;

/// Headers the mail service owns; callers can never set these.
pub const PROTECTED_HEADERS: [&str; 8] = [
    "From",
    "To",
    "Cc",
    "Bcc",
    "Subject",
    "MIME-Version",
    "Content-Type",
    "Reply-To",
];

/// Whether `name` is one of [`PROTECTED_HEADERS`], ignoring ASCII case.
#[must_use]
pub fn is_protected(name: &str) -> bool {
    PROTECTED_HEADERS
        .iter()
        .any(|protected| protected.eq_ignore_ascii_case(name.trim()))
}

/// Merge caller headers into the computed set.
///
/// # Examples
/// ```
/// use std::collections::BTreeMap;
/// use diary_backend::domain::mail::merge_headers;
///
/// let computed = vec![("Subject".to_owned(), "ようこそ".to_owned())];
/// let caller = BTreeMap::from([
///     ("subject".to_owned(), "spoofed".to_owned()),
///     ("X-Campaign".to_owned(), "welcome-2026".to_owned()),
/// ]);
/// let merged = merge_headers(computed, &caller);
/// assert_eq!(merged.len(), 2);
/// assert_eq!(merged[0].1, "ようこそ");
/// assert_eq!(merged[1].0, "X-Campaign");
/// ```
#[must_use]
pub fn merge_headers(
    computed: Vec<(String, String)>,
    caller: &BTreeMap<String, String>,
) -> Vec<(String, String)> {
    let mut merged = computed;
    for (name, value) in caller {
        let name = name.trim();
        if is_protected(name) || !is_valid_name(name) || !is_valid_value(value) {
            tracing::debug!(header = name, "dropping caller-supplied mail header");
            continue;
        }
        if merged
            .iter()
            .any(|(existing, _)| existing.eq_ignore_ascii_case(name))
        {
            continue;
        }
        merged.push((name.to_owned(), value.clone()));
    }
    merged
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_graphic() && b != b':')
}

fn is_valid_value(value: &str) -> bool {
    !value.contains(['\r', '\n'])
}

#[cfg(test)]
mod tests {
    //! Regression coverage for header merging.
    use super::*;
    use rstest::rstest;

    fn computed() -> Vec<(String, String)> {
        vec![
            ("From".to_owned(), "noreply@diary.example".to_owned()),
            ("To".to_owned(), "hanako@example.com".to_owned()),
            ("Subject".to_owned(), "ようこそ".to_owned()),
            ("MIME-Version".to_owned(), "1.0".to_owned()),
            ("Content-Type".to_owned(), "multipart/alternative".to_owned()),
        ]
    }

    #[rstest]
    #[case::from("From")]
    #[case::to("to")]
    #[case::cc("CC")]
    #[case::bcc("bcc")]
    #[case::subject("Subject")]
    #[case::mime("mime-version")]
    #[case::content_type("Content-Type")]
    #[case::reply_to("reply-to")]
    fn protected_headers_cannot_be_overridden(#[case] name: &str) {
        let caller = BTreeMap::from([(name.to_owned(), "attacker".to_owned())]);
        let merged = merge_headers(computed(), &caller);
        assert_eq!(merged, computed());
    }

    #[rstest]
    fn custom_headers_are_appended() {
        let caller = BTreeMap::from([
            ("X-Family-Id".to_owned(), "f-1".to_owned()),
            ("List-Unsubscribe".to_owned(), "<https://diary.example/u>".to_owned()),
        ]);
        let merged = merge_headers(computed(), &caller);
        assert_eq!(merged.len(), computed().len() + 2);
        assert!(merged.contains(&("X-Family-Id".to_owned(), "f-1".to_owned())));
    }

    #[rstest]
    #[case::newline_injection("X-Note", "a\r\nBcc: victim@example.com")]
    #[case::colon_in_name("X:Bad", "value")]
    #[case::space_in_name("X Bad", "value")]
    #[case::empty_name("  ", "value")]
    fn unsafe_headers_are_dropped(#[case] name: &str, #[case] value: &str) {
        let caller = BTreeMap::from([(name.to_owned(), value.to_owned())]);
        let merged = merge_headers(computed(), &caller);
        assert_eq!(merged, computed());
    }

    #[rstest]
    fn is_protected_ignores_case_and_padding() {
        assert!(is_protected(" reply-TO "));
        assert!(!is_protected("X-Reply-To"));
    }
}
