//! Input sanitizers applied to request parameters before they are sent.
//!
//! These mirror the rules the licensing server's own admin forms use, so a
//! value accepted here is accepted there.

const EMAIL_LOCAL_SPECIALS: &str = "!#$%&'*+/=?^_`{|}~.-";

/// Sanitizes a free text field: strips markup tags and percent-encoded
/// octets, folds tabs and line breaks into single spaces, trims.
#[must_use]
pub fn sanitize_text_field(input: &str) -> String {
    let mut stripped = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '<' if chars.peek().is_some_and(|n| n.is_ascii_alphabetic() || *n == '/' || *n == '!') => {
                for n in chars.by_ref() {
                    if n == '>' {
                        break;
                    }
                }
            }
            '%' => {
                let mut lookahead = chars.clone();
                let hex = matches!(
                    (lookahead.next(), lookahead.next()),
                    (Some(a), Some(b)) if a.is_ascii_hexdigit() && b.is_ascii_hexdigit()
                );
                if hex {
                    chars.next();
                    chars.next();
                } else {
                    stripped.push(c);
                }
            }
            c if c.is_control() => stripped.push(' '),
            c => stripped.push(c),
        }
    }
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Sanitizes an email address. Returns an empty string when nothing
/// resembling a valid address remains.
#[must_use]
pub fn sanitize_email(input: &str) -> String {
    let email = input.trim();
    if email.len() < 6 {
        return String::new();
    }
    let Some((local, domain)) = email.split_once('@') else {
        return String::new();
    };
    if local.is_empty() {
        return String::new();
    }

    let local: String = local
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || EMAIL_LOCAL_SPECIALS.contains(*c))
        .collect();
    if local.is_empty() || domain.contains("..") {
        return String::new();
    }

    let domain = domain.trim_matches(|c: char| c.is_whitespace() || c == '\0' || c == '.');
    let labels: Vec<String> = domain
        .split('.')
        .map(|label| {
            label
                .trim_matches(|c: char| c.is_whitespace() || c == '\0' || c == '-')
                .chars()
                .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
                .collect::<String>()
        })
        .filter(|label| !label.is_empty())
        .collect();
    if labels.len() < 2 {
        return String::new();
    }

    format!("{local}@{}", labels.join("."))
}
