/// Lowercase the name, map runs of non-alphanumeric characters to a single
/// hyphen and trim leading/trailing hyphens. "Acme Inc" becomes "acme-inc".
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_was_hyphen = true; // suppress a leading hyphen

    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_was_hyphen = false;
        } else if !last_was_hyphen {
            slug.push('-');
            last_was_hyphen = true;
        }
    }

    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Candidate slugs for an organization name: the plain slug first, then
/// numbered variants for collision retry ("acme-inc-1", "acme-inc-2", ...).
pub fn slug_candidate(base: &str, attempt: u32) -> String {
    if attempt == 0 {
        base.to_string()
    } else {
        format!("{}-{}", base, attempt)
    }
}

pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !slug.starts_with('-')
        && !slug.ends_with('-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugifies_company_names() {
        assert_eq!(slugify("Acme Inc"), "acme-inc");
        assert_eq!(slugify("  Tenant X!  "), "tenant-x");
        assert_eq!(slugify("already-a-slug"), "already-a-slug");
        assert_eq!(slugify("Ünïcode Co"), "n-code-co");
    }

    #[test]
    fn numbered_candidates_after_first_attempt() {
        assert_eq!(slug_candidate("acme-inc", 0), "acme-inc");
        assert_eq!(slug_candidate("acme-inc", 1), "acme-inc-1");
        assert_eq!(slug_candidate("acme-inc", 2), "acme-inc-2");
    }

    #[test]
    fn validates_url_safe_slugs() {
        assert!(is_valid_slug("acme-inc"));
        assert!(is_valid_slug("acme2"));
        assert!(!is_valid_slug(""));
        assert!(!is_valid_slug("Acme"));
        assert!(!is_valid_slug("-acme"));
        assert!(!is_valid_slug("acme inc"));
    }
}
