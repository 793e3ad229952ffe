/// Cheap structural email check; deliverability is the mail queue's problem.
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.contains(char::is_whitespace)
}

pub const MIN_PASSWORD_LENGTH: usize = 8;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_addresses() {
        assert!(is_valid_email("a@acme.com"));
        assert!(is_valid_email("first.last@sub.example.co"));
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert!(!is_valid_email("acme.com"));
        assert!(!is_valid_email("@acme.com"));
        assert!(!is_valid_email("a@"));
        assert!(!is_valid_email("a@acme"));
        assert!(!is_valid_email("a b@acme.com"));
        assert!(!is_valid_email("a@.com"));
    }
}
