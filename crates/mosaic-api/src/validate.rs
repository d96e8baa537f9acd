/// Input shape checks shared by the auth and profile handlers. Uniqueness
/// is the schema's job; these only catch malformed input before it costs a
/// query.

pub(crate) fn is_valid_username(username: &str) -> bool {
    let len = username.chars().count();
    (3..=30).contains(&len)
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

pub(crate) fn is_valid_password(password: &str) -> bool {
    password.len() >= 6
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_rules() {
        assert!(is_valid_username("alice_01"));
        assert!(!is_valid_username("ab"));
        assert!(!is_valid_username("has space"));
        assert!(!is_valid_username(&"x".repeat(31)));
    }

    #[test]
    fn email_rules() {
        assert!(is_valid_email("alice@example.com"));
        assert!(is_valid_email("a.b@sub.example.org"));
        assert!(!is_valid_email("no-at-sign"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("alice@nodot"));
        assert!(!is_valid_email("alice@exam ple.com"));
        assert!(!is_valid_email("alice@@example.com"));
    }

    #[test]
    fn password_rules() {
        assert!(is_valid_password("secret"));
        assert!(!is_valid_password("short"));
    }
}
