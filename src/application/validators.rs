use validator::ValidateEmail;

/// Validates that the input looks like a valid email address.
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    !email.is_empty() && email.validate_email()
}

/// Password policy: minimum 8 characters with at least one uppercase
/// letter, one lowercase letter and one digit. Returns every failed rule
/// so the client can show them all at once.
pub fn password_strength_errors(password: &str) -> Vec<&'static str> {
    let mut errors = Vec::new();
    if password.len() < 8 {
        errors.push("Password must be at least 8 characters long");
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        errors.push("Password must contain at least one uppercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        errors.push("Password must contain at least one lowercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        errors.push("Password must contain at least one number");
    }
    errors
}

/// OTP codes are exactly six ASCII digits.
pub fn is_valid_otp_code(code: &str) -> bool {
    code.len() == 6 && code.chars().all(|c| c.is_ascii_digit())
}

/// Support ticket descriptions must carry enough detail to act on but
/// stay bounded.
pub fn is_valid_ticket_description(description: &str) -> bool {
    (10..=2000).contains(&description.chars().count())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_emails() {
        assert!(is_valid_email("test@example.com"));
        assert!(is_valid_email("user.name@domain.co.uk"));
        assert!(is_valid_email("user+tag@example.org"));
    }

    #[test]
    fn test_invalid_emails() {
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("   "));
        assert!(!is_valid_email("notanemail"));
        assert!(!is_valid_email("@nodomain.com"));
    }

    #[test]
    fn test_password_policy() {
        assert!(password_strength_errors("Secur3Pass").is_empty());
        assert_eq!(password_strength_errors("short").len(), 3);
        assert_eq!(
            password_strength_errors("alllowercase1"),
            vec!["Password must contain at least one uppercase letter"]
        );
        assert_eq!(
            password_strength_errors("NoDigitsHere"),
            vec!["Password must contain at least one number"]
        );
    }

    #[test]
    fn test_otp_shape() {
        assert!(is_valid_otp_code("123456"));
        assert!(!is_valid_otp_code("12345"));
        assert!(!is_valid_otp_code("1234567"));
        assert!(!is_valid_otp_code("12a456"));
    }

    #[test]
    fn test_ticket_description_bounds() {
        assert!(!is_valid_ticket_description("too short"));
        assert!(is_valid_ticket_description("long enough to describe a problem"));
        assert!(!is_valid_ticket_description(&"x".repeat(2001)));
    }
}
