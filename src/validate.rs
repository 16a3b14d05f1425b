use std::collections::BTreeMap;

use serde::Serialize;

const MIN_PASSWORD_LEN: usize = 6;
const MIN_USERNAME_LEN: usize = 3;

/// Per-field messages, keyed by form field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<&'static str, &'static str>);

impl FieldErrors {
    fn check(&mut self, field: &'static str, ok: bool, message: &'static str) {
        if !ok {
            self.0.entry(field).or_insert(message);
        }
    }

    pub fn get(&self, field: &str) -> Option<&'static str> {
        self.0.get(field).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

pub fn sign_in(email: &str, password: &str) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::default();
    errors.check("email", is_email(email), "Invalid email address");
    errors.check(
        "password",
        password.chars().count() >= MIN_PASSWORD_LEN,
        "Password must be at least 6 characters long",
    );
    errors.into_result()
}

pub fn sign_up(email: &str, password: &str, username: &str) -> Result<(), FieldErrors> {
    let mut errors = match sign_in(email, password) {
        Ok(()) => FieldErrors::default(),
        Err(errors) => errors,
    };
    errors.check(
        "username",
        username.trim().chars().count() >= MIN_USERNAME_LEN,
        "Username must be at least 3 characters long",
    );
    errors.into_result()
}

pub fn task(text: &str) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::default();
    errors.check("task", !text.trim().is_empty(), "Task is required");
    errors.into_result()
}

fn is_email(input: &str) -> bool {
    let input = input.trim();
    let Some((local, domain)) = input.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !input.chars().any(char::is_whitespace)
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shapes() {
        for ok in ["a@b.co", "first.last@mail.example.org", " pad@ded.io "] {
            assert!(is_email(ok), "{ok}");
        }
        for bad in ["", "plain", "@b.co", "a@", "a@b", "a@.co", "a@b.", "a b@c.de", "a@b@c.de"] {
            assert!(!is_email(bad), "{bad}");
        }
    }

    #[test]
    fn sign_in_reports_each_field() {
        let errors = sign_in("nope", "123").unwrap_err();
        assert_eq!(errors.get("email"), Some("Invalid email address"));
        assert_eq!(
            errors.get("password"),
            Some("Password must be at least 6 characters long")
        );
        assert!(sign_in("a@b.co", "123456").is_ok());
    }

    #[test]
    fn sign_up_adds_username_rule() {
        let errors = sign_up("a@b.co", "123456", " ab ").unwrap_err();
        assert_eq!(errors.get("email"), None);
        assert_eq!(
            errors.get("username"),
            Some("Username must be at least 3 characters long")
        );
        assert!(sign_up("a@b.co", "123456", "abc").is_ok());
    }

    #[test]
    fn task_is_required() {
        assert_eq!(task("   ").unwrap_err().get("task"), Some("Task is required"));
        assert!(task("buy milk").is_ok());
    }
}
