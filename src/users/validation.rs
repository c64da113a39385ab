use chrono::{Datelike, NaiveDate};
use regex::Regex;
use std::sync::OnceLock;

use crate::error::AppError;
use crate::Result;

const PASSWORD_LEN: std::ops::RangeInclusive<usize> = 8..=10;
const NICKNAME_LEN: std::ops::RangeInclusive<usize> = 4..=10;
const BIRTH_YEARS: std::ops::RangeInclusive<i32> = 1920..=2018;
const MAX_INTRODUCTION_LEN: usize = 255;

fn email_pattern() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern compiles")
    })
}

fn birthday_pattern() -> &'static Regex {
    static BIRTHDAY: OnceLock<Regex> = OnceLock::new();
    BIRTHDAY.get_or_init(|| {
        Regex::new(r"^[0-9]{4}-[0-9]{1,2}-[0-9]{1,2}$").expect("birthday pattern compiles")
    })
}

fn invalid(message: &str) -> AppError {
    AppError::ValidationError(message.to_string())
}

pub fn validate_email(email: &str) -> Result<()> {
    if !email_pattern().is_match(email) {
        return Err(invalid("invalid email address"));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<()> {
    let len = password.chars().count();
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());

    if !PASSWORD_LEN.contains(&len) || !has_digit || !has_lower || !has_upper {
        return Err(invalid(
            "password must be 8 to 10 characters with a digit, a lowercase and an uppercase letter",
        ));
    }
    Ok(())
}

pub fn validate_signup(email: &str, password: &str, confirm_password: &str) -> Result<()> {
    validate_email(email)?;
    validate_password(password)?;
    if password != confirm_password {
        return Err(invalid("passwords do not match"));
    }
    Ok(())
}

pub fn validate_nickname(nickname: &str) -> Result<()> {
    if !NICKNAME_LEN.contains(&nickname.chars().count()) {
        return Err(invalid("nickname must be 4 to 10 characters"));
    }
    Ok(())
}

/// `YYYY-MM-DD`; month and day may omit the leading zero.
pub fn validate_birthday(birthday: &str) -> Result<()> {
    let format_error = || invalid("birthday must be a date in YYYY-MM-DD format");
    // chrono alone accepts signed years and padding spaces
    if !birthday_pattern().is_match(birthday) {
        return Err(format_error());
    }
    let date = NaiveDate::parse_from_str(birthday, "%Y-%m-%d").map_err(|_| format_error())?;

    if !BIRTH_YEARS.contains(&date.year()) {
        return Err(invalid("birthday year must be between 1920 and 2018"));
    }
    Ok(())
}

pub fn validate_introduction(introduction: &str) -> Result<()> {
    if introduction.chars().count() > MAX_INTRODUCTION_LEN {
        return Err(invalid("introduction must be at most 255 characters"));
    }
    Ok(())
}

pub fn validate_profile(nickname: &str, birthday: &str, introduction: &str) -> Result<()> {
    validate_nickname(nickname)?;
    validate_birthday(birthday)?;
    validate_introduction(introduction)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email() {
        assert!(validate_email("alice@example.com").is_ok());
        assert!(validate_email("a.b+c@mail.example.org").is_ok());
        assert!(validate_email("alice").is_err());
        assert!(validate_email("alice@example").is_err());
        assert!(validate_email("al ice@example.com").is_err());
        assert!(validate_email("").is_err());
    }

    #[test]
    fn test_password() {
        assert!(validate_password("Passw0rd").is_ok());
        assert!(validate_password("Passw0rd12").is_ok());
        assert!(validate_password("Pass0rd").is_err(), "too short");
        assert!(validate_password("Passw0rd123").is_err(), "too long");
        assert!(validate_password("password1").is_err(), "no uppercase");
        assert!(validate_password("PASSWORD1").is_err(), "no lowercase");
        assert!(validate_password("Password").is_err(), "no digit");
    }

    #[test]
    fn test_signup_confirmation() {
        assert!(validate_signup("alice@example.com", "Passw0rd", "Passw0rd").is_ok());
        let err = validate_signup("alice@example.com", "Passw0rd", "Passw0rd!").unwrap_err();
        assert_eq!(err.to_string(), "Validation error: passwords do not match");
    }

    #[test]
    fn test_nickname() {
        assert!(validate_nickname("abcd").is_ok());
        assert!(validate_nickname("abcdefghij").is_ok());
        assert!(validate_nickname("abc").is_err());
        assert!(validate_nickname("abcdefghijk").is_err());
    }

    #[test]
    fn test_birthday() {
        assert!(validate_birthday("1990-01-31").is_ok());
        assert!(validate_birthday("2018-12-31").is_ok());
        assert!(validate_birthday("1920-1-1").is_ok());
        assert!(validate_birthday("1919-12-31").is_err());
        assert!(validate_birthday("2019-01-01").is_err());
        assert!(validate_birthday("1990-02-30").is_err());
        assert!(validate_birthday("1990/01/01").is_err());
        assert!(validate_birthday("").is_err());
        assert!(validate_birthday("+1990-01-01").is_err());
        assert!(validate_birthday(" 1990-01-01").is_err());
        assert!(validate_birthday("1990- 1- 1").is_err());
        assert!(validate_birthday("+01990-1-1").is_err());
        assert!(validate_birthday("1990-01-01 ").is_err());
    }

    #[test]
    fn test_introduction() {
        assert!(validate_introduction("").is_ok());
        assert!(validate_introduction(&"x".repeat(255)).is_ok());
        assert!(validate_introduction(&"x".repeat(256)).is_err());
    }
}
