use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::models::user::{LoginRequest, SignupRequest};

lazy_static! {
    static ref EMAIL_PATTERN: Regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$"
    )
    .expect("email pattern is valid");
}

const VALID_TLDS: &[&str] = &[
    "com", "org", "net", "edu", "gov", "mil", "int", "co", "io", "me", "tv", "info", "biz", "name",
    "mobi", "tel", "travel", "museum", "aero", "coop", "jobs", "post", "pro", "xxx", "ac", "ad",
    "ae", "af", "ag", "ai", "al", "am", "ao", "aq", "ar", "as", "at", "au", "aw", "ax", "az", "ba",
    "bb", "bd", "be", "bf", "bg", "bh", "bi", "bj", "bm", "bn", "bo", "br", "bs", "bt", "bv", "bw",
    "by", "bz", "ca", "cc", "cd", "cf", "cg", "ch", "ci", "ck", "cl", "cm", "cn", "cr", "cu", "cv",
    "cw", "cx", "cy", "cz", "de", "dj", "dk", "dm", "do", "dz", "ec", "ee", "eg", "eh", "er", "es",
    "et", "eu", "fi", "fj", "fk", "fm", "fo", "fr", "ga", "gb", "gd", "ge", "gf", "gg", "gh", "gi",
    "gl", "gm", "gn", "gp", "gq", "gr", "gs", "gt", "gu", "gw", "gy", "hk", "hm", "hn", "hr", "ht",
    "hu", "id", "ie", "il", "im", "in", "iq", "ir", "is", "it", "je", "jm", "jo", "jp", "ke", "kg",
    "kh", "ki", "km", "kn", "kp", "kr", "kw", "ky", "kz", "la", "lb", "lc", "li", "lk", "lr", "ls",
    "lt", "lu", "lv", "ly", "ma", "mc", "md", "mg", "mh", "mk", "ml", "mm", "mn", "mo", "mp", "mq",
    "mr", "ms", "mt", "mu", "mv", "mw", "mx", "my", "mz", "na", "nc", "ne", "nf", "ng", "ni", "nl",
    "no", "np", "nr", "nu", "nz", "om", "pa", "pe", "pf", "pg", "ph", "pk", "pl", "pm", "pn", "pr",
    "ps", "pt", "pw", "py", "qa", "re", "ro", "rs", "ru", "rw", "sa", "sb", "sc", "sd", "se", "sg",
    "sh", "si", "sj", "sk", "sl", "sm", "sn", "so", "sr", "ss", "st", "su", "sv", "sx", "sy", "sz",
    "tc", "td", "tf", "tg", "th", "tj", "tk", "tl", "tm", "tn", "to", "tr", "tt", "tw", "tz", "ua",
    "ug", "uk", "us", "uy", "uz", "va", "vc", "ve", "vg", "vi", "vn", "vu", "wf", "ws", "ye", "yt",
    "za", "zm", "zw",
];

const DISPOSABLE_PROVIDERS: &[&str] = &[
    "10minutemail.com",
    "tempmail.org",
    "guerrillamail.com",
    "mailinator.com",
    "yopmail.com",
    "temp-mail.org",
    "throwaway.email",
    "getnada.com",
    "maildrop.cc",
    "mohmal.com",
    "fakeinbox.com",
    "33mail.com",
    "mailcatch.com",
    "trashmail.com",
    "sharklasers.com",
    "grr.la",
];

const PROVIDER_TYPOS: &[(&str, &[&str])] = &[
    (
        "gmail.com",
        &["gmai.com", "gmial.com", "gmail.co", "gmaill.com", "gmai.co"],
    ),
    ("yahoo.com", &["yaho.com", "yahoo.co", "yahooo.com", "yhoo.com"]),
    (
        "hotmail.com",
        &["hotmai.com", "hotmial.com", "hotmal.com", "hotmailcom"],
    ),
    ("outlook.com", &["outlok.com", "outlook.co", "outlookcom"]),
    ("icloud.com", &["iclod.com", "icloud.co", "icloudcom"]),
];

/// A single rejected form field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// Every rejected field of a form, in on-screen order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormErrors(pub Vec<FieldError>);

impl FormErrors {
    pub fn message_for(&self, field: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }

    fn collect(errors: &ValidationErrors, order: &[&'static str]) -> Self {
        let by_field = errors.field_errors();
        let fields = order
            .iter()
            .filter_map(|field| {
                let first = by_field.get(*field)?.first()?;
                let message = first
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| first.code.to_string());
                Some(FieldError {
                    field: *field,
                    message,
                })
            })
            .collect();
        FormErrors(fields)
    }
}

impl fmt::Display for FormErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self.0.iter().map(|e| e.message.as_str()).collect();
        f.write_str(&messages.join("; "))
    }
}

fn rule(code: &'static str, message: impl Into<String>) -> ValidationError {
    let message: String = message.into();
    ValidationError::new(code).with_message(message.into())
}

/// Address checks applied before an email is ever sent to the backend.
pub fn check_email(email: &str) -> Result<(), ValidationError> {
    if email.is_empty() {
        return Err(rule("required", "Email is required"));
    }
    if !EMAIL_PATTERN.is_match(email) {
        return Err(rule("format", "Invalid email format"));
    }

    let (local, domain) = email.split_once('@').unwrap_or((email, ""));
    if local.is_empty() {
        return Err(rule("local_part", "Email username is too short"));
    }
    if domain.len() < 3 {
        return Err(rule("domain", "Domain name is too short"));
    }
    if email.contains("..") {
        return Err(rule("consecutive_dots", "Email cannot have consecutive dots"));
    }

    let domain = domain.to_lowercase();
    let tld = domain.rsplit('.').next().unwrap_or_default();
    if !VALID_TLDS.contains(&tld) {
        return Err(rule("tld", "Invalid domain extension"));
    }
    if DISPOSABLE_PROVIDERS.contains(&domain.as_str()) {
        return Err(rule(
            "disposable",
            "Disposable email addresses are not allowed",
        ));
    }
    if let Some((correct, _)) = PROVIDER_TYPOS
        .iter()
        .find(|(_, typos)| typos.contains(&domain.as_str()))
    {
        return Err(rule("typo", format!("Did you mean {}?", correct)));
    }

    Ok(())
}

fn check_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(rule("required", "Name is required"));
    }
    if name.chars().count() < 2 {
        return Err(rule("length", "Name must be at least 2 characters"));
    }
    Ok(())
}

fn check_new_password(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(rule("required", "Password is required"));
    }
    if password.chars().count() < 6 {
        return Err(rule(
            "length",
            "Password must be at least 6 characters long",
        ));
    }
    Ok(())
}

fn check_password_present(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(rule("required", "Password is required"));
    }
    Ok(())
}

/// Signup form values, trimmed on construction.
#[derive(Debug, Clone, Validate)]
pub struct SignupForm {
    #[validate(custom(function = "check_name"))]
    pub name: String,
    #[validate(custom(function = "check_email"))]
    pub email: String,
    #[validate(custom(function = "check_new_password"))]
    pub password: String,
}

impl SignupForm {
    pub fn new(name: &str, email: &str, password: &str) -> Self {
        Self {
            name: name.trim().to_string(),
            email: email.trim().to_string(),
            password: password.trim().to_string(),
        }
    }

    pub fn check(&self) -> Result<(), FormErrors> {
        self.validate()
            .map_err(|e| FormErrors::collect(&e, &["name", "email", "password"]))
    }

    pub fn to_request(&self) -> SignupRequest {
        SignupRequest {
            name: self.name.clone(),
            email: self.email.clone(),
            password: self.password.clone(),
        }
    }
}

/// Login form values, trimmed on construction.
#[derive(Debug, Clone, Validate)]
pub struct LoginForm {
    #[validate(custom(function = "check_email"))]
    pub email: String,
    #[validate(custom(function = "check_password_present"))]
    pub password: String,
}

impl LoginForm {
    pub fn new(email: &str, password: &str) -> Self {
        Self {
            email: email.trim().to_string(),
            password: password.trim().to_string(),
        }
    }

    pub fn check(&self) -> Result<(), FormErrors> {
        self.validate()
            .map_err(|e| FormErrors::collect(&e, &["email", "password"]))
    }

    pub fn to_request(&self) -> LoginRequest {
        LoginRequest {
            email: self.email.clone(),
            password: self.password.clone(),
        }
    }
}
