//! Registration form sanitization and field validation.

use std::sync::LazyLock;

use regex::Regex;
use roster_core::text::optional_text;
use secrecy::SecretString;
use serde::Deserialize;

use crate::users::NewUser;

/// A rejected registration field. The message is user-facing.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Raw registration body as submitted by the client. Every field is optional
/// so missing fields produce "is required" messages rather than parse errors,
/// and scalar values are read as text.
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistrationForm {
    #[serde(deserialize_with = "optional_text")]
    pub first_name: Option<String>,
    #[serde(deserialize_with = "optional_text")]
    pub last_name: Option<String>,
    #[serde(deserialize_with = "optional_text")]
    pub mobile: Option<String>,
    #[serde(deserialize_with = "optional_text")]
    pub email: Option<String>,
    #[serde(deserialize_with = "optional_text")]
    pub street: Option<String>,
    #[serde(deserialize_with = "optional_text")]
    pub city: Option<String>,
    #[serde(deserialize_with = "optional_text")]
    pub state: Option<String>,
    #[serde(deserialize_with = "optional_text")]
    pub country: Option<String>,
    #[serde(deserialize_with = "optional_text")]
    pub login_id: Option<String>,
    #[serde(deserialize_with = "optional_text")]
    pub password: Option<String>,
}

impl std::fmt::Debug for RegistrationForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrationForm")
            .field("email", &self.email)
            .field("login_id", &self.login_id)
            .finish_non_exhaustive()
    }
}

static NAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z]+$").expect("name regex"));
static MOBILE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]{10}$").expect("mobile regex"));
static EMAIL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\S+@\S+\.\S+$").expect("email regex"));
static LOGIN_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]{8}$").expect("login id regex"));
static STREET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9\s,.-]+$").expect("street regex"));
static PLACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z\s]+$").expect("place regex"));

fn trimmed(field: &Option<String>) -> String {
    field.as_deref().unwrap_or("").trim().to_string()
}

fn require(value: &str, label: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::new(format!("{label} is required")));
    }
    Ok(())
}

fn check(re: &Regex, value: &str, msg: &str) -> Result<(), ValidationError> {
    if !re.is_match(value) {
        return Err(ValidationError::new(msg));
    }
    Ok(())
}

/// 6+ chars with at least one lowercase, one uppercase and one character
/// that is neither a letter nor a digit.
pub fn is_strong_password(password: &str) -> bool {
    password.chars().count() >= 6
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| !c.is_ascii_alphanumeric())
}

impl RegistrationForm {
    /// Trim every field, lower-case the email, and validate in a fixed order.
    /// The first failing check wins.
    pub fn validate(&self) -> Result<NewUser, ValidationError> {
        let first_name = trimmed(&self.first_name);
        let last_name = trimmed(&self.last_name);
        let mobile = trimmed(&self.mobile);
        let email = trimmed(&self.email).to_lowercase();
        let street = trimmed(&self.street);
        let city = trimmed(&self.city);
        let state = trimmed(&self.state);
        let country = trimmed(&self.country);
        let login_id = trimmed(&self.login_id);
        let password = trimmed(&self.password);

        require(&first_name, "First Name")?;
        require(&last_name, "Last Name")?;
        require(&mobile, "Mobile")?;
        require(&email, "Email")?;
        require(&street, "Street")?;
        require(&city, "City")?;
        require(&state, "State")?;
        require(&country, "Country")?;
        require(&login_id, "Login ID")?;
        require(&password, "Password")?;

        check(&NAME, &first_name, "First Name must contain only letters")?;
        check(&NAME, &last_name, "Last Name must contain only letters")?;
        check(&MOBILE, &mobile, "Mobile must be 10 digits")?;
        check(&EMAIL, &email, "Invalid Email format")?;
        check(
            &STREET,
            &street,
            "Street can only have letters, numbers and common punctuation",
        )?;
        check(&PLACE, &city, "City must contain only letters")?;
        check(&PLACE, &state, "State must contain only letters")?;
        check(&PLACE, &country, "Country must contain only letters")?;
        check(
            &LOGIN_ID,
            &login_id,
            "Login ID must be exactly 8 alphanumeric characters",
        )?;
        if !is_strong_password(&password) {
            return Err(ValidationError::new(
                "Password must be 6+ chars with 1 uppercase, 1 lowercase & 1 special char",
            ));
        }

        Ok(NewUser {
            first_name,
            last_name,
            mobile,
            email,
            street,
            city,
            state,
            country,
            login_id,
            password: SecretString::from(password),
        })
    }
}
