use secrecy::{ExposeSecret, SecretString};

/// Login material for one phase. `secondary` is the enable secret.
#[derive(Debug)]
pub struct Credentials {
    pub username: String,
    password: SecretString,
    secondary: Option<SecretString>,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: String, secondary: Option<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password),
            secondary: secondary
                .filter(|value| !value.is_empty())
                .map(SecretString::from),
        }
    }

    pub fn password(&self) -> &str {
        self.password.expose_secret()
    }

    pub fn secondary(&self) -> Option<&str> {
        self.secondary.as_ref().map(|secret| secret.expose_secret())
    }
}
