use anyhow::Context;
use device_session::Credentials;
use dialoguer::{Input, Password};
use std::sync::Arc;

/// Credential sets for the two phases. Both carry the same enable secret.
pub(crate) struct CredentialBook {
    pub(crate) local: Arc<Credentials>,
    pub(crate) directory: Arc<Credentials>,
}

impl CredentialBook {
    pub(crate) fn new(local: Credentials, directory: Credentials) -> Self {
        Self {
            local: Arc::new(local),
            directory: Arc::new(directory),
        }
    }
}

/// Raw operator answers, validated by [`CredentialAnswers::into_book`].
pub(crate) struct CredentialAnswers {
    pub(crate) local_username: String,
    pub(crate) local_password: String,
    pub(crate) directory_username: String,
    pub(crate) directory_password: String,
    pub(crate) enable_secret: String,
}

impl CredentialAnswers {
    pub(crate) fn into_book(self) -> anyhow::Result<CredentialBook> {
        let local_username = self.local_username.trim().to_string();
        let directory_username = self.directory_username.trim().to_string();
        if local_username.is_empty() {
            anyhow::bail!("local username must not be empty");
        }
        if directory_username.is_empty() {
            anyhow::bail!("directory username must not be empty");
        }
        let secondary = Some(self.enable_secret).filter(|secret| !secret.is_empty());
        Ok(CredentialBook::new(
            Credentials::new(local_username, self.local_password, secondary.clone()),
            Credentials::new(directory_username, self.directory_password, secondary),
        ))
    }
}

/// Asks for both credential sets and the enable secret on the terminal.
pub(crate) fn prompt_credentials() -> anyhow::Result<CredentialBook> {
    let local_username: String = Input::new()
        .with_prompt("Local username")
        .interact_text()
        .context("failed to read local username")?;
    let local_password = Password::new()
        .with_prompt("Local password")
        .allow_empty_password(true)
        .interact()
        .context("failed to read local password")?;
    let directory_username: String = Input::new()
        .with_prompt("Directory username")
        .interact_text()
        .context("failed to read directory username")?;
    let directory_password = Password::new()
        .with_prompt("Directory password")
        .allow_empty_password(true)
        .interact()
        .context("failed to read directory password")?;
    let enable_secret = Password::new()
        .with_prompt("Enable secret (empty for none)")
        .allow_empty_password(true)
        .interact()
        .context("failed to read enable secret")?;

    CredentialAnswers {
        local_username,
        local_password,
        directory_username,
        directory_password,
        enable_secret,
    }
    .into_book()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answers() -> CredentialAnswers {
        CredentialAnswers {
            local_username: " netops ".to_string(),
            local_password: "local-pw".to_string(),
            directory_username: "jdoe".to_string(),
            directory_password: "ad-pw".to_string(),
            enable_secret: "en4ble".to_string(),
        }
    }

    #[test]
    fn both_sets_share_the_enable_secret() {
        let book = answers().into_book().expect("book");
        assert_eq!(book.local.username, "netops");
        assert_eq!(book.local.password(), "local-pw");
        assert_eq!(book.directory.username, "jdoe");
        assert_eq!(book.directory.password(), "ad-pw");
        assert_eq!(book.local.secondary(), Some("en4ble"));
        assert_eq!(book.directory.secondary(), Some("en4ble"));
    }

    #[test]
    fn empty_enable_secret_means_none() {
        let mut raw = answers();
        raw.enable_secret.clear();
        let book = raw.into_book().expect("book");
        assert!(book.local.secondary().is_none());
        assert!(book.directory.secondary().is_none());
    }

    #[test]
    fn blank_usernames_are_rejected() {
        let mut raw = answers();
        raw.local_username = "   ".to_string();
        let err = raw.into_book().err().expect("blank local user");
        assert!(err.to_string().contains("local username"));

        let mut raw = answers();
        raw.directory_username.clear();
        let err = raw.into_book().err().expect("blank directory user");
        assert!(err.to_string().contains("directory username"));
    }
}
