//! Client for the account endpoints of the feed service. Credential checks
//! and token issuance happen server-side; this only asks for a token.

use reqwest::Client;
use shared::protocol::{Credentials, LoginResponse, StatusMessage};
use tracing::info;
use url::Url;

use crate::{
    config::ClientConfig,
    error::{ClientError, Result},
    session::Session,
    transport::{build_http_client, check_status, endpoint},
};

pub struct AccountClient {
    http: Client,
    api_base_url: Url,
}

impl AccountClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Ok(Self {
            http: build_http_client(config)?,
            api_base_url: Url::parse(&config.api_base_url)?,
        })
    }

    pub async fn sign_up(&self, username: &str, password: &str) -> Result<()> {
        let credentials = validated(username, password)?;
        let response = self
            .http
            .post(endpoint(&self.api_base_url, &["signup"])?)
            .json(&credentials)
            .send()
            .await?;
        let body: StatusMessage = check_status(response).await?.json().await?;
        info!(username, message = %body.message, "auth: account created");
        Ok(())
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<Session> {
        let credentials = validated(username, password)?;
        let response = self
            .http
            .post(endpoint(&self.api_base_url, &["login"])?)
            .json(&credentials)
            .send()
            .await?;
        let body: LoginResponse = check_status(response).await?.json().await?;
        info!(username, "auth: logged in");
        Session::new(body.access_token, username)
            .map_err(|_| ClientError::InvalidResponse("server issued an empty token".into()))
    }
}

fn validated(username: &str, password: &str) -> Result<Credentials> {
    if username.trim().is_empty() || password.is_empty() {
        return Err(ClientError::EmptyInput);
    }
    Ok(Credentials {
        username: username.to_string(),
        password: password.to_string(),
    })
}

#[cfg(test)]
#[path = "tests/auth_tests.rs"]
mod tests;
