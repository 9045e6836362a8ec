use async_trait::async_trait;
use reqwest::{header::AUTHORIZATION, Client, RequestBuilder, Response};
use shared::{
    domain::{Message, MessageId},
    error::ApiError,
    protocol::{ListMessagesQuery, PostMessageRequest, VoteRequest},
};
use tracing::debug;
use url::Url;

use crate::{
    config::ClientConfig,
    error::{ClientError, Result},
    session::Session,
};

/// The remote feed service as the core sees it.
#[async_trait]
pub trait FeedTransport: Send + Sync {
    async fn fetch_messages(&self, session: &Session) -> Result<Vec<Message>>;
    async fn post_message(
        &self,
        session: &Session,
        request: &PostMessageRequest,
    ) -> Result<Message>;
    async fn cast_vote(
        &self,
        session: &Session,
        message_id: &MessageId,
        request: &VoteRequest,
    ) -> Result<()>;
}

pub struct HttpFeedTransport {
    http: Client,
    api_base_url: Url,
}

impl HttpFeedTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Ok(Self {
            http: build_http_client(config)?,
            api_base_url: Url::parse(&config.api_base_url)?,
        })
    }

    fn authorized(&self, builder: RequestBuilder, session: &Session) -> RequestBuilder {
        builder.header(AUTHORIZATION, session.token())
    }
}

#[async_trait]
impl FeedTransport for HttpFeedTransport {
    async fn fetch_messages(&self, session: &Session) -> Result<Vec<Message>> {
        let url = endpoint(&self.api_base_url, &["messages"])?;
        let response = self
            .authorized(self.http.get(url), session)
            .query(&ListMessagesQuery {
                username: session.username().to_string(),
            })
            .send()
            .await?;
        let messages: Vec<Message> = check_status(response).await?.json().await?;
        debug!(count = messages.len(), "transport: fetched messages");
        Ok(messages)
    }

    async fn post_message(
        &self,
        session: &Session,
        request: &PostMessageRequest,
    ) -> Result<Message> {
        let url = endpoint(&self.api_base_url, &["messages"])?;
        let response = self
            .authorized(self.http.post(url), session)
            .json(request)
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }

    async fn cast_vote(
        &self,
        session: &Session,
        message_id: &MessageId,
        request: &VoteRequest,
    ) -> Result<()> {
        let url = endpoint(&self.api_base_url, &["messages", message_id.as_str()])?;
        let response = self
            .authorized(self.http.put(url), session)
            .json(request)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

pub(crate) fn build_http_client(config: &ClientConfig) -> Result<Client> {
    let mut builder = Client::builder();
    if let Some(timeout) = config.request_timeout {
        builder = builder.timeout(timeout);
    }
    builder
        .build()
        .map_err(|err| ClientError::InvalidConfig(format!("failed to build http client: {err}")))
}

/// Appends path segments to the API base, escaping each one.
pub(crate) fn endpoint(base: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| ClientError::InvalidConfig(format!("api base url cannot be a base: {base}")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

pub(crate) async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let err = ApiError::from_response(status.as_u16(), &body);
    Err(ClientError::from_api_error(status.as_u16(), err))
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
