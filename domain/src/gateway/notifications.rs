use crate::error::{Error, ExternalErrorKind, InternalErrorKind};
use async_trait::async_trait;
use events::Notification;
use log::*;
use reqwest::Url;
use serde::Deserialize;
use sse::counter::CountSource;
use sse::session::SessionReader;

/// REST client for the notification endpoints of the booking API.
///
/// The bearer token is read from the session on every call, so the client
/// never holds on to a stale credential.
pub struct NotificationsClient {
    client: reqwest::Client,
    base_url: Url,
    session: SessionReader,
}

/// One page of notifications, as returned by the list endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPage {
    #[serde(default)]
    pub content: Vec<Notification>,
    #[serde(default)]
    pub total_elements: u64,
    #[serde(default)]
    pub total_pages: u32,
    /// Zero-based page index.
    #[serde(default)]
    pub number: u32,
    #[serde(default)]
    pub size: u32,
    #[serde(default)]
    pub last: bool,
}

/// The unread endpoint answers with either a bare number or a wrapper object.
#[derive(Deserialize)]
#[serde(untagged)]
enum UnreadCount {
    Bare(u64),
    Wrapped {
        #[serde(alias = "unreadCount")]
        count: u64,
    },
}

impl NotificationsClient {
    pub fn new(base_url: impl AsRef<str>, session: SessionReader) -> Result<Self, Error> {
        let base_url = base_url.as_ref();
        let base_url = match Url::parse(base_url) {
            Ok(url) if !url.cannot_be_a_base() => url,
            _ => {
                warn!("Invalid notification API base URL: {base_url}");
                return Err(Error::internal(InternalErrorKind::Config));
            }
        };
        let client = reqwest::Client::builder().use_rustls_tls().build()?;

        Ok(Self {
            client,
            base_url,
            session,
        })
    }

    /// Number of unread notifications for the signed-in user.
    pub async fn unread_count(&self) -> Result<u64, Error> {
        let response = self
            .client
            .get(self.url(&["notifications", "unread-count"]))
            .bearer_auth(self.bearer()?)
            .send()
            .await?;

        let count = match check(response).await?.json::<UnreadCount>().await? {
            UnreadCount::Bare(count) | UnreadCount::Wrapped { count } => count,
        };
        debug!("Unread notification count: {count}");

        Ok(count)
    }

    /// Lists notifications newest first, one zero-based page at a time.
    pub async fn list(&self, page: u32, size: u32) -> Result<NotificationPage, Error> {
        let response = self
            .client
            .get(self.url(&["notifications"]))
            .query(&[("page", page), ("size", size)])
            .bearer_auth(self.bearer()?)
            .send()
            .await?;

        let page = check(response).await?.json::<NotificationPage>().await?;
        debug!(
            "Fetched {} notifications (page {} of {})",
            page.content.len(),
            page.number + 1,
            page.total_pages
        );

        Ok(page)
    }

    pub async fn mark_read(&self, notification_id: &str) -> Result<(), Error> {
        let response = self
            .client
            .put(self.url(&["notifications", notification_id, "read"]))
            .bearer_auth(self.bearer()?)
            .send()
            .await?;

        check(response).await?;
        info!("Marked notification {notification_id} as read");
        Ok(())
    }

    pub async fn mark_all_read(&self) -> Result<(), Error> {
        let response = self
            .client
            .put(self.url(&["notifications", "read-all"]))
            .bearer_auth(self.bearer()?)
            .send()
            .await?;

        check(response).await?;
        info!("Marked all notifications as read");
        Ok(())
    }

    /// Appends path segments to the base URL, percent-encoding each one.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // Checked in `new`: the base URL can always take segments
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn bearer(&self) -> Result<String, Error> {
        self.session
            .current()
            .credential()
            .map(str::to_string)
            .ok_or_else(|| {
                warn!("Notification request attempted without a valid session");
                Error::internal(InternalErrorKind::Unauthenticated)
            })
    }
}

#[async_trait]
impl CountSource for NotificationsClient {
    async fn fetch_count(&self) -> Result<u64, sse::error::Error> {
        Ok(self.unread_count().await?)
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response, Error> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_text = response.text().await.unwrap_or_default();
    warn!("Notification API request failed: {status} - {error_text}");
    Err(Error::external(ExternalErrorKind::Status(status.as_u16())))
}
