//! Reqwest-backed Moonraker status source.
//!
//! This adapter owns transport details only: URL construction, the API key
//! header, timeout and HTTP error mapping, and JSON decoding into machine
//! snapshots. Poll cadence and retries belong to the monitor.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use url::Url;

use super::dto::QueryResponseDto;
use crate::domain::Device;
use crate::domain::ports::{DeviceStatusSource, DeviceStatusSourceError, MachineSnapshot};
use crate::outbound::http_support::status_message;

const API_KEY_HEADER: &str = "X-Api-Key";
const USER_AGENT: &str = concat!("spoolkeeper/", env!("CARGO_PKG_VERSION"));

/// Moonraker adapter with separate clients for short status polls and long
/// file downloads.
pub struct MoonrakerStatusSource {
    status_client: Client,
    download_client: Client,
}

impl MoonrakerStatusSource {
    /// Build an adapter with explicit per-request timeouts.
    ///
    /// # Errors
    ///
    /// Returns an error when a reqwest client cannot be constructed.
    pub fn new(status_timeout: Duration, download_timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            status_client: build_client(status_timeout)?,
            download_client: build_client(download_timeout)?,
        })
    }

    fn authorised(device: &Device, request: RequestBuilder) -> RequestBuilder {
        match device.credential() {
            Some(secret) => request.header(API_KEY_HEADER, secret.expose()),
            None => request,
        }
    }

    async fn fetch(
        &self,
        client: &Client,
        device: &Device,
        url: Url,
    ) -> Result<Vec<u8>, DeviceStatusSourceError> {
        let response = Self::authorised(device, client.get(url))
            .send()
            .await
            .map_err(map_transport_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(map_status_error(status, body.as_ref()));
        }
        Ok(body.to_vec())
    }
}

fn build_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
}

#[async_trait]
impl DeviceStatusSource for MoonrakerStatusSource {
    async fn machine_state(
        &self,
        device: &Device,
    ) -> Result<MachineSnapshot, DeviceStatusSourceError> {
        let url = status_url(device)?;
        let body = self.fetch(&self.status_client, device, url).await?;
        let decoded: QueryResponseDto = serde_json::from_slice(&body).map_err(|error| {
            DeviceStatusSourceError::decode(format!("invalid print_stats payload: {error}"))
        })?;
        decoded
            .into_snapshot()
            .map_err(DeviceStatusSourceError::decode)
    }

    async fn download_file(
        &self,
        device: &Device,
        label: &str,
    ) -> Result<Vec<u8>, DeviceStatusSourceError> {
        let url = file_url(device, label)?;
        self.fetch(&self.download_client, device, url).await
    }
}

fn base_url(device: &Device) -> Result<Url, DeviceStatusSourceError> {
    device.address().cloned().ok_or_else(|| {
        DeviceStatusSourceError::invalid_request(format!("device {} has no address", device.id()))
    })
}

fn with_segments<'a>(
    mut url: Url,
    segments: impl IntoIterator<Item = &'a str>,
) -> Result<Url, DeviceStatusSourceError> {
    url.path_segments_mut()
        .map_err(|()| DeviceStatusSourceError::invalid_request("device address cannot be a base"))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn status_url(device: &Device) -> Result<Url, DeviceStatusSourceError> {
    let mut url = with_segments(base_url(device)?, ["printer", "objects", "query"])?;
    url.set_query(Some("print_stats"));
    Ok(url)
}

fn file_url(device: &Device, label: &str) -> Result<Url, DeviceStatusSourceError> {
    let segments: Vec<&str> = label.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() || segments.iter().any(|s| *s == "." || *s == "..") {
        return Err(DeviceStatusSourceError::invalid_request(format!(
            "invalid file label '{label}'"
        )));
    }
    with_segments(
        base_url(device)?,
        ["server", "files", "gcodes"].into_iter().chain(segments),
    )
}

fn map_transport_error(error: reqwest::Error) -> DeviceStatusSourceError {
    if error.is_timeout() {
        DeviceStatusSourceError::timeout(error.to_string())
    } else {
        DeviceStatusSourceError::transport(error.to_string())
    }
}

fn map_status_error(status: StatusCode, body: &[u8]) -> DeviceStatusSourceError {
    let message = status_message(status, body);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            DeviceStatusSourceError::unauthorized(message)
        }
        StatusCode::NOT_FOUND => DeviceStatusSourceError::not_found(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            DeviceStatusSourceError::timeout(message)
        }
        _ if status.is_client_error() => DeviceStatusSourceError::invalid_request(message),
        _ => DeviceStatusSourceError::transport(message),
    }
}
