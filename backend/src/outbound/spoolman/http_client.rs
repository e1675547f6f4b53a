//! Reqwest-backed Spoolman inventory client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use super::dto::{LocationPatchDto, SpoolDto, UsagePatchDto};
use crate::domain::SpoolId;
use crate::domain::ports::{InventoryService, InventoryServiceError};
use crate::outbound::http_support::status_message;

const USER_AGENT: &str = concat!("spoolkeeper/", env!("CARGO_PKG_VERSION"));

/// Inventory adapter talking to one Spoolman instance.
pub struct SpoolmanInventory {
    client: Client,
    base: Url,
}

impl SpoolmanInventory {
    /// Build an adapter for the instance at `base` with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(base: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client, base })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, InventoryServiceError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| InventoryServiceError::rejected("inventory URL cannot be a base"))?
            .pop_if_empty()
            .extend(["api", "v1"])
            .extend(segments);
        Ok(url)
    }

    fn spool_url(&self, spool_id: SpoolId) -> Result<Url, InventoryServiceError> {
        self.endpoint(&["spool", &spool_id.to_string()])
    }

    async fn send(
        request: RequestBuilder,
        spool_id: Option<SpoolId>,
    ) -> Result<Vec<u8>, InventoryServiceError> {
        let response = request.send().await.map_err(map_transport_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(map_status_error(status, body.as_ref(), spool_id));
        }
        Ok(body.to_vec())
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        spool_id: Option<SpoolId>,
    ) -> Result<T, InventoryServiceError> {
        let body = Self::send(self.client.get(url), spool_id).await?;
        serde_json::from_slice(&body).map_err(|error| {
            InventoryServiceError::decode(format!("invalid inventory payload: {error}"))
        })
    }

    async fn patch_spool<T: serde::Serialize + Sync>(
        &self,
        spool_id: SpoolId,
        body: &T,
    ) -> Result<(), InventoryServiceError> {
        let url = self.spool_url(spool_id)?;
        Self::send(self.client.patch(url).json(body), Some(spool_id)).await?;
        Ok(())
    }
}

#[async_trait]
impl InventoryService for SpoolmanInventory {
    async fn spool_usage(&self, spool_id: SpoolId) -> Result<f64, InventoryServiceError> {
        let url = self.spool_url(spool_id)?;
        let spool: SpoolDto = self.get_json(url, Some(spool_id)).await?;
        Ok(spool.used_weight)
    }

    async fn set_spool_usage(
        &self,
        spool_id: SpoolId,
        used_grams: f64,
    ) -> Result<(), InventoryServiceError> {
        if !used_grams.is_finite() || used_grams < 0.0 {
            return Err(InventoryServiceError::rejected(format!(
                "refusing to write usage {used_grams} for spool {spool_id}"
            )));
        }
        self.patch_spool(
            spool_id,
            &UsagePatchDto {
                used_weight: used_grams,
            },
        )
        .await
    }

    async fn set_spool_location(
        &self,
        spool_id: SpoolId,
        location: &str,
    ) -> Result<(), InventoryServiceError> {
        self.patch_spool(
            spool_id,
            &LocationPatchDto {
                location: Some(location),
            },
        )
        .await
    }

    async fn clear_spool_location(&self, spool_id: SpoolId) -> Result<(), InventoryServiceError> {
        self.patch_spool(spool_id, &LocationPatchDto { location: None })
            .await
    }

    async fn list_locations(&self) -> Result<Vec<String>, InventoryServiceError> {
        let url = self.endpoint(&["location"])?;
        self.get_json(url, None).await
    }
}

fn map_transport_error(error: reqwest::Error) -> InventoryServiceError {
    if error.is_timeout() {
        InventoryServiceError::timeout(error.to_string())
    } else {
        InventoryServiceError::transport(error.to_string())
    }
}

fn map_status_error(
    status: StatusCode,
    body: &[u8],
    spool_id: Option<SpoolId>,
) -> InventoryServiceError {
    match (status, spool_id) {
        (StatusCode::NOT_FOUND, Some(spool_id)) => InventoryServiceError::unknown_spool(spool_id),
        (StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT, _) => {
            InventoryServiceError::timeout(status_message(status, body))
        }
        _ if status.is_client_error() => {
            InventoryServiceError::rejected(status_message(status, body))
        }
        _ => InventoryServiceError::transport(status_message(status, body)),
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for non-network Spoolman helpers.

    use super::*;
    use rstest::rstest;

    fn spool(value: i64) -> SpoolId {
        SpoolId::new(value).expect("valid spool")
    }

    fn inventory(base: &str) -> SpoolmanInventory {
        SpoolmanInventory::new(Url::parse(base).expect("url"), Duration::from_secs(1))
            .expect("client")
    }

    #[rstest]
    #[case("http://spoolman.lan:7912", "http://spoolman.lan:7912/api/v1/spool/42")]
    #[case("http://nas.lan/spoolman/", "http://nas.lan/spoolman/api/v1/spool/42")]
    fn builds_spool_urls(#[case] base: &str, #[case] expected: &str) {
        let url = inventory(base).spool_url(spool(42)).expect("url");
        assert_eq!(url.as_str(), expected);
    }

    #[rstest]
    fn missing_spool_maps_to_unknown_spool() {
        let error = map_status_error(StatusCode::NOT_FOUND, b"", Some(spool(8)));
        assert_eq!(error, InventoryServiceError::unknown_spool(spool(8)));
    }

    #[rstest]
    #[case(StatusCode::UNPROCESSABLE_ENTITY, "rejected")]
    #[case(StatusCode::GATEWAY_TIMEOUT, "timeout")]
    #[case(StatusCode::INTERNAL_SERVER_ERROR, "transport")]
    fn maps_other_statuses(#[case] status: StatusCode, #[case] kind: &str) {
        let error = map_status_error(status, b"{\"message\":\"bad\"}", None);
        let matched = match kind {
            "rejected" => matches!(error, InventoryServiceError::Rejected { .. }),
            "timeout" => matches!(error, InventoryServiceError::Timeout { .. }),
            _ => matches!(error, InventoryServiceError::Transport { .. }),
        };
        assert!(matched, "{status} mapped to {error:?}");
    }

    #[rstest]
    #[tokio::test]
    async fn refuses_negative_usage_without_calling_out() {
        let error = inventory("http://127.0.0.1:9")
            .set_spool_usage(spool(1), -2.0)
            .await
            .expect_err("negative usage");
        assert!(matches!(error, InventoryServiceError::Rejected { .. }));
    }
}
