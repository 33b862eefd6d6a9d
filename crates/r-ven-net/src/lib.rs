//! ---
//! ems_section: "05-networking-external-interfaces"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Network connectivity towards the coordinator."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::time::Duration;

use async_trait::async_trait;
use r_ven_msg::{
    log_request, log_response, Codec, JsonCodec, Request, ResponsePayload, Service, Transport,
    TransportError,
};
use reqwest::header::CONTENT_TYPE;
use tracing::warn;
use url::Url;

/// Transport posting encoded requests to `<base>/<service>`.
#[derive(Debug, Clone)]
pub struct HttpTransport<C = JsonCodec> {
    client: reqwest::Client,
    base: Url,
    codec: C,
}

impl HttpTransport<JsonCodec> {
    /// JSON transport towards `base` with the given per-request timeout.
    pub fn new(base: Url, timeout: Duration) -> r_ven_msg::Result<Self> {
        Self::with_codec(base, timeout, JsonCodec)
    }
}

impl<C: Codec> HttpTransport<C> {
    /// Transport using a custom codec.
    pub fn with_codec(mut base: Url, timeout: Duration, codec: C) -> r_ven_msg::Result<Self> {
        if base.cannot_be_a_base() {
            return Err(TransportError::Invalid(format!(
                "{base} cannot be used as a base url"
            )));
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| TransportError::Invalid(format!("http client setup failed: {err}")))?;
        Ok(Self {
            client,
            base,
            codec,
        })
    }

    /// Endpoint a service is reached at.
    pub fn endpoint(&self, service: Service) -> r_ven_msg::Result<Url> {
        self.base
            .join(service.path())
            .map_err(|err| TransportError::Invalid(format!("bad endpoint: {err}")))
    }
}

#[async_trait]
impl<C: Codec> Transport for HttpTransport<C> {
    async fn submit(&self, request: Request) -> r_ven_msg::Result<Option<ResponsePayload>> {
        let service = request.service();
        let url = self.endpoint(service)?;
        let body = self.codec.encode_request(&request)?;
        log_request(self.name(), &request);

        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, self.codec.content_type())
            .body(body)
            .send()
            .await
            .map_err(|err| TransportError::Unreachable {
                service: service.path(),
                reason: err.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(service = service.path(), status = status.as_u16(), "coordinator rejected request");
            return Err(TransportError::Status {
                service: service.path(),
                status: status.as_u16(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|err| TransportError::Unreachable {
                service: service.path(),
                reason: err.to_string(),
            })?;
        let payload = self.codec.decode_response(&bytes)?;
        log_response(self.name(), &request, payload.as_ref());
        Ok(payload)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
