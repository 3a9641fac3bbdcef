//! # Currency Proto
//!
//! Generated gRPC bindings for the currency service, plus small helpers on
//! the wire types that both sides of the stream need.

pub mod currency {
    tonic::include_proto!("currency");
}

pub use currency::{
    currency_client, currency_server, streaming_rate_response, Currencies, CurrencyList, Empty,
    ErrorStatus, RateRequest, RateResponse, StreamingRateResponse,
};

impl RateRequest {
    /// Builds a request for the given pair.
    pub fn pair(base: Currencies, destination: Currencies) -> Self {
        Self {
            base: base as i32,
            destination: destination as i32,
        }
    }

    /// Builds a heartbeat message (both currencies UNKNOWN).
    pub fn heartbeat() -> Self {
        Self::pair(Currencies::Unknown, Currencies::Unknown)
    }

    /// A heartbeat carries no subscription intent; it only refreshes liveness.
    pub fn is_heartbeat(&self) -> bool {
        self.base() == Currencies::Unknown && self.destination() == Currencies::Unknown
    }
}

impl StreamingRateResponse {
    /// Wraps a rate update for the subscription stream.
    pub fn rate(response: RateResponse) -> Self {
        Self {
            message: Some(streaming_rate_response::Message::RateResponse(response)),
        }
    }

    /// Wraps an in-band error for the subscription stream.
    pub fn error(code: tonic::Code, message: impl Into<String>, request: RateRequest) -> Self {
        Self {
            message: Some(streaming_rate_response::Message::Error(ErrorStatus {
                code: code as i32,
                message: message.into(),
                request: Some(request),
            })),
        }
    }
}
