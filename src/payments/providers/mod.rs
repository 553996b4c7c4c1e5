//! Payment provider implementations
//!
//! Concrete implementations of the provider traits for each processor.

pub mod mercadopago;
pub mod stripe;

pub use mercadopago::MercadoPagoProvider;
pub use stripe::StripeProvider;

use crate::error::{AppError, AppResult, InfrastructureError, ValidationError};
use reqwest::Url;

/// Append path segments to a processor API base.
///
/// Each segment is percent-encoded on its own, so caller-supplied ids can't
/// add path components or a query string. Empty, `.` and `..` segments are
/// rejected.
pub(crate) fn endpoint_url(api_base: &str, segments: &[&str]) -> AppResult<Url> {
    if let Some(bad) = segments
        .iter()
        .find(|s| s.is_empty() || **s == "." || **s == "..")
    {
        return Err(AppError::validation(ValidationError::InvalidField {
            field: "id".to_string(),
            reason: format!("'{}' is not a valid identifier", bad),
        }));
    }

    let mut url = Url::parse(api_base).map_err(|e| {
        AppError::infrastructure(InfrastructureError::Configuration {
            message: format!("Invalid API base '{}': {}", api_base, e),
        })
    })?;
    url.path_segments_mut()
        .map_err(|_| {
            AppError::infrastructure(InfrastructureError::Configuration {
                message: format!("API base '{}' cannot carry a path", api_base),
            })
        })?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_url_joins_segments() {
        let url = endpoint_url("https://api.stripe.com", &["v1", "payment_intents"]).unwrap();
        assert_eq!(url.as_str(), "https://api.stripe.com/v1/payment_intents");

        let url = endpoint_url("http://127.0.0.1:9000/mp/", &["v1", "payments", "42"]).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:9000/mp/v1/payments/42");
    }

    #[test]
    fn test_endpoint_url_encodes_ids() {
        let url = endpoint_url(
            "https://api.mercadopago.com",
            &["v1", "payments", "../../users/me?x="],
        )
        .unwrap();
        assert_eq!(url.path(), "/v1/payments/..%2F..%2Fusers%2Fme%3Fx=");
        assert_eq!(url.query(), None);
    }

    #[test]
    fn test_endpoint_url_rejects_dot_segments() {
        for id in ["", ".", ".."] {
            let err = endpoint_url("https://api.stripe.com", &["v1", "payment_intents", id])
                .unwrap_err();
            assert!(err.is_validation());
        }
        assert!(endpoint_url("not a url", &["v1"]).is_err());
    }
}
