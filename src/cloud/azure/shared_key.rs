//! Shared Key authorization for Blob service requests.
//!
//! Only container-level requests without a body or conditional headers are
//! signed here, so every standard header slot in the string-to-sign is empty.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::AzureError;
use crate::secret::Secret;

type HmacSha256 = Hmac<Sha256>;

// Content-Encoding .. Range
const STANDARD_HEADER_SLOTS: usize = 11;

/// `x-ms-date` value for the current instant (RFC 1123).
pub fn request_date() -> String {
    chrono::Utc::now()
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}

pub fn container_resource(account: &str, container: &str) -> String {
    format!("/{}/{}\nrestype:container", account, container)
}

pub fn string_to_sign(verb: &str, date: &str, version: &str, canonical_resource: &str) -> String {
    format!(
        "{}\n{}x-ms-date:{}\nx-ms-version:{}\n{}",
        verb,
        "\n".repeat(STANDARD_HEADER_SLOTS),
        date,
        version,
        canonical_resource
    )
}

/// Value for the `Authorization` header.
pub fn authorization(
    account: &str,
    key: &Secret,
    string_to_sign: &str,
) -> Result<String, AzureError> {
    let key_bytes = STANDARD
        .decode(key.expose())
        .map_err(|_| AzureError::InvalidAccountKey)?;
    let mut mac = HmacSha256::new_from_slice(&key_bytes).map_err(|_| AzureError::InvalidAccountKey)?;
    mac.update(string_to_sign.as_bytes());
    let signature = STANDARD.encode(mac.finalize().into_bytes());

    Ok(format!("SharedKey {}:{}", account, signature))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATE: &str = "Mon, 19 Oct 2026 10:00:00 GMT";

    #[test]
    fn test_string_to_sign_layout() {
        let resource = container_resource("terraformstateea001", "tfstate");
        let s = string_to_sign("PUT", DATE, "2021-08-06", &resource);
        let lines: Vec<&str> = s.split('\n').collect();

        assert_eq!(lines[0], "PUT");
        assert!(lines[1..12].iter().all(|l| l.is_empty()));
        assert_eq!(lines[12], format!("x-ms-date:{}", DATE));
        assert_eq!(lines[13], "x-ms-version:2021-08-06");
        assert_eq!(lines[14], "/terraformstateea001/tfstate");
        assert_eq!(lines[15], "restype:container");
    }

    #[test]
    fn test_authorization_known_signature() {
        let key = Secret::new("dGVzdC1hY2NvdW50LWtleS0wMTIzNDU2Nzg5");
        let s = string_to_sign(
            "GET",
            DATE,
            "2021-08-06",
            &container_resource("terraformstateea001", "tfstate"),
        );

        let header = authorization("terraformstateea001", &key, &s).unwrap();
        assert_eq!(
            header,
            "SharedKey terraformstateea001:kbyUPIVBP9ULZA4Mj6TbjyKsWzPJypoXcWc34siapgM="
        );
    }

    #[test]
    fn test_authorization_rejects_invalid_key() {
        let key = Secret::new("not base64!!");
        let result = authorization("acct", &key, "GET");
        assert!(matches!(result, Err(AzureError::InvalidAccountKey)));
    }

    #[test]
    fn test_authorization_does_not_contain_key() {
        let key = Secret::new("dGVzdC1hY2NvdW50LWtleS0wMTIzNDU2Nzg5");
        let header = authorization("acct", &key, "GET").unwrap();
        assert!(!header.contains(key.expose()));
    }

    #[test]
    fn test_request_date_format() {
        let date = request_date();
        assert!(date.ends_with(" GMT"));
        assert_eq!(date.len(), DATE.len());
    }
}
