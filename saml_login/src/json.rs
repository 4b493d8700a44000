use federation::credentials::Credentials;
use serde::Serialize;

/// The document AWS tooling expects from a `credential_process`.
#[derive(Serialize, Debug)]
#[serde(rename_all = "PascalCase")]
pub struct JsonCredential {
    pub version: u8,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration: Option<String>,
}

impl JsonCredential {
    pub fn convert(credential: &Credentials) -> Self {
        Self {
            version: 1,
            access_key_id: credential.access_key_id.clone(),
            secret_access_key: credential.secret_access_key.clone(),
            session_token: credential.session_token.clone(),
            expiration: credential
                .expiration
                .map(|expiration| expiration.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn serializes_credential_process_document() {
        let credentials = Credentials {
            access_key_id: "ASIAEXAMPLE".into(),
            secret_access_key: "secret".into(),
            session_token: "token".into(),
            security_token: "token".into(),
            principal_arn: "arn:aws:sts::000000000001:assumed-role/Development/jane".into(),
            region: None,
            expiration: Some(Utc.with_ymd_and_hms(2030, 1, 2, 3, 4, 5).unwrap()),
        };

        let json = serde_json::to_value(JsonCredential::convert(&credentials)).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "Version": 1,
                "AccessKeyId": "ASIAEXAMPLE",
                "SecretAccessKey": "secret",
                "SessionToken": "token",
                "Expiration": "2030-01-02T03:04:05.000Z",
            })
        );

        let mut credentials = credentials;
        credentials.expiration = None;
        let json = serde_json::to_value(JsonCredential::convert(&credentials)).unwrap();
        assert!(json.get("Expiration").is_none());
    }
}
