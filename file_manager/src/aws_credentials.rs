use crate::serde_support::{read_sections, serialize_write_ordered, FileName};
use chrono::{DateTime, Utc};
use directories::UserDirs;
use federation::credentials::{CredentialStore, Credentials};
use federation::error::{FederationError, Result};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

/// Guards read-modify-write cycles on credential files within the process.
static WRITE_LOCK: Mutex<()> = Mutex::new(());

/// One `~/.aws/credentials` profile section.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct CredentialsSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aws_access_key_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aws_secret_access_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aws_session_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aws_security_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x_principal_arn: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_datetime_with_ms"
    )]
    pub x_security_token_expires: Option<DateTime<Utc>>,
    /// Keys written by other tools, such as `region`. Kept on rewrite.
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

fn serialize_datetime_with_ms<S>(
    dt: &Option<DateTime<Utc>>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match dt {
        Some(actual_dt) => {
            let str_dt = actual_dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string();
            serializer.serialize_str(&str_dt)
        }
        None => serializer.serialize_none(),
    }
}

impl From<&Credentials> for CredentialsSection {
    fn from(credentials: &Credentials) -> Self {
        Self {
            aws_access_key_id: Some(credentials.access_key_id.clone()),
            aws_secret_access_key: Some(credentials.secret_access_key.clone()),
            aws_session_token: Some(credentials.session_token.clone()),
            aws_security_token: Some(credentials.security_token.clone()),
            x_principal_arn: Some(credentials.principal_arn.clone()),
            x_security_token_expires: credentials.expiration,
            extra: BTreeMap::new(),
        }
    }
}

impl CredentialsSection {
    fn into_credentials(self) -> Credentials {
        let session_token = self.aws_session_token.unwrap_or_default();
        Credentials {
            access_key_id: self.aws_access_key_id.unwrap_or_default(),
            secret_access_key: self.aws_secret_access_key.unwrap_or_default(),
            security_token: self
                .aws_security_token
                .unwrap_or_else(|| session_token.clone()),
            session_token,
            principal_arn: self.x_principal_arn.unwrap_or_default(),
            region: None,
            expiration: self.x_security_token_expires,
        }
    }
}

/// The shared credentials file, scoped to one profile.
#[derive(Clone, Debug)]
pub struct SharedCredentials {
    path: PathBuf,
    profile: String,
}

impl SharedCredentials {
    pub fn file_path() -> Result<PathBuf> {
        match UserDirs::new() {
            Some(user_dirs) => Ok(user_dirs.home_dir().join(".aws/credentials")),
            None => Err(FederationError::not_found("unable to get user directories")),
        }
    }

    pub fn new(profile: impl Into<String>) -> Result<Self> {
        Ok(Self::with_path(Self::file_path()?, profile))
    }

    pub fn with_path(path: impl Into<PathBuf>, profile: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            profile: profile.into(),
        }
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<HashMap<String, CredentialsSection>> {
        read_sections(&self.path).map_err(|e| {
            FederationError::parse(format!(
                "unable to read {}: {e}",
                self.path.display()
            ))
        })
    }
}

impl CredentialStore for SharedCredentials {
    fn exists(&self) -> Result<bool> {
        Ok(self.read_all()?.contains_key(&self.profile))
    }

    fn load(&self) -> Result<Credentials> {
        let section = self.read_all()?.remove(&self.profile).ok_or_else(|| {
            FederationError::not_found(format!(
                "profile '{}' not found in {}",
                self.profile,
                self.path.display()
            ))
        })?;

        debug!("Loaded credentials for profile {}", self.profile);
        Ok(section.into_credentials())
    }

    fn save(&self, credentials: &Credentials) -> Result<()> {
        let _guard = WRITE_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut profiles = self.read_all()?;
        let mut section = CredentialsSection::from(credentials);
        if let Some(previous) = profiles.remove(&self.profile) {
            section.extra = previous.extra;
        }
        profiles.insert(self.profile.clone(), section);

        serialize_write_ordered(&profiles, &self.path, FileName::Credentials)
            .map_err(|e| FederationError::Io(io::Error::other(e.to_string())))?;

        info!(
            "Credentials for profile {} stored in {}",
            self.profile,
            self.path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::fs;

    fn credentials() -> Credentials {
        Credentials {
            access_key_id: "ASIAEXAMPLE".into(),
            secret_access_key: "secret".into(),
            session_token: "token".into(),
            security_token: "token".into(),
            principal_arn: "arn:aws:sts::000000000001:assumed-role/Development/jane".into(),
            region: None,
            expiration: Some(Utc.with_ymd_and_hms(2030, 1, 2, 3, 4, 5).unwrap()),
        }
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = SharedCredentials::with_path(dir.path().join("credentials"), "work");

        assert!(!store.exists().unwrap());
        assert!(store.load().unwrap_err().is_not_found());
    }

    #[test]
    fn saves_and_loads_profile() {
        let dir = tempfile::tempdir().unwrap();
        let store = SharedCredentials::with_path(dir.path().join(".aws/credentials"), "work");

        store.save(&credentials()).unwrap();

        assert!(store.exists().unwrap());
        assert_eq!(store.load().unwrap(), credentials());

        let written = fs::read_to_string(store.path()).unwrap();
        assert!(written.contains("x_security_token_expires=2030-01-02T03:04:05.000Z"));
    }

    #[test]
    fn saving_keeps_other_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials");
        fs::write(
            &path,
            "[static]\naws_access_key_id=AKIASTATIC\naws_secret_access_key=static-secret\n",
        )
        .unwrap();

        let store = SharedCredentials::with_path(&path, "work");
        store.save(&credentials()).unwrap();

        let other = SharedCredentials::with_path(&path, "static").load().unwrap();
        assert_eq!(other.access_key_id, "AKIASTATIC");
        assert_eq!(other.session_token, "");

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.find("[static]").unwrap() < written.find("[work]").unwrap());
    }

    #[test]
    fn missing_profile_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials");
        SharedCredentials::with_path(&path, "work")
            .save(&credentials())
            .unwrap();

        let store = SharedCredentials::with_path(&path, "other");
        assert!(!store.exists().unwrap());
        assert!(matches!(store.load(), Err(FederationError::NotFound(_))));
    }

    #[test]
    fn saving_keeps_unmanaged_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials");
        fs::write(
            &path,
            "[work]\n\
             aws_access_key_id=ASIAOLD\n\
             region=eu-west-1\n\
             [static]\n\
             aws_access_key_id=AKIASTATIC\n\
             output=json\n",
        )
        .unwrap();

        SharedCredentials::with_path(&path, "work")
            .save(&credentials())
            .unwrap();

        let sections: HashMap<String, CredentialsSection> = read_sections(&path).unwrap();
        let work = &sections["work"];
        assert_eq!(work.aws_access_key_id.as_deref(), Some("ASIAEXAMPLE"));
        assert_eq!(work.extra.get("region").map(String::as_str), Some("eu-west-1"));
        assert_eq!(
            sections["static"].extra.get("output").map(String::as_str),
            Some("json")
        );
    }
}
