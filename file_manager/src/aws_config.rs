use crate::serde_support::{
    deserialize_string_to_bool, read_sections, serialize_bool_to_string,
    serialize_write_ordered, FileName,
};
use anyhow::{anyhow, bail, Result};
use directories::UserDirs;
use federation::exchange::ChainedRole;
use federation::provider::IdpProvider;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

pub const DEFAULT_SESSION_DURATION: i64 = 3600;
pub const DEFAULT_REGION: &str = "us-east-1";

/// One `~/.aws/config` profile section.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct ProfileConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saml_provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saml_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saml_username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saml_password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saml_role_arn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saml_session_duration: Option<i64>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_bool_to_string",
        deserialize_with = "deserialize_string_to_bool"
    )]
    pub saml_skip_verify: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_arn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_session_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_profile: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_process: Option<String>,
    /// Keys this tool does not manage, such as `output`. Kept on rewrite.
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

impl ProfileConfig {
    pub fn file_path() -> Result<PathBuf> {
        match UserDirs::new() {
            Some(user_dirs) => Ok(user_dirs.home_dir().join(".aws/config")),
            None => Err(anyhow!("Unable to get user directories")),
        }
    }

    pub fn read_file() -> Result<HashMap<String, ProfileConfig>> {
        let config_path = Self::file_path()?;
        if !config_path.exists() {
            bail!("AWS config file not found, please run the configure command")
        }
        Self::read_from(&config_path)
    }

    pub fn read_from(path: &Path) -> Result<HashMap<String, ProfileConfig>> {
        read_sections(path)
    }

    pub fn write(profiles: &HashMap<String, ProfileConfig>) -> Result<()> {
        Self::write_to(profiles, &Self::file_path()?)
    }

    pub fn write_to(profiles: &HashMap<String, ProfileConfig>, path: &Path) -> Result<()> {
        serialize_write_ordered(profiles, path, FileName::Config)
    }

    pub fn get(profile_name: &str, profiles: &HashMap<String, ProfileConfig>) -> Result<ProfileConfig> {
        let profile_name_sanitized = Self::sanitize_profile_name(profile_name);
        let profile = profiles.get(&profile_name_sanitized).ok_or_else(|| {
            anyhow!(
                "Profile '{}' not found in the AWS config file, please run the configure command",
                profile_name
            )
        })?;

        Ok(profile.clone())
    }

    pub fn upsert(
        profile_name: &str,
        profile: &ProfileConfig,
        profiles: &mut HashMap<String, ProfileConfig>,
    ) {
        let profile_name_sanitized = Self::sanitize_profile_name(profile_name);
        profiles.insert(profile_name_sanitized, profile.to_owned());
    }

    pub fn sanitize_profile_name(profile_name: &str) -> String {
        if profile_name != "default" && !profile_name.starts_with("profile ") {
            format!("profile {}", profile_name)
        } else {
            profile_name.to_string()
        }
    }

    pub fn session_duration(&self) -> Option<i64> {
        self.saml_session_duration.filter(|seconds| *seconds > 0)
    }

    pub fn region_or_default(&self) -> String {
        self.region
            .clone()
            .filter(|region| !region.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_REGION.to_string())
    }

    pub fn provider(&self) -> Result<IdpProvider> {
        Ok(self.saml_provider.as_deref().unwrap_or_default().parse()?)
    }

    pub fn skip_verify(&self) -> bool {
        self.saml_skip_verify.unwrap_or(false)
    }
}

/// Plans the role hops that lead from the login profile's credentials to
/// `target`, following `source_profile` links. The first hop is assumed
/// first. An empty plan means `target` is the login profile itself.
pub fn plan_chain(
    profiles: &HashMap<String, ProfileConfig>,
    login_profile: &str,
    target: &str,
) -> Result<Vec<ChainedRole>> {
    let mut hops = Vec::new();
    let mut visited = HashSet::new();
    let mut current = target.to_string();

    while current != login_profile {
        if !visited.insert(current.clone()) {
            bail!("Profile '{}' is part of a source_profile cycle", current);
        }

        let profile = ProfileConfig::get(&current, profiles)?;
        let role_arn = profile
            .role_arn
            .ok_or_else(|| anyhow!("Profile '{}' has no role_arn to assume", current))?;
        hops.push(ChainedRole::new(role_arn, profile.role_session_name));

        current = profile.source_profile.ok_or_else(|| {
            anyhow!(
                "Profile '{}' does not lead back to '{}' through source_profile",
                current,
                login_profile
            )
        })?;
    }

    hops.reverse();
    Ok(hops)
}
