use anyhow::Result;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input};
use federation::provider::IdpProvider;
use file_manager::aws_config::{ProfileConfig, DEFAULT_REGION, DEFAULT_SESSION_DURATION};
use std::collections::HashMap;
use tracing::info;

pub fn configure_profile(
    profiles: &mut HashMap<String, ProfileConfig>,
    profile_name: &str,
) -> Result<()> {
    let profile = ProfileConfig::get(profile_name, profiles).unwrap_or_default();
    let theme = ColorfulTheme::default();

    info!("Configuring profile: {}", profile_name);

    let saml_provider: String = loop {
        let input: String = Input::with_theme(&theme)
            .with_prompt("Identity provider")
            .default(
                profile
                    .saml_provider
                    .clone()
                    .unwrap_or_else(|| IdpProvider::default().to_string()),
            )
            .interact_text()?;

        if input.parse::<IdpProvider>().is_ok() {
            break input;
        }
    };

    let saml_url: String = Input::with_theme(&theme)
        .with_prompt("IdP URL")
        .with_initial_text(profile.saml_url.clone().unwrap_or_default())
        .allow_empty(false)
        .interact_text()?;

    let saml_username: String = Input::with_theme(&theme)
        .with_prompt("Username")
        .default(profile.saml_username.clone().unwrap_or_default())
        .allow_empty(true)
        .interact_text()?;

    let saml_role_arn: String = Input::with_theme(&theme)
        .with_prompt("Default Role ARN (if multiple)")
        .default(profile.saml_role_arn.clone().unwrap_or_default())
        .allow_empty(true)
        .interact_text()?;

    let saml_session_duration: i64 = loop {
        let input: String = Input::with_theme(&theme)
            .with_prompt("Session Duration Seconds")
            .default(
                profile
                    .session_duration()
                    .unwrap_or(DEFAULT_SESSION_DURATION)
                    .to_string(),
            )
            .interact_text()?;

        if let Ok(value) = input.trim().parse::<i64>() {
            if value > 0 && value <= i64::from(i32::MAX) {
                break value;
            }
        }
    };

    let saml_skip_verify = Confirm::with_theme(&theme)
        .with_prompt("Skip TLS verification")
        .default(profile.skip_verify())
        .interact()?;

    let region: String = Input::with_theme(&theme)
        .with_prompt("Region")
        .default(profile.region.clone().unwrap_or_else(|| DEFAULT_REGION.to_string()))
        .allow_empty(false)
        .interact_text()?;

    let new_profile = ProfileConfig {
        saml_provider: non_empty(saml_provider),
        saml_url: non_empty(saml_url),
        saml_username: non_empty(saml_username),
        saml_role_arn: non_empty(saml_role_arn),
        saml_session_duration: Some(saml_session_duration),
        saml_skip_verify: saml_skip_verify.then_some(true),
        region: non_empty(region),
        ..profile
    };

    ProfileConfig::upsert(profile_name, &new_profile, profiles);
    ProfileConfig::write(profiles)?;

    Ok(())
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value.trim().to_string())
    }
}
