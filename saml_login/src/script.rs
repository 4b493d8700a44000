use crate::login::Context;
use anyhow::Result;
use federation::credentials::{CredentialStore, Credentials};
use shared::args::Shell;
use tracing::warn;

/// Environment a child process or shell session needs to act with
/// `credentials`. `profile` is exported as `AWS_PROFILE` when given.
pub fn env_vars(credentials: &Credentials, profile: Option<&str>) -> Vec<(&'static str, String)> {
    let mut vars = vec![
        ("AWS_ACCESS_KEY_ID", credentials.access_key_id.clone()),
        ("AWS_SECRET_ACCESS_KEY", credentials.secret_access_key.clone()),
        ("AWS_SESSION_TOKEN", credentials.session_token.clone()),
        ("AWS_SECURITY_TOKEN", credentials.security_token.clone()),
    ];

    if let Some(region) = credentials.region.as_deref().filter(|r| !r.is_empty()) {
        vars.push(("AWS_REGION", region.to_string()));
        vars.push(("AWS_DEFAULT_REGION", region.to_string()));
    }

    if let Some(profile) = profile {
        vars.push(("AWS_PROFILE", profile.to_string()));
    }

    vars
}

pub fn render_script(shell: Shell, vars: &[(&str, String)]) -> String {
    vars.iter()
        .map(|(key, value)| match shell {
            Shell::Bash => format!("export {}=\"{}\"\n", key, escape_double_quoted(value)),
            Shell::Fish => format!("set -gx {} '{}'\n", key, value.replace('\\', "\\\\").replace('\'', "\\'")),
            Shell::Powershell => format!("$env:{}='{}'\n", key, value.replace('\'', "''")),
        })
        .collect()
}

fn escape_double_quoted(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '"' | '\\' | '$' | '`') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Prints export statements for the stored credentials on stdout.
pub fn script(ctx: &Context, shell: Shell) -> Result<()> {
    let store = ctx.store()?;

    if !store.exists()? {
        warn!("Unable to load credentials, login required to create them");
        return Ok(());
    }

    let mut credentials = store.load()?;
    credentials.region = Some(ctx.region());

    print!(
        "{}",
        render_script(shell, &env_vars(&credentials, Some(&ctx.profile_name)))
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> Credentials {
        Credentials {
            access_key_id: "ASIAEXAMPLE".into(),
            secret_access_key: "se$cret".into(),
            session_token: "token".into(),
            security_token: "token".into(),
            principal_arn: "arn:aws:sts::000000000001:assumed-role/Development/jane".into(),
            region: Some("eu-west-1".into()),
            expiration: None,
        }
    }

    #[test]
    fn exports_profile_only_when_given() {
        let vars = env_vars(&credentials(), Some("work"));
        assert!(vars.contains(&("AWS_PROFILE", "work".to_string())));
        assert!(vars.contains(&("AWS_REGION", "eu-west-1".to_string())));

        let vars = env_vars(&credentials(), None);
        assert!(vars.iter().all(|(key, _)| *key != "AWS_PROFILE"));
    }

    #[test]
    fn omits_region_when_unknown() {
        let mut credentials = credentials();
        credentials.region = None;
        let vars = env_vars(&credentials, None);
        assert!(vars.iter().all(|(key, _)| !key.contains("REGION")));
    }

    #[test]
    fn renders_each_shell() {
        let vars = [("AWS_SECRET_ACCESS_KEY", "se$cret".to_string())];

        assert_eq!(
            render_script(Shell::Bash, &vars),
            "export AWS_SECRET_ACCESS_KEY=\"se\\$cret\"\n"
        );
        assert_eq!(
            render_script(Shell::Fish, &vars),
            "set -gx AWS_SECRET_ACCESS_KEY 'se$cret'\n"
        );
        assert_eq!(
            render_script(Shell::Powershell, &[("AWS_PROFILE", "it's".to_string())]),
            "$env:AWS_PROFILE='it''s'\n"
        );
    }
}
