use crate::login::{login, Context};
use crate::script::env_vars;
use anyhow::{anyhow, Context as _, Result};
use file_manager::aws_config::{plan_chain, DEFAULT_SESSION_DURATION};
use tokio::process::Command;
use tracing::{debug, info};

/// Runs `command` with credentials for the login profile, or for
/// `exec_profile` when given, and returns its exit code.
pub async fn exec(ctx: &Context, exec_profile: Option<&str>, command: &[String]) -> Result<i32> {
    let (program, arguments) = command
        .split_first()
        .ok_or_else(|| anyhow!("Command to execute required"))?;

    let mut credentials = login(ctx, false).await?;

    if let Some(target) = exec_profile {
        let hops = plan_chain(&ctx.profiles, &ctx.profile_name, target)?;
        let duration = ctx
            .args
            .session_duration
            .or_else(|| ctx.profile.session_duration())
            .unwrap_or(DEFAULT_SESSION_DURATION);

        let exchange = ctx.exchange();
        for hop in &hops {
            credentials = exchange
                .assume_chained(&credentials, hop, duration)
                .await
                .with_context(|| format!("error acquiring credentials for profile: {}", target))?;
        }
        info!("Acting as {}", credentials.principal_arn);
    }

    let profile = exec_profile
        .is_none()
        .then_some(ctx.profile_name.as_str());

    debug!("Running {} {:?}", program, arguments);

    let status = Command::new(program)
        .args(arguments)
        .envs(env_vars(&credentials, profile))
        .status()
        .await
        .with_context(|| format!("Failed to run {}", program))?;

    Ok(status.code().unwrap_or(1))
}
