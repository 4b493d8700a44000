use crate::json::JsonCredential;
use crate::login::Context;
use clap::Parser;
use file_manager::aws_config::ProfileConfig;
use shared::args::{Args, Command};
use tracing_subscriber::EnvFilter;

mod config;
mod exec;
mod json;
mod login;
mod script;

/// Required due to using the stderr writer vs no writer specified
/// SubscriberBuilder<fn() -> Stderr> vs SubscriberBuilder
#[macro_export]
macro_rules! init_tracing {
    ($builder:expr, $debug:expr) => {
        let logging = $builder;
        let filter = if $debug { "debug" } else { "info" };

        logging
            .with_target($debug)
            .with_line_number($debug)
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
            )
            .init();
    };
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.machine_output() {
        let logging = tracing_subscriber::fmt().with_writer(std::io::stderr);
        init_tracing!(logging, args.debug);
    } else {
        let logging = tracing_subscriber::fmt();
        init_tracing!(logging, args.debug);
    }

    let profile_name = args
        .profile
        .clone()
        .unwrap_or_else(|| std::env::var("AWS_PROFILE").unwrap_or("default".to_string()));

    let configuring = matches!(args.command, Command::Configure);
    let profiles = if configuring {
        ProfileConfig::read_file().unwrap_or_default()
    } else {
        ProfileConfig::read_file()?
    };
    let profile = if configuring {
        ProfileConfig::get(&profile_name, &profiles).unwrap_or_default()
    } else {
        ProfileConfig::get(&profile_name, &profiles)?
    };

    let mut ctx = Context {
        profile_name,
        profiles,
        profile,
        args,
    };

    match &ctx.args.command {
        Command::Login { force, json } => {
            let credential = login::login(&ctx, *force).await?;

            if *json {
                let json_credentials = JsonCredential::convert(&credential);
                let json = serde_json::to_string_pretty(&json_credentials)?;
                println!("{}", json);
            }
        }
        Command::ListRoles => login::list_roles(&ctx).await?,
        Command::Script { shell } => script::script(&ctx, *shell)?,
        Command::Exec {
            exec_profile,
            command,
        } => {
            let code = exec::exec(&ctx, exec_profile.as_deref(), command).await?;
            std::process::exit(code);
        }
        Command::Configure => config::configure_profile(&mut ctx.profiles, &ctx.profile_name)?,
    }

    Ok(())
}
