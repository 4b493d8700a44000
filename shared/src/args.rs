#[derive(clap::Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// The name of the profile to log in with (or configure)
    #[arg(short, long, global = true)]
    pub profile: Option<String>,

    /// Enables verbose logging with targets and line numbers
    #[arg(short, long, global = true, default_value_t = false)]
    pub debug: bool,

    /// Never prompt; use flag and profile values as they are
    #[arg(long, global = true, default_value_t = false)]
    pub skip_prompt: bool,

    /// Role ARN to assume when the assertion offers several
    #[arg(long, global = true)]
    pub role: Option<String>,

    /// Session duration in seconds
    #[arg(long, global = true)]
    pub session_duration: Option<i64>,

    #[arg(long, global = true)]
    pub region: Option<String>,

    /// Identity provider URL, overrides the profile
    #[arg(long, global = true)]
    pub url: Option<String>,

    /// Accept invalid TLS certificates from the identity provider
    #[arg(long, global = true, default_value_t = false)]
    pub skip_verify: bool,

    /// Identity provider username, overrides the profile
    #[arg(long, global = true)]
    pub username: Option<String>,

    /// Identity provider password, overrides the profile
    #[arg(long, global = true)]
    pub password: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Authenticate, pick a role and store temporary credentials
    Login {
        /// Force a credential refresh, even if they are still valid
        #[arg(short, long, default_value_t = false)]
        force: bool,

        /// Additionally returns the JSON credentials to stdout, for consumption by AWS Config [credential_process]
        #[arg(short, long, default_value_t = false)]
        json: bool,
    },

    /// Authenticate and print every role the assertion grants
    ListRoles,

    /// Print shell statements exporting the stored credentials
    Script {
        #[arg(long, value_enum, default_value_t = Shell::Bash)]
        shell: Shell,
    },

    /// Run a command with the stored credentials in its environment
    Exec {
        /// Profile whose source_profile chain is assumed before running
        #[arg(long)]
        exec_profile: Option<String>,

        #[arg(last = true, required = true)]
        command: Vec<String>,
    },

    /// Configure the profile
    Configure,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Shell {
    #[default]
    Bash,
    Fish,
    Powershell,
}

impl Args {
    /// Whether stdout carries machine-readable output, in which case logs go
    /// to stderr.
    pub fn machine_output(&self) -> bool {
        matches!(
            self.command,
            Command::Login { json: true, .. } | Command::Script { .. }
        )
    }
}
