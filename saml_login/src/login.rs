use anyhow::{bail, Context as _, Result};
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Input, Password};
use federation::assertion::SamlAssertion;
use federation::credentials::{CredentialStore, Credentials};
use federation::exchange::CredentialExchange;
use federation::http::{create_http_client, HttpClient};
use federation::prompt::{render_listing, DialoguerPrompt};
use federation::provider::LoginDetails;
use federation::reconcile::{reconcile, RoleCatalog};
use federation::resolver::{resolve, ResolutionPolicy};
use federation::role_page::{fetch_accounts, HttpRolePage, RolePageSource};
use federation::sts::StsTokenService;
use file_manager::aws_config::{ProfileConfig, DEFAULT_SESSION_DURATION};
use file_manager::aws_credentials::SharedCredentials;
use shared::args::Args;
use std::collections::HashMap;
use tracing::{debug, info};

/// Everything a command needs to know about the selected profile.
pub struct Context {
    pub profile_name: String,
    pub profiles: HashMap<String, ProfileConfig>,
    pub profile: ProfileConfig,
    pub args: Args,
}

impl Context {
    pub fn region(&self) -> String {
        self.args
            .region
            .clone()
            .unwrap_or_else(|| self.profile.region_or_default())
    }

    pub fn store(&self) -> Result<SharedCredentials> {
        Ok(SharedCredentials::new(&self.profile_name)?)
    }

    pub fn exchange(&self) -> CredentialExchange<StsTokenService> {
        CredentialExchange::new(StsTokenService::new(Some(self.region())))
    }

    pub fn explicit_role(&self) -> Option<String> {
        self.args
            .role
            .clone()
            .or_else(|| self.profile.saml_role_arn.clone())
            .filter(|arn| !arn.trim().is_empty())
    }

    pub fn skip_verify(&self) -> bool {
        self.args.skip_verify || self.profile.skip_verify()
    }

    /// Flag, then profile, then the assertion's own limit, then the default.
    pub fn session_duration(&self, assertion: Option<&SamlAssertion>) -> i64 {
        self.args
            .session_duration
            .or_else(|| self.profile.session_duration())
            .or_else(|| assertion.and_then(SamlAssertion::session_duration_seconds))
            .unwrap_or(DEFAULT_SESSION_DURATION)
    }
}

/// Returns stored credentials while the token service still accepts them,
/// otherwise logs in again.
pub async fn login(ctx: &Context, force: bool) -> Result<Credentials> {
    let store = ctx.store()?;

    if !force && store.exists()? {
        let mut credentials = store.load()?;
        credentials.region = Some(ctx.region());

        if ctx.exchange().check_liveness(&credentials).await? {
            info!("Credentials for profile {} are still valid", ctx.profile_name);
            return Ok(credentials);
        }
        info!("Stored credentials have expired, logging in again");
    }

    fresh_login(ctx, &store).await
}

async fn fresh_login(ctx: &Context, store: &SharedCredentials) -> Result<Credentials> {
    let http = create_http_client(ctx.skip_verify())?;
    let assertion = authenticate(ctx, &http).await?;

    let explicit_role = ctx.explicit_role();
    let catalog = build_catalog(&assertion, &HttpRolePage::new(http), explicit_role.as_deref())
        .await
        .context("Failed to assume role, please check you are permitted to assume the given role")?;

    let policy = ResolutionPolicy {
        explicit_role_arn: explicit_role,
        interactive: !ctx.args.skip_prompt,
    };
    let role = resolve(&catalog, &policy, &mut DialoguerPrompt::default())?;
    info!("Selected role: {}", role.role_arn);

    let duration = ctx.session_duration(Some(&assertion));
    let credentials = ctx
        .exchange()
        .exchange(&assertion, &role, duration)
        .await
        .context("error logging into role using SAML assertion")?;

    store.save(&credentials)?;
    info!("Logged in as: {}", credentials.principal_arn);
    if let Some(expiration) = credentials.expiration {
        info!("Credentials expire at {}", expiration);
    }

    Ok(credentials)
}

/// Authenticates against the identity provider and prints every assumable
/// role, grouped by account.
pub async fn list_roles(ctx: &Context) -> Result<()> {
    let http = create_http_client(ctx.skip_verify())?;
    let assertion = authenticate(ctx, &http).await?;

    let catalog = build_catalog(&assertion, &HttpRolePage::new(http), None).await?;
    if catalog.is_empty() {
        bail!("No roles to assume, check you are permitted to assume roles");
    }

    print!("{}", render_listing(&catalog.listing()));
    Ok(())
}

async fn authenticate(ctx: &Context, http: &HttpClient) -> Result<SamlAssertion> {
    let details = resolve_login_details(&ctx.profile, &ctx.args)?;
    details.validate()?;

    let provider = ctx.profile.provider()?;
    info!("Authenticating as {} using the {} provider ...", details.username, provider);

    let encoded = provider
        .client(http.clone())
        .authenticate(&details)
        .await
        .context("error authenticating to IdP")?;

    if encoded.trim().is_empty() {
        bail!("Response did not contain a valid SAML assertion, check your username and password");
    }

    Ok(SamlAssertion::decode(&encoded)?)
}

/// The role selection page is only fetched when more than one role is on
/// offer and either no explicit role was given or some trust principal is
/// still unknown.
pub async fn build_catalog(
    assertion: &SamlAssertion,
    page: &dyn RolePageSource,
    explicit_role: Option<&str>,
) -> Result<RoleCatalog> {
    let roles = assertion.roles();
    let needs_page = roles.len() > 1
        && (explicit_role.is_none() || roles.iter().any(|role| role.principal_arn.is_empty()));

    if !needs_page {
        return Ok(RoleCatalog::from_roles(roles)?);
    }

    debug!("Fetching role selection page for {} roles", roles.len());
    let accounts = fetch_accounts(page, assertion)
        .await
        .context("error parsing role accounts")?;

    Ok(reconcile(roles, &accounts)?)
}

/// Flags override the profile; prompts fill whatever is still blank unless
/// prompting is disabled.
pub fn resolve_login_details(profile: &ProfileConfig, args: &Args) -> Result<LoginDetails> {
    let mut details = merge_login_details(profile, args);

    if args.skip_prompt {
        return Ok(details);
    }

    let theme = ColorfulTheme::default();

    if details.url.trim().is_empty() {
        details.url = Input::with_theme(&theme)
            .with_prompt("IdP URL")
            .interact_text()?;
    }

    details.username = Input::with_theme(&theme)
        .with_prompt("Username")
        .default(details.username)
        .interact_text()?;

    if details.password.is_empty() {
        details.password = Password::with_theme(&theme)
            .with_prompt("Password")
            .interact()?;
    }

    Ok(details)
}

pub fn merge_login_details(profile: &ProfileConfig, args: &Args) -> LoginDetails {
    LoginDetails {
        url: args
            .url
            .clone()
            .or_else(|| profile.saml_url.clone())
            .unwrap_or_default(),
        username: args
            .username
            .clone()
            .or_else(|| profile.saml_username.clone())
            .unwrap_or_default(),
        password: args
            .password
            .clone()
            .or_else(|| profile.saml_password.clone())
            .unwrap_or_default(),
    }
}
