pub mod assertion;
pub mod credentials;
pub mod error;
pub mod exchange;
pub mod helpers;
pub mod http;
pub mod prompt;
pub mod provider;
pub mod reconcile;
pub mod resolver;
pub mod role;
pub mod role_page;
pub mod sts;

pub use assertion::SamlAssertion;
pub use credentials::{CredentialStore, Credentials};
pub use error::{FederationError, Result};
pub use exchange::{ChainedRole, CredentialExchange, TokenService};
pub use reconcile::RoleCatalog;
pub use resolver::{ResolutionPolicy, RolePrompt};
pub use role::{Account, Role};
