pub mod context;
pub mod error;
pub mod gate;
pub mod identity;
pub mod middleware;
pub mod policy;

pub use context::{CurrentIdentity, SecurityContext};
pub use error::SecurityError;
pub use gate::{authorize, protect};
pub use identity::{
    find_subject_within, find_username_within, Identity, IdentityLookup, IdentityStore,
    InMemoryIdentityStore, LookupError, NewIdentity, RegistrationError,
};
pub use middleware::{authenticate, Authenticator, DEFAULT_LOOKUP_TIMEOUT};
pub use policy::{Access, AccessRule, PathPattern, RoutePolicy};
