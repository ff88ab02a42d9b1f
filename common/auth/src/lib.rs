pub mod bearer;
pub mod claims;
pub mod clock;
pub mod codec;
pub mod config;
pub mod error;
pub mod issuer;
pub mod roles;
pub mod validator;

pub use bearer::{bearer_token, parse_bearer, parse_bearer_str, BEARER_PREFIX};
pub use claims::{Claims, TokenType};
pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::TokenCodec;
pub use config::{HmacAlgorithm, JwtConfig};
pub use error::{AuthError, AuthResult, TokenError};
pub use issuer::TokenIssuer;
pub use roles::{authority_for_role, AUTHORITY_PREFIX, ROLE_CUSTOMER, ROLE_EMPLOYEE};
pub use validator::TokenValidator;
