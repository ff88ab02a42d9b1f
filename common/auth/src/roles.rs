pub const ROLE_CUSTOMER: &str = "customer";
pub const ROLE_EMPLOYEE: &str = "employee";

/// Prefix applied to role names to form authorities.
pub const AUTHORITY_PREFIX: &str = "ROLE_";

/// `"employee"` becomes `"ROLE_EMPLOYEE"`.
pub fn authority_for_role(role: &str) -> String {
    format!("{AUTHORITY_PREFIX}{}", role.trim().to_ascii_uppercase())
}
