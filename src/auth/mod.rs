pub mod extractor;
pub mod jwt;

/// Exempts the holder from every gate check.
pub const BYPASS_CAPABILITY: &str = "bypass honeypot protection";

/// Grants access to the protection settings and the blocked log.
pub const ADMIN_CAPABILITY: &str = "administer honeypot";
