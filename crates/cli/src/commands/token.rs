//! Development bearer tokens.

use forkful_core::{SubjectId, SubjectRole};
use forkful_storefront::config::TokenConfig;
use forkful_storefront::services::JwtVerifier;

/// Print a token for `subject` signed with the storefront's token secret.
///
/// # Errors
///
/// Returns an error if the token settings are missing or the subject is blank.
pub fn issue(subject: &str, staff: bool, hours: i64) -> Result<(), Box<dyn std::error::Error>> {
    let config = TokenConfig::from_env()?;
    let subject = SubjectId::parse(subject)?;
    let role = if staff {
        SubjectRole::Staff
    } else {
        SubjectRole::Customer
    };

    let token = JwtVerifier::new(&config).issue(&subject, role, chrono::Duration::hours(hours))?;

    tracing::info!(subject = %subject, ?role, hours, "Token issued");
    #[allow(clippy::print_stdout)]
    {
        println!("{token}");
    }
    Ok(())
}
