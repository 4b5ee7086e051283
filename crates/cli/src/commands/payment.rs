//! Payment callback signing for sandbox testing.

use forkful_core::{PaymentIntentId, TransactionId};
use forkful_storefront::config::PaymentConfig;
use forkful_storefront::payment::sign_callback;
use secrecy::ExposeSecret;

/// Print the signature the gateway would attach to this callback.
///
/// # Errors
///
/// Returns an error if the gateway settings are missing or an id is blank.
pub fn sign(intent: &str, transaction: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = PaymentConfig::from_env()?;
    let intent = PaymentIntentId::parse(intent)?;
    let transaction = TransactionId::parse(transaction)?;

    let signature = sign_callback(
        intent.as_str(),
        transaction.as_str(),
        config.key_secret.expose_secret(),
    );

    #[allow(clippy::print_stdout)]
    {
        println!("{signature}");
    }
    Ok(())
}
