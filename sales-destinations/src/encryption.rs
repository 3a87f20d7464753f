use std::sync::Once;

/// Ensures crypto provider is only initialized once.
static INIT_CRYPTO: Once = Once::new();

/// Installs the default cryptographic provider.
///
/// Uses the AWS LC provider. Must run before the first TLS connection is opened; later
/// calls are no-ops.
pub fn install_crypto_provider() {
    INIT_CRYPTO.call_once(|| {
        // Fails only when another provider was installed first, which is fine to keep.
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
    });
}
