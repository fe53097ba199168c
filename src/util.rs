use rand::{distributions::Alphanumeric, rngs::OsRng, Rng};

/// Random alphanumeric string from the OS CSPRNG. Used for MQTT
/// credentials, invitation codes and verification codes, so a
/// predictable generator is not acceptable here.
pub fn random_alphanumeric(len: usize) -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
