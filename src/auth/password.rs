use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use tracing::{error, warn};

use crate::config::PasswordConfig;

/// One-way hashing of account passwords with a fixed, configured cost.
#[derive(Clone)]
pub struct SecretHasher {
    params: Params,
}

impl SecretHasher {
    pub fn new(cfg: &PasswordConfig) -> anyhow::Result<Self> {
        let params = Params::new(cfg.memory_kib, cfg.cost, 1, None)
            .map_err(|e| anyhow::anyhow!("invalid argon2 params: {e}"))?;
        Ok(Self { params })
    }

    pub fn hash(&self, plain: &str) -> anyhow::Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone());
        let hash = argon2
            .hash_password(plain.as_bytes(), &salt)
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password error");
                anyhow::anyhow!(e.to_string())
            })?
            .to_string();
        Ok(hash)
    }

    /// A malformed stored digest counts as a failed verification.
    pub fn verify(&self, plain: &str, hash: &str) -> bool {
        let parsed = match PasswordHash::new(hash) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "argon2 parse hash error");
                return false;
            }
        };
        Argon2::default()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok()
    }
}
