use sha2::{Digest, Sha256};
use tracing::warn;

/// One-way pseudonymization of client addresses.
///
/// Produces `hex(sha256(address || salt))`. The raw address is never kept.
#[derive(Clone)]
pub struct IpHasher {
    salt: String,
}

impl IpHasher {
    pub fn new(salt: impl Into<String>) -> Self {
        Self { salt: salt.into() }
    }

    /// Uses `salt` when one is configured. A missing or blank salt is
    /// replaced by a random one that lives as long as the process, so hashes
    /// stop correlating across restarts.
    pub fn from_configured(salt: Option<String>) -> Self {
        match salt {
            Some(salt) if !salt.trim().is_empty() => Self::new(salt),
            _ => {
                warn!("no ip hash salt configured, using a random per-process salt");
                Self::with_random_salt()
            }
        }
    }

    pub fn with_random_salt() -> Self {
        let bytes: [u8; 32] = rand::random();
        Self::new(bytes.iter().map(|b| format!("{b:02x}")).collect::<String>())
    }

    pub fn hash(&self, address: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(address.as_bytes());
        hasher.update(self.salt.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

impl std::fmt::Debug for IpHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IpHasher").finish_non_exhaustive()
    }
}
