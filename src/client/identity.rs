//! Identity provisioning and the identity vault
//!
//! Enrollment against a certificate authority is expensive and
//! non-idempotent, so provisioning is guarded by a persistent vault: every
//! call checks the vault first and returns the cached identity without
//! touching the authority. A failed authority call never leaves a partial
//! vault entry, so a retry starts clean.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::{MeshError, Result};

/// Role granted to registered application principals.
const CLIENT_ROLE: &str = "client";

/// An enrolled identity as stored in the vault.
///
/// Certificate and key are PEM text, held opaquely; the mesh never parses
/// them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Identity {
    pub id: String,
    pub msp_id: String,
    pub certificate: String,
    pub private_key: String,
    pub enrolled_at: DateTime<Utc>,
}

/// Credential material returned by a successful enrollment.
#[derive(Debug, Clone)]
pub struct Enrollment {
    pub certificate: String,
    pub private_key: String,
}

/// Certificate authority operations consumed by provisioning.
///
/// Both calls are fallible network calls and must not be retried blindly;
/// the provisioning layer never invokes them for a principal the vault
/// already holds.
#[async_trait]
pub trait CertificateAuthority: Send + Sync {
    /// Enroll a principal with its secret, yielding credential material.
    async fn enroll(&self, id: &str, secret: &str) -> Result<Enrollment>;

    /// Register a new principal under the registrar's identity, yielding
    /// the enrollment secret for the follow-up enroll call.
    async fn register(
        &self,
        id: &str,
        affiliation: &str,
        role: &str,
        registrar: &Identity,
    ) -> Result<String>;
}

/// Persistent identity cache, keyed by principal id.
pub struct IdentityVault {
    db: sled::Db,
}

impl IdentityVault {
    /// Open or create the vault database.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path.as_ref())?;
        info!(path = %path.as_ref().display(), "Opened identity vault");
        Ok(Self { db })
    }

    pub fn get(&self, id: &str) -> Result<Option<Identity>> {
        match self.db.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn put(&self, identity: &Identity) -> Result<()> {
        let bytes = serde_json::to_vec(identity)?;
        self.db.insert(identity.id.as_bytes(), bytes)?;
        Ok(())
    }

    pub fn remove(&self, id: &str) -> Result<()> {
        self.db.remove(id.as_bytes())?;
        Ok(())
    }

    /// Ids of every cached principal.
    pub fn list_ids(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        for item in self.db.iter() {
            let (key, _) = item?;
            if let Ok(id) = String::from_utf8(key.to_vec()) {
                ids.push(id);
            }
        }
        Ok(ids)
    }
}

/// Enroll the registrar principal, skipping the authority entirely when the
/// vault already holds it.
pub async fn enroll_admin(
    ca: &dyn CertificateAuthority,
    vault: &IdentityVault,
    msp_id: &str,
    admin_id: &str,
    admin_secret: &str,
) -> Result<Identity> {
    if let Some(identity) = vault.get(admin_id)? {
        info!(identity = %admin_id, "Registrar already in vault, skipping enrollment");
        return Ok(identity);
    }

    let enrollment = match ca.enroll(admin_id, admin_secret).await {
        Ok(enrollment) => enrollment,
        Err(err) => {
            error!(identity = %admin_id, error = %err, "Registrar enrollment failed");
            return Err(err);
        }
    };

    let identity = Identity {
        id: admin_id.to_string(),
        msp_id: msp_id.to_string(),
        certificate: enrollment.certificate,
        private_key: enrollment.private_key,
        enrolled_at: Utc::now(),
    };
    vault.put(&identity)?;
    info!(identity = %admin_id, msp = %msp_id, "Enrolled registrar");
    Ok(identity)
}

/// Register and enroll an application principal.
///
/// Requires the registrar in the vault; fails with an identity error before
/// any authority call otherwise. Idempotent the same way as
/// [`enroll_admin`].
pub async fn register_user(
    ca: &dyn CertificateAuthority,
    vault: &IdentityVault,
    msp_id: &str,
    admin_id: &str,
    user_id: &str,
    affiliation: &str,
) -> Result<Identity> {
    if let Some(identity) = vault.get(user_id)? {
        info!(identity = %user_id, "Principal already in vault, skipping registration");
        return Ok(identity);
    }

    let registrar = vault.get(admin_id)?.ok_or_else(|| {
        MeshError::Identity(format!(
            "registrar {admin_id} must be enrolled before registering users"
        ))
    })?;

    let secret = match ca.register(user_id, affiliation, CLIENT_ROLE, &registrar).await {
        Ok(secret) => secret,
        Err(err) => {
            error!(identity = %user_id, error = %err, "Registration failed");
            return Err(err);
        }
    };
    let enrollment = match ca.enroll(user_id, &secret).await {
        Ok(enrollment) => enrollment,
        Err(err) => {
            error!(identity = %user_id, error = %err, "Enrollment failed");
            return Err(err);
        }
    };

    let identity = Identity {
        id: user_id.to_string(),
        msp_id: msp_id.to_string(),
        certificate: enrollment.certificate,
        private_key: enrollment.private_key,
        enrolled_at: Utc::now(),
    };
    vault.put(&identity)?;
    info!(identity = %user_id, affiliation = %affiliation, "Registered and enrolled principal");
    Ok(identity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct StubCa {
        enrolls: AtomicUsize,
        registers: AtomicUsize,
        fail_enroll: AtomicBool,
    }

    #[async_trait]
    impl CertificateAuthority for StubCa {
        async fn enroll(&self, id: &str, _secret: &str) -> Result<Enrollment> {
            self.enrolls.fetch_add(1, Ordering::SeqCst);
            if self.fail_enroll.load(Ordering::SeqCst) {
                return Err(MeshError::Transport("authority unreachable".to_string()));
            }
            Ok(Enrollment {
                certificate: format!("cert:{id}"),
                private_key: format!("key:{id}"),
            })
        }

        async fn register(
            &self,
            id: &str,
            _affiliation: &str,
            role: &str,
            registrar: &Identity,
        ) -> Result<String> {
            self.registers.fetch_add(1, Ordering::SeqCst);
            assert_eq!(role, "client");
            assert_eq!(registrar.id, "admin");
            Ok(format!("secret:{id}"))
        }
    }

    fn vault() -> (tempfile::TempDir, IdentityVault) {
        let dir = tempfile::tempdir().unwrap();
        let vault = IdentityVault::open(dir.path().join("vault")).unwrap();
        (dir, vault)
    }

    #[test]
    fn vault_round_trips_identities() {
        let (_dir, vault) = vault();
        let identity = Identity {
            id: "admin".to_string(),
            msp_id: "Org1MSP".to_string(),
            certificate: "cert".to_string(),
            private_key: "key".to_string(),
            enrolled_at: Utc::now(),
        };

        assert_eq!(vault.get("admin").unwrap(), None);
        vault.put(&identity).unwrap();
        assert_eq!(vault.get("admin").unwrap(), Some(identity));
        assert_eq!(vault.list_ids().unwrap(), vec!["admin".to_string()]);

        vault.remove("admin").unwrap();
        assert_eq!(vault.get("admin").unwrap(), None);
    }

    #[tokio::test]
    async fn second_admin_enrollment_makes_zero_authority_calls() {
        let (_dir, vault) = vault();
        let ca = StubCa::default();

        let first = enroll_admin(&ca, &vault, "Org1MSP", "admin", "adminpw")
            .await
            .unwrap();
        assert_eq!(ca.enrolls.load(Ordering::SeqCst), 1);

        let second = enroll_admin(&ca, &vault, "Org1MSP", "admin", "adminpw")
            .await
            .unwrap();
        assert_eq!(ca.enrolls.load(Ordering::SeqCst), 1);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn failed_enrollment_leaves_the_vault_clean() {
        let (_dir, vault) = vault();
        let ca = StubCa::default();
        ca.fail_enroll.store(true, Ordering::SeqCst);

        let err = enroll_admin(&ca, &vault, "Org1MSP", "admin", "adminpw")
            .await
            .unwrap_err();
        assert!(matches!(err, MeshError::Transport(_)));
        assert_eq!(vault.get("admin").unwrap(), None);

        // the retry starts clean and succeeds
        ca.fail_enroll.store(false, Ordering::SeqCst);
        enroll_admin(&ca, &vault, "Org1MSP", "admin", "adminpw")
            .await
            .unwrap();
        assert!(vault.get("admin").unwrap().is_some());
    }

    #[tokio::test]
    async fn user_registration_requires_the_registrar() {
        let (_dir, vault) = vault();
        let ca = StubCa::default();

        let err = register_user(&ca, &vault, "Org1MSP", "admin", "appUser", "org1.department1")
            .await
            .unwrap_err();
        assert!(matches!(err, MeshError::Identity(_)));
        assert_eq!(ca.registers.load(Ordering::SeqCst), 0);
        assert_eq!(ca.enrolls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn user_registration_is_idempotent_through_the_vault() {
        let (_dir, vault) = vault();
        let ca = StubCa::default();

        enroll_admin(&ca, &vault, "Org1MSP", "admin", "adminpw")
            .await
            .unwrap();
        let user = register_user(&ca, &vault, "Org1MSP", "admin", "appUser", "org1.department1")
            .await
            .unwrap();
        assert_eq!(user.certificate, "cert:appUser");
        assert_eq!(ca.registers.load(Ordering::SeqCst), 1);
        assert_eq!(ca.enrolls.load(Ordering::SeqCst), 2);

        register_user(&ca, &vault, "Org1MSP", "admin", "appUser", "org1.department1")
            .await
            .unwrap();
        assert_eq!(ca.registers.load(Ordering::SeqCst), 1);
        assert_eq!(ca.enrolls.load(Ordering::SeqCst), 2);
    }
}
