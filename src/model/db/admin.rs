use std::ops::{Deref, DerefMut};

use mongodb::error::Error as DbError;
use rand::{thread_rng, Rng};
use serde::{Deserialize, Serialize};

use crate::model::{
    api::auth::AdminRole,
    mongodb::{Coll, Id},
};

/// Core admin user data.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminCore {
    pub username: String,
    pub password_hash: String,
    pub role: AdminRole,
}

impl AdminCore {
    /// Create a new admin, hashing the given password.
    pub fn new(username: String, password: &str, role: AdminRole) -> Self {
        let salt = thread_rng().gen::<[u8; 16]>();
        Self {
            username,
            password_hash: argon2::hash_encoded(
                password.as_bytes(),
                &salt,
                &argon2::Config::default(),
            )
            .unwrap(), // Valid because the default config is valid
            role,
        }
    }

    /// Check whether the given password is correct.
    pub fn verify_password<T: AsRef<[u8]>>(&self, password: T) -> bool {
        // Unwrap safe because the only way to create an AdminCore is via
        // `new`, so the hash is always well-formed.
        argon2::verify_encoded(&self.password_hash, password.as_ref()).unwrap()
    }
}

/// An admin without an ID.
pub type NewAdmin = AdminCore;

/// An admin user from the database, with its unique ID.
#[derive(Serialize, Deserialize)]
pub struct Admin {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub admin: AdminCore,
}

impl Deref for Admin {
    type Target = AdminCore;

    fn deref(&self) -> &Self::Target {
        &self.admin
    }
}

impl DerefMut for Admin {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.admin
    }
}

/// Ensure at least one admin account exists, bootstrapping the default super
/// admin from the configured credentials if the collection is empty.
pub async fn ensure_admin_exists(
    admins: &Coll<NewAdmin>,
    username: &str,
    password: &str,
) -> Result<(), DbError> {
    if admins.count_documents(None, None).await? == 0 {
        let admin = AdminCore::new(username.to_string(), password, AdminRole::SuperAdmin);
        admins.insert_one(&admin, None).await?;
        warn!("Bootstrapped default admin '{username}'; change its password before polling opens");
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifies_only_the_original_password() {
        let admin = AdminCore::example();
        assert!(admin.verify_password("correct-horse-battery-staple"));
        assert!(!admin.verify_password("incorrect-horse-battery-staple"));
        assert!(!admin.verify_password(""));
    }

    #[test]
    fn equal_passwords_hash_differently() {
        let first = AdminCore::new("a".to_string(), "hunter2", AdminRole::Viewer);
        let second = AdminCore::new("a".to_string(), "hunter2", AdminRole::Viewer);

        assert_ne!(first.password_hash, second.password_hash);
        assert!(first.verify_password("hunter2"));
        assert!(second.verify_password("hunter2"));
    }
}
