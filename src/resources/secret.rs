use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Secret;
use rand::Rng;

use crate::crd::ParadeDB;
use crate::resources::common::{object_meta, standard_labels};

/// Length of generated superuser passwords
pub const PASSWORD_LENGTH: usize = 16;

/// Superuser name stored in generated credentials
pub const DEFAULT_SUPERUSER: &str = "postgres";

/// Keys every superuser credentials Secret must carry
pub const USERNAME_KEY: &str = "username";
pub const PASSWORD_KEY: &str = "password";
pub const DATABASE_KEY: &str = "database";

/// Generate a secure random password
pub fn generate_password(len: usize) -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::rng();
    (0..len)
        .map(|_| CHARSET[rng.random_range(0..CHARSET.len())] as char)
        .collect()
}

/// Generate the `<name>-credentials` Secret.
///
/// The password is random on every call; the syncer creates this Secret once
/// and never replaces it, so it is generated a single time per instance.
pub fn generate_credentials_secret(db: &ParadeDB) -> Secret {
    let string_data = BTreeMap::from([
        (USERNAME_KEY.to_string(), DEFAULT_SUPERUSER.to_string()),
        (PASSWORD_KEY.to_string(), generate_password(PASSWORD_LENGTH)),
        (DATABASE_KEY.to_string(), db.spec.auth.database.clone()),
    ]);

    Secret {
        metadata: object_meta(db, db.credentials_secret_name(), standard_labels(db)),
        type_: Some("Opaque".to_string()),
        string_data: Some(string_data),
        ..Default::default()
    }
}

/// Check whether a Secret carries `key` in either `data` or `stringData`
pub fn has_key(secret: &Secret, key: &str) -> bool {
    secret.data.as_ref().is_some_and(|d| d.contains_key(key))
        || secret
            .string_data
            .as_ref()
            .is_some_and(|d| d.contains_key(key))
}
