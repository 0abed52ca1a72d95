//! Diesel schema for registry configuration persistence.

diesel::table! {
    /// Stored destination registry configurations.
    registry_configs (id) {
        /// Configuration identifier.
        id -> Uuid,
        /// Display name.
        #[max_length = 255]
        name -> Varchar,
        /// Registry URL as entered.
        #[max_length = 512]
        registry_url -> Varchar,
        /// Registry username.
        #[max_length = 255]
        username -> Varchar,
        /// Encrypted password blob.
        password_encrypted -> Text,
        /// Verification status.
        #[max_length = 20]
        status -> Varchar,
        /// Time of the last connectivity test.
        last_tested_at -> Nullable<Timestamptz>,
        /// Default flag; a partial unique index allows one `true` row.
        is_default -> Bool,
        /// Creation timestamp.
        created_at -> Timestamptz,
    }
}
