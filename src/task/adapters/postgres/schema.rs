//! Diesel schema for transfer task persistence.

diesel::table! {
    /// Transfer task records.
    tasks (id) {
        /// Task identifier.
        id -> Uuid,
        /// Source reference as submitted.
        #[max_length = 512]
        source_reference -> Varchar,
        /// Destination reference.
        #[max_length = 512]
        target_reference -> Varchar,
        /// Destination registry host.
        #[max_length = 255]
        target_host -> Varchar,
        /// Destination username.
        #[max_length = 255]
        target_username -> Varchar,
        /// Stored registry configuration, if used.
        config_id -> Nullable<Uuid>,
        /// Lifecycle status.
        #[max_length = 20]
        status -> Varchar,
        /// Progress percentage.
        progress -> Int2,
        /// Current step ordinal.
        current_step -> Int2,
        /// Human-readable step message.
        step_message -> Text,
        /// Failure message.
        error_message -> Nullable<Text>,
        /// Duration in whole seconds.
        duration_secs -> Int8,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Start timestamp.
        started_at -> Nullable<Timestamptz>,
        /// Terminal transition timestamp.
        completed_at -> Nullable<Timestamptz>,
        /// Optimistic concurrency version.
        version -> Int8,
    }
}
