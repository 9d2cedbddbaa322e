// Diesel table definitions for the survey sync tables.

diesel::table! {
    entities (kind, id) {
        kind -> Text,
        id -> Text,
        parent_kind -> Nullable<Text>,
        parent_id -> Nullable<Text>,
        fields -> Text,
        child_ids -> Text,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    entity_links (parent_kind, parent_id, child_kind, child_id) {
        parent_kind -> Text,
        parent_id -> Text,
        child_kind -> Text,
        child_id -> Text,
        created_at -> Text,
    }
}

diesel::table! {
    sync_records (id) {
        id -> Text,
        device_id -> Text,
        platform -> Nullable<Text>,
        app_version -> Nullable<Text>,
        client_timestamp -> Nullable<Text>,
        synced_at -> Text,
        total_entities -> BigInt,
        created_count -> BigInt,
        updated_count -> BigInt,
        deleted_count -> BigInt,
        unchanged_count -> BigInt,
        files_processed -> BigInt,
        files_succeeded -> BigInt,
        files_failed -> BigInt,
        file_sync_completed -> Bool,
        file_sync_completed_at -> Nullable<Text>,
    }
}

diesel::allow_tables_to_appear_in_same_query!(entities, entity_links, sync_records,);
