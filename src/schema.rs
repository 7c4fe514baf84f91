diesel::table! {
    users (oid) {
        oid -> BigInt,
        id -> Text,
        full_name -> Text,
        email -> Text,
        password_hash -> Text,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    user_tokens (oid) {
        oid -> BigInt,
        id -> Text,
        user_oid -> BigInt,
        token -> Text,
        expires_at -> Timestamp,
        created_at -> Timestamp,
    }
}

diesel::table! {
    buckets (oid) {
        oid -> BigInt,
        id -> Text,
        owner_oid -> BigInt,
        bucket_name -> Text,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    files (oid) {
        oid -> BigInt,
        id -> Text,
        bucket_oid -> BigInt,
        owner_oid -> BigInt,
        filename -> Text,
        storage_key -> Text,
        mimetype -> Text,
        bytes -> BigInt,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::joinable!(user_tokens -> users (user_oid));
diesel::joinable!(buckets -> users (owner_oid));
diesel::joinable!(files -> buckets (bucket_oid));

diesel::allow_tables_to_appear_in_same_query!(users, user_tokens, buckets, files,);
