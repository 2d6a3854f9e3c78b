// Target database schema, matching the tables created by
// `DieselTarget::init_schema`.

diesel::table! {
    users (id) {
        id -> BigInt,
        username -> Text,
        name -> Nullable<Text>,
        email -> Nullable<Text>,
        website -> Nullable<Text>,
        location -> Nullable<Text>,
        registration_ip -> Nullable<Text>,
        admin -> Integer,
        moderator -> Integer,
        created_at -> Nullable<Text>,
        last_seen_at -> Nullable<Text>,
        suspended_at -> Nullable<Text>,
        suspended_till -> Nullable<Text>,
    }
}

diesel::table! {
    groups (id) {
        id -> BigInt,
        name -> Text,
    }
}

diesel::table! {
    group_users (group_id, user_id) {
        group_id -> BigInt,
        user_id -> BigInt,
    }
}

diesel::table! {
    categories (id) {
        id -> BigInt,
        name -> Text,
        description -> Nullable<Text>,
        position -> Integer,
        parent_category_id -> Nullable<BigInt>,
        read_restricted -> Integer,
        suppress_from_homepage -> Integer,
    }
}

diesel::table! {
    category_groups (category_id, group_id) {
        category_id -> BigInt,
        group_id -> BigInt,
        permission_type -> Integer,
    }
}

diesel::table! {
    topics (id) {
        id -> BigInt,
        title -> Text,
        category_id -> BigInt,
        user_id -> BigInt,
        created_at -> Text,
        highest_post_number -> Integer,
    }
}

diesel::table! {
    posts (id) {
        id -> BigInt,
        topic_id -> BigInt,
        post_number -> Integer,
        user_id -> BigInt,
        raw -> Text,
        created_at -> Text,
    }
}

diesel::table! {
    permalinks (url) {
        url -> Text,
        category_id -> Nullable<BigInt>,
        topic_id -> Nullable<BigInt>,
        post_id -> Nullable<BigInt>,
        created_at -> Text,
    }
}

diesel::table! {
    staff_action_logs (id) {
        id -> Integer,
        acting_user_id -> BigInt,
        target_user_id -> BigInt,
        action -> Text,
        details -> Text,
        created_at -> Text,
    }
}

diesel::table! {
    import_ids (kind, source_id) {
        kind -> Text,
        source_id -> BigInt,
        target_id -> BigInt,
        created_at -> Text,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    users,
    groups,
    group_users,
    categories,
    category_groups,
    topics,
    posts,
    permalinks,
    staff_action_logs,
    import_ids,
);
