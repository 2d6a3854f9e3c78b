//! Diesel record types for the target database.

use diesel::prelude::*;

use crate::schema;

#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = schema::users)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    pub suspended_till: Option<String>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = schema::users)]
pub struct NewUser<'a> {
    pub id: i64,
    pub username: &'a str,
    pub name: Option<&'a str>,
    pub email: Option<&'a str>,
    pub website: Option<&'a str>,
    pub location: Option<&'a str>,
    pub registration_ip: Option<&'a str>,
    pub admin: i32,
    pub moderator: i32,
    pub created_at: Option<&'a str>,
    pub last_seen_at: Option<&'a str>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = schema::groups)]
pub struct NewGroup<'a> {
    pub id: i64,
    pub name: &'a str,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = schema::categories)]
pub struct NewCategory<'a> {
    pub id: i64,
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub position: i32,
    pub parent_category_id: Option<i64>,
    pub read_restricted: i32,
    pub suppress_from_homepage: i32,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = schema::topics)]
pub struct NewTopic<'a> {
    pub id: i64,
    pub title: &'a str,
    pub category_id: i64,
    pub user_id: i64,
    pub created_at: &'a str,
    pub highest_post_number: i32,
}

#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = schema::posts)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PostLocationRecord {
    pub id: i64,
    pub topic_id: i64,
    pub post_number: i32,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = schema::posts)]
pub struct NewPost<'a> {
    pub id: i64,
    pub topic_id: i64,
    pub post_number: i32,
    pub user_id: i64,
    pub raw: &'a str,
    pub created_at: &'a str,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = schema::permalinks)]
pub struct NewPermalink<'a> {
    pub url: &'a str,
    pub category_id: Option<i64>,
    pub topic_id: Option<i64>,
    pub post_id: Option<i64>,
    pub created_at: &'a str,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = schema::staff_action_logs)]
pub struct NewStaffAction<'a> {
    pub acting_user_id: i64,
    pub target_user_id: i64,
    pub action: &'a str,
    pub details: &'a str,
    pub created_at: &'a str,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = schema::import_ids)]
pub struct NewImportId<'a> {
    pub kind: &'a str,
    pub source_id: i64,
    pub target_id: i64,
    pub created_at: &'a str,
}
