//! The `blog_system` schema
//!
//! Users write posts; posts collect comments, tags and categories. Deleting
//! a user removes everything hanging off them. Post bodies are full-text
//! searchable and `posts.updated_at` is stamped on every update.

use tracing::info;

use crate::catalog::{
    Catalog, Column, DataType, ForeignKey, Parameter, ProcedureDef, TableBuilder, TriggerAction,
    TriggerDef, TriggerEvent, TriggerTiming,
};
use crate::config::EngineConfig;
use crate::database::Database;
use crate::error::Result;
use crate::query::{OrderBy, Predicate, Select};
use crate::storage::{RowKey, Value};

/// Author id every demo post is attributed to
pub const DEMO_USER_ID: &str = "aec92dd8-79dd-4b22-9deb-a2af00d568c8";
pub const DEMO_USERNAME: &str = "rishabh";
pub const DEMO_EMAIL: &str = "rishabh@example.com";

fn uuid_column(name: &str) -> Column {
    Column::new(name, DataType::Varchar(36))
}

/// Define every blog_system table, index, trigger and procedure in `catalog`
pub fn define_schema(catalog: &Catalog) -> Result<()> {
    catalog.define_table(
        TableBuilder::new("users")
            .column(uuid_column("id"))
            .column(Column::new("username", DataType::Varchar(50)).not_null())
            .column(Column::new("email", DataType::Varchar(100)).not_null())
            .column(
                Column::new("status", DataType::enumeration(["active", "inactive", "banned"]))
                    .not_null()
                    .default("active"),
            )
            .column(Column::new("created_at", DataType::Timestamp).default_current_timestamp())
            .primary_key(["id"])
            .unique("uq_users_username", ["username"])
            .unique("uq_users_email", ["email"])
            .build(),
    )?;

    catalog.define_table(
        TableBuilder::new("categories")
            .column(Column::new("id", DataType::Integer))
            .column(Column::new("name", DataType::Varchar(50)).not_null())
            .column(Column::new("description", DataType::Text))
            .primary_key(["id"])
            .unique("uq_categories_name", ["name"])
            .build(),
    )?;

    catalog.define_table(
        TableBuilder::new("posts")
            .column(uuid_column("id"))
            .column(uuid_column("user_id").not_null())
            .column(Column::new("title", DataType::Varchar(255)).not_null())
            .column(Column::new("summary", DataType::Text))
            .column(Column::new("main_content", DataType::Text).not_null())
            .column(
                Column::new("status", DataType::enumeration(["draft", "published", "archived"]))
                    .not_null()
                    .default("draft"),
            )
            .column(Column::new("created_at", DataType::Timestamp).default_current_timestamp())
            .column(Column::new("updated_at", DataType::Timestamp).default_current_timestamp())
            .primary_key(["id"])
            .foreign_key(ForeignKey::new("fk_posts_user", "user_id", "users", "id").on_delete_cascade())
            .build(),
    )?;

    catalog.define_table(
        TableBuilder::new("comments")
            .column(Column::new("id", DataType::Integer))
            .column(uuid_column("post_id").not_null())
            .column(uuid_column("user_id").not_null())
            .column(Column::new("content", DataType::Text).not_null())
            .column(Column::new("created_at", DataType::Timestamp).default_current_timestamp())
            .primary_key(["id"])
            .foreign_key(ForeignKey::new("fk_comments_post", "post_id", "posts", "id").on_delete_cascade())
            .foreign_key(ForeignKey::new("fk_comments_user", "user_id", "users", "id").on_delete_cascade())
            .build(),
    )?;

    catalog.define_table(
        TableBuilder::new("tags")
            .column(Column::new("id", DataType::Integer))
            .column(Column::new("name", DataType::Varchar(50)).not_null())
            .primary_key(["id"])
            .unique("uq_tags_name", ["name"])
            .build(),
    )?;

    catalog.define_table(
        TableBuilder::new("post_tags")
            .column(uuid_column("post_id"))
            .column(Column::new("tag_id", DataType::Integer))
            .primary_key(["post_id", "tag_id"])
            .foreign_key(ForeignKey::new("fk_post_tags_post", "post_id", "posts", "id").on_delete_cascade())
            .foreign_key(ForeignKey::new("fk_post_tags_tag", "tag_id", "tags", "id").on_delete_cascade())
            .build(),
    )?;

    catalog.define_table(
        TableBuilder::new("post_categories")
            .column(uuid_column("post_id"))
            .column(Column::new("category_id", DataType::Integer))
            .primary_key(["post_id", "category_id"])
            .foreign_key(
                ForeignKey::new("fk_post_categories_post", "post_id", "posts", "id").on_delete_cascade(),
            )
            .foreign_key(
                ForeignKey::new("fk_post_categories_category", "category_id", "categories", "id")
                    .on_delete_cascade(),
            )
            .build(),
    )?;

    catalog.define_index("idx_posts_user", "posts", vec!["user_id".into()])?;
    catalog.define_index("idx_comments_post", "comments", vec!["post_id".into()])?;
    catalog.define_full_text_index(
        "ft_posts_content",
        "posts",
        vec!["summary".into(), "main_content".into()],
    )?;

    catalog.define_trigger(TriggerDef::new(
        "trg_posts_updated_at",
        "posts",
        TriggerTiming::Before,
        TriggerEvent::Update,
        "updated_at",
        TriggerAction::Now,
    ))?;

    catalog.define_procedure(ProcedureDef::new(
        "GetUserPosts",
        vec![Parameter::new("userId", DataType::Varchar(36))],
        Select::from("posts")
            .filter(Predicate::eq_param("user_id", "userId"))
            .order_by(OrderBy::desc("created_at")),
    ))?;

    Ok(())
}

/// Open a blog_system database, replaying its commit log if configured
pub fn open(config: EngineConfig) -> Result<Database> {
    let catalog = Catalog::new();
    define_schema(&catalog)?;
    Database::open(config, catalog)
}

/// An empty in-memory blog_system database
pub fn in_memory() -> Result<Database> {
    open(EngineConfig::default())
}

/// Add the demo author unless a user with that name exists
///
/// Returns whether the user was inserted.
pub fn seed_demo_data(db: &Database) -> Result<bool> {
    db.transaction(|txn| {
        let existing = txn.select(
            &Select::from("users")
                .columns(["id"])
                .filter(Predicate::eq("username", DEMO_USERNAME)),
        )?;
        if !existing.is_empty() {
            return Ok(false);
        }
        txn.insert(
            "users",
            [
                ("id", DEMO_USER_ID),
                ("username", DEMO_USERNAME),
                ("email", DEMO_EMAIL),
            ],
        )?;
        info!(user = DEMO_USERNAME, "seeded demo user");
        Ok(true)
    })
}

/// A post as the blog application submits it
#[derive(Debug, Clone)]
pub struct NewPost<'a> {
    pub id: &'a str,
    pub user_id: &'a str,
    pub title: &'a str,
    pub summary: Option<&'a str>,
    pub content: &'a str,
}

impl NewPost<'_> {
    /// Column assignments for `Transaction::insert`
    pub fn values(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", self.id.into()),
            ("user_id", self.user_id.into()),
            ("title", self.title.into()),
            ("summary", self.summary.into()),
            ("main_content", self.content.into()),
        ]
    }
}

/// Publish a post in its own transaction
pub fn create_post(db: &Database, post: &NewPost<'_>) -> Result<RowKey> {
    db.transaction(|txn| txn.insert("posts", post.values()))
}
