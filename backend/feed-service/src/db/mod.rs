/// Database access layer
///
/// Repository modules with plain async functions over `PgPool` (or an open
/// transaction where the caller owns atomicity). All SQL lives here.
pub mod bookmark_repo;
pub mod comment_repo;
pub mod directory_repo;
pub mod feed_sync_repo;
pub mod moderation_repo;
pub mod pending_upload_repo;
pub mod plugin_repo;
pub mod post_repo;
pub mod reaction_repo;
