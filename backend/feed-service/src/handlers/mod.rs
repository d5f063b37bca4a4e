/// HTTP handlers for the feed API
///
/// All routes live under `/api/v1`. Identity comes from the gateway's
/// forwarded headers via the `AuthenticatedUser` extractor.
pub mod comments;
pub mod posts;
pub mod reactions;
pub mod uploads;

use actix_web::web;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/posts", web::post().to(posts::create_post))
            .route("/posts", web::get().to(posts::list_posts))
            .route("/posts/{id}", web::get().to(posts::get_post))
            .route("/posts/{id}", web::patch().to(posts::update_post))
            .route("/posts/{id}", web::delete().to(posts::delete_post))
            .route("/posts/{id}/flag", web::post().to(posts::flag_post))
            .route("/posts/{id}/moderate", web::post().to(posts::moderate_post))
            .route("/posts/{id}/like", web::post().to(reactions::toggle_like))
            .route(
                "/posts/{id}/bookmark",
                web::post().to(reactions::toggle_bookmark),
            )
            .route("/bookmarks", web::get().to(reactions::list_bookmarks))
            .route(
                "/posts/{id}/comments",
                web::post().to(comments::create_comment),
            )
            .route(
                "/posts/{id}/comments",
                web::get().to(comments::list_comments),
            )
            .route(
                "/comments/{id}",
                web::delete().to(comments::delete_comment),
            )
            .route("/uploads", web::post().to(uploads::upload_media)),
    );
}
