//! The 404 page.

use axum::{
    extract::Query,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use maud::html;

use crate::{
    endpoints,
    html::{LINK_STYLE, PAGE_CONTAINER_STYLE, base, lang_href},
    translation::{Lang, LangQuery, translate},
};

/// Handler for requests that match no route.
pub async fn get_404_not_found(Query(LangQuery { lang }): Query<LangQuery>) -> Response {
    get_404_not_found_response(lang)
}

/// Build the 404 response in the given language.
pub fn get_404_not_found_response(lang: Lang) -> Response {
    let title = translate(lang, "page.not_found");
    let content = html! {
        main class=(PAGE_CONTAINER_STYLE)
        {
            h1 { (title) }

            a href=(lang_href(endpoints::ROOT, lang)) class=(LINK_STYLE) { "Mizan" }
        }
    };

    (StatusCode::NOT_FOUND, base(title, lang, &content)).into_response()
}
