//! The shared HTML skeleton and style hooks for all pages.

use maud::{DOCTYPE, Markup, PreEscaped, html};

use crate::translation::Lang;

// Link styles
pub const LINK_STYLE: &str = "link";

// Button styles
pub const BUTTON_PRIMARY_STYLE: &str = "button-primary";

// Form styles
pub const FORM_CONTAINER_STYLE: &str = "form-container";
pub const FORM_LABEL_STYLE: &str = "form-label";
pub const FORM_TEXT_INPUT_STYLE: &str = "form-input";

// Table styles
pub const TABLE_STYLE: &str = "data-table";
pub const TABLE_HEADER_STYLE: &str = "table-header";
pub const TABLE_ROW_STYLE: &str = "table-row";
pub const TABLE_CELL_STYLE: &str = "table-cell";

// Page container
pub const PAGE_CONTAINER_STYLE: &str = "page-container";

// Alert styles
pub const ALERT_ERROR_STYLE: &str = "alert-error";

const BASE_STYLE: &str = r#"
    body { margin: 0; font-family: system-ui, sans-serif; background: #f7f7f5; color: #1c1c1c; }
    .page-container { max-width: 56rem; margin: 0 auto; padding: 1.5rem; }
    .link { color: #1d4ed8; text-decoration: underline; }
    .button-primary { padding: 0.5rem 1rem; background: #1d4ed8; color: #fff; border: none; border-radius: 0.25rem; cursor: pointer; }
    .form-container { max-width: 24rem; margin: 3rem auto; }
    .form-label { display: block; margin: 0.75rem 0 0.25rem; font-weight: 600; }
    .form-input { width: 100%; padding: 0.5rem; border: 1px solid #d4d4d4; border-radius: 0.25rem; }
    .data-table { width: 100%; border-collapse: collapse; }
    .table-header { text-align: start; border-bottom: 2px solid #d4d4d4; padding: 0.5rem 0.75rem; text-transform: uppercase; font-size: 0.8rem; }
    .table-row { border-bottom: 1px solid #e5e5e5; }
    .table-cell { padding: 0.5rem 0.75rem; }
    .alert-error { margin: 0.75rem 0; padding: 0.75rem; background: #fef2f2; color: #b91c1c; border-radius: 0.25rem; }
    .balance-debt { color: #b91c1c; }
    .balance-credit { color: #15803d; }
    nav { display: flex; gap: 1rem; padding: 1rem 1.5rem; background: #fff; border-bottom: 1px solid #e5e5e5; }
    nav a { text-decoration: none; color: #1c1c1c; }
    nav a.current { color: #1d4ed8; font-weight: 600; }
"#;

/// Render the HTML skeleton around `content`.
///
/// `lang` sets the document's `lang` and `dir` attributes so Arabic pages
/// render right-to-left.
pub fn base(title: &str, lang: Lang, content: &Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang=(lang.code()) dir=(lang.dir())
        {
            head
            {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (title) " - Mizan" }

                style { (PreEscaped(BASE_STYLE)) }
            }

            body
            {
                (content)
            }
        }
    }
}

/// Append the `lang` query parameter to `endpoint` when the display language
/// is not the default, so links keep the reader's language.
pub fn lang_href(endpoint: &str, lang: Lang) -> String {
    match lang {
        Lang::En => endpoint.to_owned(),
        Lang::Ar => format!("{endpoint}?lang={}", lang.code()),
    }
}
