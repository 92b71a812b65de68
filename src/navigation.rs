//! This file defines the templates and a convenience function for creating the navigation bar.

use maud::{Markup, html};

use crate::{
    endpoints,
    html::lang_href,
    translation::{Lang, translate},
};

/// Template for a link in the navigation bar.
///
/// It will change appearance if `is_current` is set to
/// `true`. Only one link should be set as active at any one time.
#[derive(Clone)]
struct Link {
    url: String,
    title: &'static str,
    is_current: bool,
}

impl Link {
    fn into_html(self) -> Markup {
        let class = if self.is_current { "current" } else { "" };

        html!( a href=(self.url) class=(class) { (self.title) } )
    }
}

/// The translated navigation bar.
pub struct NavBar {
    links: Vec<Link>,
}

impl NavBar {
    /// Get the navigation bar in the given language.
    ///
    /// If a link matches `active_endpoint`, then that link will be
    /// marked as active and displayed differently in the HTML.
    pub fn new(active_endpoint: &str, lang: Lang) -> NavBar {
        let links = vec![
            Link {
                url: lang_href(endpoints::DASHBOARD_VIEW, lang),
                title: translate(lang, "nav.dashboard"),
                is_current: active_endpoint == endpoints::DASHBOARD_VIEW,
            },
            Link {
                url: lang_href(endpoints::CLIENTS_VIEW, lang),
                title: translate(lang, "nav.clients"),
                is_current: active_endpoint == endpoints::CLIENTS_VIEW,
            },
            Link {
                url: lang_href(endpoints::LOG_OUT, lang),
                title: translate(lang, "nav.log_out"),
                is_current: false,
            },
        ];

        NavBar { links }
    }

    /// Render the navigation bar.
    pub fn into_html(self) -> Markup {
        html! {
            nav
            {
                @for link in self.links {
                    (link.into_html())
                }
            }
        }
    }
}

#[cfg(test)]
mod navigation_tests {
    use scraper::{Html, Selector};

    use crate::{endpoints, translation::Lang};

    use super::NavBar;

    #[test]
    fn active_link_is_marked_current() {
        let markup = NavBar::new(endpoints::CLIENTS_VIEW, Lang::En).into_html();

        let html = Html::parse_fragment(&markup.into_string());
        let selector = Selector::parse("a.current").unwrap();
        let current: Vec<_> = html.select(&selector).collect();

        assert_eq!(current.len(), 1);
        assert_eq!(current[0].attr("href"), Some(endpoints::CLIENTS_VIEW));
    }

    #[test]
    fn arabic_nav_bar_uses_arabic_labels_and_keeps_the_language() {
        let markup = NavBar::new(endpoints::CLIENTS_VIEW, Lang::Ar).into_html();

        let html = Html::parse_fragment(&markup.into_string());
        let selector = Selector::parse("a.current").unwrap();
        let current = html.select(&selector).next().unwrap();

        assert_eq!(current.text().collect::<String>(), "العملاء");
        assert_eq!(current.attr("href"), Some("/clients?lang=ar"));
    }
}
