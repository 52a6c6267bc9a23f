//! Extraction of typed rows from portal responses.
//!
//! HTML parsing is synchronous and returns owned data, so parsed documents
//! never live across a network await. Layouts are matched by position and
//! class names of the live pages; when the expected shape is missing the
//! parsers report `MalformedResponse` rather than an empty result.

/// Compile a CSS selector once per call site.
macro_rules! selector {
    ($css:literal) => {{
        static SELECTOR: std::sync::LazyLock<scraper::Selector> = std::sync::LazyLock::new(|| {
            scraper::Selector::parse($css).expect("Invalid CSS selector")
        });
        &*SELECTOR
    }};
}

pub mod listing;
pub mod login;
pub mod portal;
pub mod scores;

pub use listing::{parse_course_page, CoursePage, InstanceKind, PageLink};
pub use login::{parse_login_form, LoginForm};
pub use scores::{parse_score_detail, parse_score_list};

use scraper::ElementRef;

/// Element text with surrounding whitespace and `&nbsp;` padding removed
pub(crate) fn cell_text(el: &ElementRef) -> String {
    el.text()
        .collect::<String>()
        .replace('\u{a0}', " ")
        .trim()
        .to_string()
}
