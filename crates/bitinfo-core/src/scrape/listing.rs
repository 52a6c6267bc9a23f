//! Course pages on the learning platform: file links, activity instances and
//! section links, used to enumerate a course's file tree.

use scraper::{ElementRef, Html};
use tracing::warn;

use super::cell_text;
use crate::api::ApiError;

/// Label the platform hides next to folder activities
const FOLDER_LABEL: &str = "文件夹";
/// Label the platform hides next to file activities
const FILE_LABEL: &str = "文件";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceKind {
    Folder,
    File,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLink {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    pub kind: InstanceKind,
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoursePage {
    /// Page heading, the course title on a course's front page
    pub heading: Option<String>,
    /// Direct file links (folder contents, resource pages)
    pub files: Vec<PageLink>,
    pub instances: Vec<Instance>,
    /// Links to per-section pages when the course shows one section at a time
    pub sections: Vec<PageLink>,
}

/// Parse a course, section or folder page.
///
/// Activity instances are taken from the most specific content container
/// present (`.single-section`, then `.topics`), falling back to a page-wide
/// scan only when neither exists. A page with none of the known markers is
/// an unrecognized shape and is reported as malformed.
pub fn parse_course_page(html: &str) -> Result<CoursePage, ApiError> {
    let doc = Html::parse_document(html);
    let root = doc.root_element();

    let files: Vec<PageLink> = root
        .select(selector!(".fp-filename"))
        .filter_map(|name| {
            let parent = name.parent().and_then(ElementRef::wrap)?;
            let url = parent.value().attr("href")?;
            Some(PageLink {
                name: cell_text(&name),
                url: url.to_string(),
            })
        })
        .collect();

    let container = root
        .select(selector!(".single-section"))
        .next()
        .or_else(|| root.select(selector!(".topics")).next());
    let scope = container.unwrap_or(root);
    let instance_names: Vec<ElementRef> = scope.select(selector!(".instancename")).collect();

    let instances = instance_names.iter().filter_map(parse_instance).collect();

    let sections: Vec<PageLink> = root
        .select(selector!(".section-title a"))
        .filter_map(|a| {
            Some(PageLink {
                name: cell_text(&a),
                url: a.value().attr("href")?.to_string(),
            })
        })
        .collect();

    let recognized = container.is_some()
        || !instance_names.is_empty()
        || !files.is_empty()
        || !sections.is_empty()
        || root.select(selector!("#region-main")).next().is_some();
    if !recognized {
        warn!("Course page matches none of the known layouts");
        return Err(ApiError::malformed(
            "course page",
            "no content container, activity, file or section found",
        ));
    }

    let heading = root
        .select(selector!("h1"))
        .next()
        .map(|h| cell_text(&h))
        .filter(|h| !h.is_empty());

    Ok(CoursePage {
        heading,
        files,
        instances,
        sections,
    })
}

fn parse_instance(name: &ElementRef) -> Option<Instance> {
    let label = name.select(selector!(".accesshide")).next()?;
    let kind = match cell_text(&label).as_str() {
        FOLDER_LABEL => InstanceKind::Folder,
        FILE_LABEL => InstanceKind::File,
        _ => return None,
    };
    let link = name.parent().and_then(ElementRef::wrap)?;
    let url = link.value().attr("href")?;

    Some(Instance {
        kind,
        name: visible_text(name).trim().to_string(),
        url: url.to_string(),
    })
}

/// Text of an element, minus the screen-reader-only `.accesshide` labels
fn visible_text(el: &ElementRef) -> String {
    let mut out = String::new();
    for child in el.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child_el) = ElementRef::wrap(child) {
            if !child_el.value().classes().any(|c| c == "accesshide") {
                out.push_str(&visible_text(&child_el));
            }
        }
    }
    out
}
