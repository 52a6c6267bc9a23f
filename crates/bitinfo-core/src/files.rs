//! Course file enumeration on the learning platform.
//!
//! Folders and section pages are walked breadth-first from the course front
//! page. Each page is fetched at most once, so a section page linking back
//! to its siblings does not loop.

use std::collections::{HashSet, VecDeque};

use tracing::{debug, info};

use crate::api::{endpoints, ApiError, Realm, Request, Transport};
use crate::auth::Session;
use crate::models::CourseFile;
use crate::scrape::{parse_course_page, CoursePage, InstanceKind};

/// Path component from a display name
fn dir_component(name: &str) -> String {
    name.trim().replace(['/', '\\'], "_")
}

fn join_dir(parent: &str, name: &str) -> String {
    let name = dir_component(name);
    if parent.is_empty() {
        name
    } else {
        format!("{}/{}", parent, name)
    }
}

/// Record the page's files and queue the pages it leads to
fn collect(
    page: CoursePage,
    dir: &str,
    queue: &mut VecDeque<(String, String)>,
    files: &mut Vec<CourseFile>,
) {
    for link in page.files {
        files.push(CourseFile {
            dir: dir.to_string(),
            name: link.name,
            url: link.url,
        });
    }
    for instance in page.instances {
        match instance.kind {
            InstanceKind::File => files.push(CourseFile {
                dir: dir.to_string(),
                name: instance.name,
                url: instance.url,
            }),
            InstanceKind::Folder => queue.push_back((instance.url, join_dir(dir, &instance.name))),
        }
    }
    for section in page.sections {
        queue.push_back((section.url, join_dir(dir, &section.name)));
    }
}

impl<T: Transport> Session<T> {
    /// Every file reachable from a course's front page, with its directory
    /// rooted at the course title. Nothing is downloaded.
    pub async fn course_files(&mut self, course_id: &str) -> Result<Vec<CourseFile>, ApiError> {
        self.ensure_identity().await?;

        let root_url = endpoints::course_view_url(course_id);
        let mut visited = HashSet::from([root_url.clone()]);
        let mut files = Vec::new();
        let mut queue = VecDeque::new();

        let root = self.fetch(Realm::Identity, Request::get(root_url.as_str())).await?;
        let page = parse_course_page(&root.body)?;
        let root_dir = dir_component(page.heading.as_deref().unwrap_or(course_id));
        collect(page, &root_dir, &mut queue, &mut files);

        while let Some((url, dir)) = queue.pop_front() {
            if !visited.insert(url.clone()) {
                debug!(%url, "Page already visited");
                continue;
            }
            let response = self.fetch(Realm::Identity, Request::get(url.as_str())).await?;
            let page = parse_course_page(&response.body)?;
            debug!(%url, %dir, files = page.files.len(), instances = page.instances.len(), "Course page parsed");
            collect(page, &dir, &mut queue, &mut files);
        }

        info!(course_id, pages = visited.len(), files = files.len(), "Course files enumerated");
        Ok(files)
    }
}
