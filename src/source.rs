use crate::types::Stroke;
use std::collections::HashMap;
use std::sync::RwLock;

/// A notebook (or other page container) as seen by exports.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContainerInfo {
    pub title: String,
    pub page_ids: Vec<String>,
}

/// Read access to page data owned by the surrounding application.
///
/// `None` always means "unknown page/container"; implementations must not block on
/// network collaborators for longer than the caller is willing to wait.
pub trait PageSource: Send + Sync {
    fn strokes(&self, page_id: &str) -> Option<Vec<Stroke>>;

    fn page_owner_container(&self, page_id: &str) -> Option<String>;

    fn transcription_text(&self, page_id: &str) -> Option<String>;

    fn container(&self, _container_id: &str) -> Option<ContainerInfo> {
        None
    }
}

#[derive(Debug, Clone)]
struct MemoryPage {
    container_id: String,
    strokes: Vec<Stroke>,
    transcription: Option<String>,
}

#[derive(Debug, Default)]
struct MemoryState {
    pages: HashMap<String, MemoryPage>,
    containers: HashMap<String, ContainerInfo>,
}

/// Thread-safe in-memory [`PageSource`], for embedding and tests.
#[derive(Debug, Default)]
pub struct InMemoryPageSource {
    state: RwLock<MemoryState>,
}

impl InMemoryPageSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_container(&self, container_id: &str, title: &str) {
        if let Ok(mut state) = self.state.write() {
            let entry = state
                .containers
                .entry(container_id.to_string())
                .or_default();
            entry.title = title.to_string();
        }
    }

    /// Adds (or replaces) a page. New pages are appended to their container's page order;
    /// a page re-added under another container moves to the end of that container's order.
    pub fn add_page(&self, container_id: &str, page_id: &str, strokes: Vec<Stroke>) {
        if let Ok(mut state) = self.state.write() {
            let previous = state.pages.insert(
                page_id.to_string(),
                MemoryPage {
                    container_id: container_id.to_string(),
                    strokes,
                    transcription: None,
                },
            );
            match previous {
                Some(old) if old.container_id == container_id => return,
                Some(old) => {
                    if let Some(container) = state.containers.get_mut(&old.container_id) {
                        container.page_ids.retain(|id| id != page_id);
                    }
                }
                None => {}
            }
            state
                .containers
                .entry(container_id.to_string())
                .or_default()
                .page_ids
                .push(page_id.to_string());
        }
    }

    /// Returns false when the page is unknown.
    pub fn set_strokes(&self, page_id: &str, strokes: Vec<Stroke>) -> bool {
        match self.state.write() {
            Ok(mut state) => match state.pages.get_mut(page_id) {
                Some(page) => {
                    page.strokes = strokes;
                    true
                }
                None => false,
            },
            Err(_) => false,
        }
    }

    /// Returns false when the page is unknown.
    pub fn set_transcription(&self, page_id: &str, text: Option<&str>) -> bool {
        match self.state.write() {
            Ok(mut state) => match state.pages.get_mut(page_id) {
                Some(page) => {
                    page.transcription = text.map(str::to_string);
                    true
                }
                None => false,
            },
            Err(_) => false,
        }
    }

    pub fn remove_page(&self, page_id: &str) {
        if let Ok(mut state) = self.state.write() {
            if let Some(page) = state.pages.remove(page_id) {
                if let Some(container) = state.containers.get_mut(&page.container_id) {
                    container.page_ids.retain(|id| id != page_id);
                }
            }
        }
    }

    fn with_page<T>(&self, page_id: &str, f: impl FnOnce(&MemoryPage) -> Option<T>) -> Option<T> {
        let state = self.state.read().ok()?;
        state.pages.get(page_id).and_then(f)
    }
}

impl PageSource for InMemoryPageSource {
    fn strokes(&self, page_id: &str) -> Option<Vec<Stroke>> {
        self.with_page(page_id, |page| Some(page.strokes.clone()))
    }

    fn page_owner_container(&self, page_id: &str) -> Option<String> {
        self.with_page(page_id, |page| Some(page.container_id.clone()))
    }

    fn transcription_text(&self, page_id: &str) -> Option<String> {
        self.with_page(page_id, |page| page.transcription.clone())
    }

    fn container(&self, container_id: &str) -> Option<ContainerInfo> {
        let state = self.state.read().ok()?;
        state.containers.get(container_id).cloned()
    }
}
