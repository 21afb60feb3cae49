// In-memory view tree - Headless ViewHandle implementation
use crate::application::view_handle::{ViewContent, ViewFactory, ViewHandle, ViewRole};
use crate::domain::widget::WidgetEvent;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::broadcast;

const NODE_ID_ATTR: &str = "data-node-id";
const EVENT_CHANNEL_CAPACITY: usize = 256;
/// Oldest events are dropped once the log holds this many
const EVENT_LOG_CAPACITY: usize = 1024;

/// Node id recorded for parents that are not part of this tree
const FOREIGN_PARENT: u64 = 0;

struct NodeEntry {
    role: ViewRole,
    node: Weak<MemoryView>,
}

/// Live nodes only: a node removes itself and its parent link when dropped
#[derive(Default)]
struct Document {
    nodes: HashMap<u64, NodeEntry>,
    parents: HashMap<u64, u64>,
    events: VecDeque<WidgetEvent>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct NodeState {
    content: Option<ViewContent>,
    attributes: BTreeMap<String, String>,
    classes: BTreeSet<String>,
    detach_count: usize,
}

/// A node in the in-memory tree.
///
/// Records everything pushed to it so hosts and tests can inspect it.
pub struct MemoryView {
    node_id: u64,
    document: Arc<Mutex<Document>>,
    events_tx: broadcast::Sender<WidgetEvent>,
    state: Mutex<NodeState>,
}

impl MemoryView {
    pub fn node_id(&self) -> u64 {
        self.node_id
    }

    pub fn content(&self) -> Option<ViewContent> {
        lock(&self.state).content.clone()
    }

    pub fn attributes(&self) -> BTreeMap<String, String> {
        lock(&self.state).attributes.clone()
    }

    pub fn detach_count(&self) -> usize {
        lock(&self.state).detach_count
    }

    pub fn is_attached(&self) -> bool {
        lock(&self.document).parents.contains_key(&self.node_id)
    }

    /// First attached descendant with the given role, in creation order
    fn descendant(&self, role: &str) -> Option<Arc<MemoryView>> {
        // Upgrade outside the lock: a dropped last reference re-enters it
        let candidate = {
            let document = lock(&self.document);
            document
                .nodes
                .iter()
                .filter(|(_, entry)| entry.role.as_str() == role)
                .filter(|(id, _)| is_descendant(&document.parents, **id, self.node_id))
                .min_by_key(|(id, _)| **id)
                .map(|(_, entry)| entry.node.clone())
        };
        candidate?.upgrade()
    }
}

impl Drop for MemoryView {
    fn drop(&mut self) {
        let mut document = lock(&self.document);
        document.nodes.remove(&self.node_id);
        document.parents.remove(&self.node_id);
    }
}

fn is_descendant(parents: &HashMap<u64, u64>, node: u64, ancestor: u64) -> bool {
    let mut current = node;
    while let Some(&parent) = parents.get(&current) {
        if parent == ancestor {
            return true;
        }
        current = parent;
    }
    false
}

impl ViewHandle for MemoryView {
    fn attach(&self, parent: &dyn ViewHandle) {
        let parent_id = parent
            .attribute(NODE_ID_ATTR)
            .and_then(|id| id.parse().ok())
            .unwrap_or(FOREIGN_PARENT);
        lock(&self.document).parents.insert(self.node_id, parent_id);
    }

    fn detach(&self) {
        let was_attached = lock(&self.document).parents.remove(&self.node_id).is_some();
        if was_attached {
            lock(&self.state).detach_count += 1;
        }
    }

    fn set_content(&self, content: ViewContent) {
        lock(&self.state).content = Some(content);
    }

    fn set_attribute(&self, name: &str, value: &str) {
        lock(&self.state)
            .attributes
            .insert(name.to_string(), value.to_string());
    }

    fn attribute(&self, name: &str) -> Option<String> {
        if name == NODE_ID_ATTR {
            return Some(self.node_id.to_string());
        }
        lock(&self.state).attributes.get(name).cloned()
    }

    fn toggle_class(&self, name: &str, on: bool) {
        let mut state = lock(&self.state);
        if on {
            state.classes.insert(name.to_string());
        } else {
            state.classes.remove(name);
        }
    }

    fn has_class(&self, name: &str) -> bool {
        lock(&self.state).classes.contains(name)
    }

    fn query(&self, selector: &str) -> Option<Arc<dyn ViewHandle>> {
        self.descendant(selector)
            .map(|node| node as Arc<dyn ViewHandle>)
    }

    fn dispatch(&self, event: WidgetEvent) {
        {
            let mut document = lock(&self.document);
            if document.events.len() == EVENT_LOG_CAPACITY {
                document.events.pop_front();
            }
            document.events.push_back(event.clone());
        }
        // no subscribers is fine
        let _ = self.events_tx.send(event);
    }
}

/// Creates [`MemoryView`] nodes sharing one document and event log
pub struct MemoryViewFactory {
    document: Arc<Mutex<Document>>,
    events_tx: broadcast::Sender<WidgetEvent>,
    next_id: AtomicU64,
}

impl Default for MemoryViewFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryViewFactory {
    pub fn new() -> Self {
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            document: Arc::new(Mutex::new(Document::default())),
            events_tx,
            next_id: AtomicU64::new(FOREIGN_PARENT + 1),
        }
    }

    pub fn create_node(&self, role: ViewRole) -> Arc<MemoryView> {
        let node = Arc::new(MemoryView {
            node_id: self.next_id.fetch_add(1, Ordering::Relaxed),
            document: self.document.clone(),
            events_tx: self.events_tx.clone(),
            state: Mutex::new(NodeState::default()),
        });
        lock(&self.document).nodes.insert(
            node.node_id,
            NodeEntry {
                role,
                node: Arc::downgrade(&node),
            },
        );
        node
    }

    /// Live stream of every event dispatched through this factory's nodes
    pub fn subscribe(&self) -> broadcast::Receiver<WidgetEvent> {
        self.events_tx.subscribe()
    }

    /// Recently dispatched events, oldest first
    pub fn events(&self) -> Vec<WidgetEvent> {
        lock(&self.document).events.iter().cloned().collect()
    }

    /// Drain the event log
    pub fn take_events(&self) -> Vec<WidgetEvent> {
        lock(&self.document).events.drain(..).collect()
    }

    /// Resolve a handle created by this factory back to its node
    pub fn find_root(&self, handle: &dyn ViewHandle) -> Option<Arc<MemoryView>> {
        let node_id: u64 = handle.attribute(NODE_ID_ATTR)?.parse().ok()?;
        let node = lock(&self.document).nodes.get(&node_id)?.node.clone();
        node.upgrade()
    }

    /// First attached descendant of `root` with the given role
    pub fn find(&self, root: &dyn ViewHandle, role: ViewRole) -> Option<Arc<MemoryView>> {
        self.find_root(root)?.descendant(role.as_str())
    }
}

impl ViewFactory for MemoryViewFactory {
    fn create(&self, role: ViewRole) -> Arc<dyn ViewHandle> {
        self.create_node(role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::widget::{Widget, WidgetConfig};
    use crate::domain::render::RenderedBody;
    use crate::domain::widget::{WidgetEventKind, WidgetType};

    #[test]
    fn test_attach_query_detach() {
        let views = MemoryViewFactory::new();
        let root = views.create_node(ViewRole::Widget);
        let header = views.create_node(ViewRole::Header);
        let title = views.create_node(ViewRole::Title);
        header.attach(root.as_ref());
        title.attach(header.as_ref());
        title.set_content(ViewContent::Text("Revenue".to_string()));

        let found = root.query("title").unwrap();
        assert_eq!(found.attribute(NODE_ID_ATTR), Some(title.node_id().to_string()));

        header.detach();
        header.detach();
        assert_eq!(header.detach_count(), 1);
        assert!(root.query("title").is_none());
    }

    #[test]
    fn test_attributes_and_classes() {
        let views = MemoryViewFactory::new();
        let node = views.create_node(ViewRole::Body);
        node.set_attribute("data-phase", "ready");
        node.toggle_class("collapsed", true);
        assert!(node.has_class("collapsed"));
        node.toggle_class("collapsed", false);
        assert!(!node.has_class("collapsed"));
        assert_eq!(node.attributes().get("data-phase").map(String::as_str), Some("ready"));

        node.set_content(ViewContent::Body(RenderedBody::Empty));
        assert_eq!(node.content(), Some(ViewContent::Body(RenderedBody::Empty)));
    }

    #[tokio::test]
    async fn test_dispatch_records_and_broadcasts() {
        let views = MemoryViewFactory::new();
        let mut rx = views.subscribe();
        let node = views.create_node(ViewRole::Widget);

        let event = WidgetEvent {
            widget_id: Some("widget-1".to_string()),
            kind: WidgetEventKind::Collapse { collapsed: true },
        };
        node.dispatch(event.clone());

        assert_eq!(views.events(), vec![event.clone()]);
        assert_eq!(rx.recv().await.unwrap(), event);
    }

    #[test]
    fn test_destroyed_widgets_release_their_nodes() {
        let views = MemoryViewFactory::new();
        let grid = views.create_node(ViewRole::Grid);

        for _ in 0..100 {
            let widget = Widget::new(WidgetConfig::new(WidgetType::Card, "Temp"), &views);
            widget.view().attach(grid.as_ref());
            widget.destroy();
        }

        let document = lock(&views.document);
        assert_eq!(document.nodes.len(), 1);
        assert!(document.parents.is_empty());
    }

    #[test]
    fn test_event_log_is_bounded_and_drains() {
        let views = MemoryViewFactory::new();
        let node = views.create_node(ViewRole::Widget);
        for i in 0..EVENT_LOG_CAPACITY + 10 {
            node.dispatch(WidgetEvent {
                widget_id: Some(format!("widget-{i}")),
                kind: WidgetEventKind::Collapse { collapsed: true },
            });
        }

        let events = views.take_events();
        assert_eq!(events.len(), EVENT_LOG_CAPACITY);
        assert_eq!(events[0].widget_id.as_deref(), Some("widget-10"));
        assert!(views.events().is_empty());
    }
}
