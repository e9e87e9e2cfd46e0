//! Sequence host - one child host per item of an array or keyed list.
//!
//! Static arrays mount once with positional keys. Reactive list
//! projections re-read their entries under a reaction and reconcile:
//! entries whose keys match at the leading or trailing edge keep their
//! hosts untouched; the middle is torn down and rebuilt. Duplicate keys
//! are reported and the later entry skipped.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use spark_signals::effect;
use tracing::{error, warn};

use crate::dom::{insert_before, DomError, Node};
use crate::host::{
    create_host, Host, HostRef, PathContext, Removal, StopHandle, Subscriptions,
};
use crate::value::{ListProjection, RenderValue};

struct ItemEntry {
    key: String,
    host: HostRef,
}

enum Source {
    Static(RefCell<Option<Vec<RenderValue>>>),
    List(ListProjection),
}

pub struct SequenceHost {
    source: Source,
    placeholder: Node,
    ctx: PathContext,
    items: Rc<RefCell<Vec<ItemEntry>>>,
    stop: RefCell<Option<StopHandle>>,
    destroyed: Cell<bool>,
}

fn dedup_keyed(entries: Vec<(String, RenderValue)>) -> Vec<(String, RenderValue)> {
    let mut seen: Vec<String> = Vec::new();
    let mut out = Vec::with_capacity(entries.len());
    for (key, value) in entries {
        if seen.iter().any(|k| k == &key) {
            warn!(key = %key, "duplicate list key, skipping entry");
            continue;
        }
        seen.push(key.clone());
        out.push((key, value));
    }
    out
}

fn mount_item(
    key: String,
    value: RenderValue,
    anchor: &Node,
    ctx: &PathContext,
) -> Result<ItemEntry, DomError> {
    let placeholder = Node::comment("item");
    insert_before(&placeholder, anchor)?;
    let host = create_host(value, placeholder, ctx.clone())?;
    host.render()?;
    Ok(ItemEntry { key, host })
}

fn unmount_item(entry: ItemEntry) -> Result<(), DomError> {
    // The item owns its whole range, its placeholder included.
    entry.host.destroy(Removal::Owns, Subscriptions::Owns)
}

fn reconcile(
    items: &Rc<RefCell<Vec<ItemEntry>>>,
    entries: Vec<(String, RenderValue)>,
    end: &Node,
    ctx: &PathContext,
) -> Result<(), DomError> {
    let entries = dedup_keyed(entries);
    let mut old: Vec<ItemEntry> = items.borrow_mut().drain(..).collect();

    let mut prefix = 0;
    while prefix < old.len() && prefix < entries.len() && old[prefix].key == entries[prefix].0 {
        prefix += 1;
    }
    let mut suffix = 0;
    while suffix < old.len() - prefix
        && suffix < entries.len() - prefix
        && old[old.len() - 1 - suffix].key == entries[entries.len() - 1 - suffix].0
    {
        suffix += 1;
    }

    let tail: Vec<ItemEntry> = old.split_off(old.len() - suffix);
    let head: Vec<ItemEntry> = old.drain(..prefix).collect();
    for stale in old {
        unmount_item(stale)?;
    }

    // New middle entries go right before the first retained tail item (or
    // the host's own placeholder when nothing is retained behind them).
    let anchor = tail
        .first()
        .map(|entry| entry.host.element())
        .unwrap_or_else(|| end.clone());
    let middle_len = entries.len() - prefix - suffix;
    let mut rebuilt = head;
    for (key, value) in entries.into_iter().skip(prefix).take(middle_len) {
        rebuilt.push(mount_item(key, value, &anchor, ctx)?);
    }
    rebuilt.extend(tail);
    *items.borrow_mut() = rebuilt;
    Ok(())
}

impl SequenceHost {
    pub fn from_static(values: Vec<RenderValue>, placeholder: Node, ctx: PathContext) -> Self {
        SequenceHost {
            source: Source::Static(RefCell::new(Some(values))),
            placeholder,
            ctx,
            items: Rc::new(RefCell::new(Vec::new())),
            stop: RefCell::new(None),
            destroyed: Cell::new(false),
        }
    }

    pub fn from_list(projection: ListProjection, placeholder: Node, ctx: PathContext) -> Self {
        SequenceHost {
            source: Source::List(projection),
            placeholder,
            ctx,
            items: Rc::new(RefCell::new(Vec::new())),
            stop: RefCell::new(None),
            destroyed: Cell::new(false),
        }
    }

    /// Number of live item hosts.
    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }
}

impl Host for SequenceHost {
    fn render(&self) -> Result<(), DomError> {
        match &self.source {
            Source::Static(values) => {
                let values = values.borrow_mut().take().expect("static sequence renders once");
                for (index, value) in values.into_iter().enumerate() {
                    let entry =
                        mount_item(index.to_string(), value, &self.placeholder, &self.ctx)?;
                    self.items.borrow_mut().push(entry);
                }
                Ok(())
            }
            Source::List(projection) => {
                let entries_fn = projection.entries.clone();
                let items = self.items.clone();
                let end = self.placeholder.clone();
                let ctx = self.ctx.clone();
                let stop = effect(move || {
                    let entries = entries_fn();
                    if let Err(err) = reconcile(&items, entries, &end, &ctx) {
                        error!(%err, "list reconciliation failed");
                    }
                });
                *self.stop.borrow_mut() = Some(Box::new(stop));
                Ok(())
            }
        }
    }

    fn destroy(&self, removal: Removal, subscriptions: Subscriptions) -> Result<(), DomError> {
        if self.destroyed.replace(true) {
            return Ok(());
        }
        if subscriptions == Subscriptions::Owns {
            if let Some(stop) = self.stop.borrow_mut().take() {
                stop();
            }
        }
        for entry in self.items.borrow_mut().drain(..) {
            entry.host.destroy(removal, Subscriptions::Owns)?;
        }
        if removal == Removal::Owns {
            self.placeholder.remove();
        }
        Ok(())
    }

    fn element(&self) -> Node {
        self.items
            .borrow()
            .first()
            .map(|entry| entry.host.element())
            .unwrap_or_else(|| self.placeholder.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::root::Root;
    use crate::value::rx_list;
    use spark_signals::signal;

    fn mounted(value: RenderValue) -> (Node, HostRef) {
        let container = Node::element("div");
        let root = Root::new(container.clone());
        let placeholder = Node::comment("slot");
        container.append_child(&placeholder).unwrap();
        let host = create_host(value, placeholder, PathContext::new(root)).unwrap();
        host.render().unwrap();
        (container, host)
    }

    fn keyed_list(items: spark_signals::Signal<Vec<i64>>) -> RenderValue {
        rx_list(
            move || items.get(),
            |_, item| item.to_string(),
            |item| RenderValue::from(*item),
        )
    }

    #[test]
    fn test_static_array_mounts_in_order() {
        let (container, _host) = mounted(RenderValue::Many(vec![
            "a".into(),
            "b".into(),
            "c".into(),
        ]));
        assert_eq!(container.text_content(), "abc");
    }

    #[test]
    fn test_push_and_pop() {
        let items = signal(vec![1i64, 2, 3]);
        let (container, _host) = mounted(keyed_list(items.clone()));
        assert_eq!(container.text_content(), "123");

        items.set(vec![1, 2, 3, 4, 5]);
        assert_eq!(container.text_content(), "12345");

        items.set(vec![1, 2, 3, 4]);
        assert_eq!(container.text_content(), "1234");
    }

    #[test]
    fn test_unshift_and_splice() {
        let items = signal(vec![1i64, 2, 3, 4]);
        let (container, _host) = mounted(keyed_list(items.clone()));

        items.set(vec![-1, 0, 1, 2, 3, 4]);
        assert_eq!(container.text_content(), "-101234");

        // Replace one middle entry with three new ones.
        items.set(vec![-1, 0, 9, 99, 999, 2, 3, 4]);
        assert_eq!(container.text_content(), "-10999999234");
    }

    #[test]
    fn test_clear_and_refill() {
        let items = signal(vec![1i64, 2]);
        let (container, _host) = mounted(keyed_list(items.clone()));
        items.set(vec![]);
        assert_eq!(container.text_content(), "");
        items.set(vec![7, 8]);
        assert_eq!(container.text_content(), "78");
    }

    #[test]
    fn test_duplicate_keys_skip_later_entry() {
        let items = signal(vec![1i64, 1, 2]);
        let container = Node::element("div");
        let root = Root::new(container.clone());
        let placeholder = Node::comment("slot");
        container.append_child(&placeholder).unwrap();
        let RenderValue::List(projection) = keyed_list(items.clone()) else {
            unreachable!()
        };
        let host = SequenceHost::from_list(projection, placeholder, PathContext::new(root));
        host.render().unwrap();

        assert_eq!(container.text_content(), "12");
        assert_eq!(host.len(), 2, "later duplicate dropped");
        assert!(!host.is_empty());

        items.set(vec![]);
        assert!(host.is_empty());
    }

    #[test]
    fn test_destroy_removes_items_and_stops_tracking() {
        let items = signal(vec![1i64, 2]);
        let (container, host) = mounted(keyed_list(items.clone()));

        host.destroy(Removal::Owns, Subscriptions::Owns).unwrap();
        assert_eq!(container.serialize(), "<div></div>");
        items.set(vec![3]);
        assert_eq!(container.serialize(), "<div></div>");
    }
}
