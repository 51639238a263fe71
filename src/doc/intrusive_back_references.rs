//! Checked pointers can model back references that the borrow checker cannot
//! express, such as a child pointing at the parent that owns it.
//!
//! # Parent pointers in a tree
//!
//! Each node owns its children and each child holds a [`CheckedPtr`] to its
//! parent. Nodes are boxed and pinned so their addresses are stable while
//! they are pointed at.
//!
//! The counter is declared last. Fields drop in declaration order, so the
//! children release their parent pointers before the parent's counter checks
//! that none remain.
//!
//! [`CheckedPtr`]: crate::CheckedPtr
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::pin::Pin;
//!
//! use checkedref::{CanMakeCheckedPtr, CheckedPtr, PtrCounter};
//!
//! struct Node {
//!     name: String,
//!     children: RefCell<Vec<Pin<Box<Node>>>>,
//!     parent: CheckedPtr<Node>,
//!     counter: PtrCounter,
//! }
//!
//! unsafe impl CanMakeCheckedPtr for Node {
//!     fn ptr_counter(&self) -> &PtrCounter {
//!         &self.counter
//!     }
//! }
//!
//! impl Node {
//!     fn new(name: &str, parent: Option<Pin<&Node>>) -> Pin<Box<Self>> {
//!         Box::pin(Self {
//!             name: name.to_owned(),
//!             children: RefCell::default(),
//!             parent: CheckedPtr::from(parent),
//!             counter: PtrCounter::new(),
//!         })
//!     }
//!
//!     fn add_child(self: Pin<&Self>, name: &str) {
//!         let child = Node::new(name, Some(self));
//!         self.children.borrow_mut().push(child);
//!     }
//!
//!     fn path(&self) -> String {
//!         match self.parent.get() {
//!             Some(parent) => format!("{}/{}", parent.path(), self.name),
//!             None => self.name.clone(),
//!         }
//!     }
//! }
//!
//! let root = Node::new("root", None);
//! root.as_ref().add_child("usr");
//! root.as_ref().add_child("etc");
//! {
//!     let children = root.children.borrow();
//!     children[0].as_ref().add_child("bin");
//! }
//! assert_eq!(root.counter.ptr_count(), 2);
//!
//! {
//!     let children = root.children.borrow();
//!     let grandchildren = children[0].children.borrow();
//!     assert_eq!(grandchildren[0].path(), "root/usr/bin");
//!     assert_eq!(children[1].path(), "root/etc");
//! }
//!
//! // Detaching a subtree releases its parent pointer.
//! let etc = root.children.borrow_mut().pop();
//! drop(etc);
//! assert_eq!(root.counter.ptr_count(), 1);
//! ```
//!
//! # Cursors into a container
//!
//! A cursor holding a [`CheckedRef`] must be moved off an element before the
//! container removes it. Forgetting to do so aborts at the removal rather than
//! leaving the cursor dangling.
//!
//! [`CheckedRef`]: crate::CheckedRef
//!
//! ```rust
//! use std::pin::Pin;
//!
//! use checkedref::{CanMakeCheckedPtr, CheckedRef, PtrCounter};
//!
//! struct Line {
//!     text: &'static str,
//!     counter: PtrCounter,
//! }
//!
//! unsafe impl CanMakeCheckedPtr for Line {
//!     fn ptr_counter(&self) -> &PtrCounter {
//!         &self.counter
//!     }
//! }
//!
//! let mut lines: Vec<Pin<Box<Line>>> = ["fn main() {", "}"]
//!     .into_iter()
//!     .map(|text| {
//!         Box::pin(Line {
//!             text,
//!             counter: PtrCounter::new(),
//!         })
//!     })
//!     .collect();
//!
//! let mut cursor: CheckedRef<Line> = CheckedRef::new(lines[1].as_ref());
//! assert_eq!(cursor.text, "}");
//!
//! cursor.set(lines[0].as_ref());
//! let removed = lines.pop();
//! drop(removed);
//! assert_eq!(cursor.text, "fn main() {");
//!
//! drop(cursor);
//! lines.clear();
//! ```
