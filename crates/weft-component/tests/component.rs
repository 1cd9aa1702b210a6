//! Tests for component addressing on whole pages.

use proptest::prelude::*;
use weft_component::{ComponentTree, FormField, FormState, Page, PathLookup, ROOT};
use weft_model::ComponentId;

/// Build a tree from (parent index, is_form) pairs; parent indices are taken
/// modulo the number of nodes created so far.
fn build(page: &mut Page, shape: &[(usize, bool)]) -> Vec<ComponentId> {
    let mut ids = vec![ROOT];
    for (n, (parent, is_form)) in shape.iter().enumerate() {
        let parent = ids[parent % ids.len()];
        let name = format!("c{n}");
        let id = if *is_form {
            page.tree.add(parent, &name, FormState::new())
        } else {
            page.tree.add(parent, &name, FormField::text())
        };
        // Fields cannot have children in markup, but the tree does not care.
        ids.push(id.expect("unique ids"));
    }
    ids
}

proptest! {
    #[test]
    fn path_stability(shape in proptest::collection::vec((0usize..32, any::<bool>()), 1..24)) {
        let mut page = Page::new("Shape");
        let ids = build(&mut page, &shape);
        page.advance_rendering();

        let paths: Vec<_> = ids[1..]
            .iter()
            .map(|id| page.tree.path_of(*id).expect("attached"))
            .collect();
        for (id, path) in ids[1..].iter().zip(&paths) {
            prop_assert_eq!(page.find(path), PathLookup::Found(*id));
        }

        // A render that changes nothing keeps every path pointing at the same node.
        page.advance_rendering();
        for (id, path) in ids[1..].iter().zip(&paths) {
            prop_assert_eq!(page.find(path), PathLookup::Found(*id));
        }
    }
}

#[test]
fn hidden_component_is_distinct_from_missing() {
    let mut tree = ComponentTree::new();
    let form = tree.add(ROOT, "form", FormState::new()).unwrap();
    let field = tree.add(form, "secret", FormField::text()).unwrap();
    tree.set_visible(field, false).unwrap();

    let secret = weft_model::ComponentPath::parse("form.secret").unwrap();
    let missing = weft_model::ComponentPath::parse("form.other").unwrap();
    assert_eq!(tree.lookup(&secret), PathLookup::NotVisible(field));
    assert_eq!(tree.lookup(&missing), PathLookup::NotFound);
}

#[test]
fn cloned_pages_keep_independent_trees() {
    let mut page = Page::new("Home");
    let panel = page.tree.add_container(ROOT, "panel").unwrap();
    let copy = page.clone();
    page.tree.detach(panel).unwrap();

    let path = weft_model::ComponentPath::parse("panel").unwrap();
    assert_eq!(page.find(&path), PathLookup::NotFound);
    assert_eq!(copy.find(&path), PathLookup::Found(panel));
}
