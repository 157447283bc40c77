//! Read operations on the registry graph.

use std::collections::BTreeMap;

use lds_core::{Node, PropertyValue, Uri};

use crate::store::{GraphError, GraphStore, Result};

impl GraphStore {
    // ── Lookups ──────────────────────────────────────────────────

    /// Resolve a URI to the concrete URIs known under it.
    ///
    /// The exact match always comes first. A URI without a resource segment
    /// is followed by every resource registered below it.
    pub fn lookup_uri(&self, uri: &Uri) -> Result<Vec<Uri>> {
        self.read(|tree| {
            let entry = tree.get(uri).ok_or_else(|| GraphError::not_found(uri))?;
            let mut uris = vec![uri.clone()];
            if uri.resource().is_none() {
                entry.collect_resources(&mut uris);
            }
            Ok(uris)
        })
    }

    /// The node at `uri` with descendants up to `depth` levels.
    ///
    /// `depth < 0` returns the whole subtree, `0` the node alone.
    pub fn find_node(&self, uri: &Uri, depth: i32) -> Result<Node> {
        let depth = usize::try_from(depth).ok();
        self.read(|tree| {
            tree.get(uri)
                .map(|entry| entry.to_node(depth))
                .ok_or_else(|| GraphError::not_found(uri))
        })
    }

    /// The requested properties of the node at `uri`. Names the node does
    /// not carry are left out.
    pub fn find_node_properties(
        &self,
        uri: &Uri,
        names: &[String],
    ) -> Result<BTreeMap<String, PropertyValue>> {
        self.read(|tree| {
            let entry = tree.get(uri).ok_or_else(|| GraphError::not_found(uri))?;
            Ok(names
                .iter()
                .filter_map(|name| {
                    entry
                        .properties
                        .get(name)
                        .map(|value| (name.clone(), value.clone()))
                })
                .collect())
        })
    }

    // ── Whole-Graph ──────────────────────────────────────────────

    /// Serialize the whole graph. The output is a pure function of the graph
    /// contents, so exporting an imported export reproduces it exactly.
    pub fn export(&self) -> Result<String> {
        self.read(|tree| Ok(serde_json::to_string_pretty(&tree.root.to_node(None))?))
    }

    /// The URI of the root authority.
    pub fn authority(&self) -> Result<Uri> {
        self.read(|tree| Ok(tree.authority().clone()))
    }

    pub fn node_count(&self) -> Result<usize> {
        self.read(|tree| Ok(tree.node_count()))
    }

    pub fn contains(&self, uri: &Uri) -> Result<bool> {
        self.read(|tree| Ok(tree.contains(uri)))
    }
}

#[cfg(test)]
mod tests {
    use lds_core::{NodeType, Ttl};

    use super::*;

    fn uri(s: &str) -> Uri {
        Uri::parse(s).unwrap()
    }

    fn cabin_climate() -> GraphStore {
        let store = GraphStore::new();
        store.init("vcu.vin").unwrap();
        let entity = Node::new(uri("vcu.vin/body.cabin_climate"), NodeType::Entity)
            .with_property("message", "Hello")
            .with_property("year", 2024)
            .with_property("enabled", true)
            .with_child(Node::new(uri("vcu.vin/body.cabin_climate/1"), NodeType::Version))
            .with_child(Node::new(uri("vcu.vin/body.cabin_climate/2"), NodeType::Version))
            .with_child(
                Node::new(uri("vcu.vin/body.cabin_climate/3"), NodeType::Version).with_child(
                    Node::new(
                        uri("vcu.vin/body.cabin_climate/3/door.front_left"),
                        NodeType::Resource,
                    ),
                ),
            );
        store.update_node(entity, Ttl::Unchanged).unwrap();
        store
    }

    #[test]
    fn lookup_entity_returns_itself_and_its_resources() {
        let store = cabin_climate();
        let uris = store.lookup_uri(&uri("vcu.vin/body.cabin_climate")).unwrap();
        let uris: Vec<_> = uris.iter().map(Uri::to_string).collect();
        assert_eq!(
            uris,
            [
                "//vcu.vin/body.cabin_climate",
                "//vcu.vin/body.cabin_climate/3/door.front_left",
            ]
        );
    }

    #[test]
    fn lookup_version_includes_its_resources() {
        let store = cabin_climate();
        let version = uri("vcu.vin/body.cabin_climate/3");
        assert_eq!(
            store.lookup_uri(&version).unwrap(),
            vec![
                version.clone(),
                uri("vcu.vin/body.cabin_climate/3/door.front_left")
            ]
        );

        let bare = uri("vcu.vin/body.cabin_climate/1");
        assert_eq!(store.lookup_uri(&bare).unwrap(), vec![bare]);
    }

    #[test]
    fn lookup_explicit_resource_returns_itself() {
        let store = cabin_climate();
        let exact = uri("vcu.vin/body.cabin_climate/3/door.front_left");
        assert_eq!(store.lookup_uri(&exact).unwrap(), vec![exact]);
    }

    #[test]
    fn lookup_unknown_is_not_found() {
        let store = cabin_climate();
        let err = store.lookup_uri(&uri("vcu.vin/body.unknown")).unwrap_err();
        assert!(matches!(err, GraphError::NotFound { .. }));
    }

    #[test]
    fn find_node_respects_depth() {
        let store = cabin_climate();
        let root = store.find_node(&uri("vcu.vin"), 0).unwrap();
        assert!(root.children.is_empty());

        let full = store.find_node(&uri("vcu.vin"), -1).unwrap();
        assert_eq!(full.subtree_len(), 6);

        let two = store.find_node(&uri("vcu.vin"), 2).unwrap();
        assert_eq!(two.subtree_len(), 5);
    }

    #[test]
    fn find_properties_omits_unknown_names() {
        let store = cabin_climate();
        let names = vec!["message".to_string(), "missing".to_string()];
        let props = store
            .find_node_properties(&uri("vcu.vin/body.cabin_climate"), &names)
            .unwrap();
        assert_eq!(props.len(), 1);
        assert_eq!(props["message"], PropertyValue::from("Hello"));
    }

    #[test]
    fn find_properties_of_absent_node_is_not_found() {
        let store = cabin_climate();
        let err = store.find_node_properties(&uri("vcu.vin/x"), &[]).unwrap_err();
        assert_eq!(err.code(), lds_core::UCode::NotFound);
    }
}
