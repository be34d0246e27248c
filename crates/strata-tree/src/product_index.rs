//! Product discovery: every `PRODUCT` and the definition that stands for it
//! in assembly occurrences.

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use strata_graph::{EntityGraph, EntityRef, StepEntity};
use tracing::debug;

/// A product and its resolved definition chain.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductInfo {
    pub product: EntityRef,
    pub name: String,
    pub formation: Option<EntityRef>,
    pub definition: Option<EntityRef>,
}

impl ProductInfo {
    /// Products without a definition can never take part in an assembly.
    pub fn has_definition(&self) -> bool {
        self.definition.is_some()
    }
}

/// Products in file order, with a reverse definition -> product map.
#[derive(Debug, Clone, Default)]
pub struct ProductIndex {
    products: IndexMap<EntityRef, ProductInfo>,
    by_definition: FxHashMap<EntityRef, EntityRef>,
}

impl ProductIndex {
    /// Scan the graph once for products and resolve their definitions.
    pub fn build<G: EntityGraph + ?Sized>(graph: &G) -> Self {
        let mut index = Self::default();
        let mut resolver = DefinitionResolver::new(graph);

        for &id in graph.entity_refs() {
            let Some(StepEntity::Product(product)) = graph.entity(id) else {
                continue;
            };

            let formation = resolver.formation_of(id);
            let definition = formation.and_then(|f| resolver.definition_of(f));
            match definition {
                Some(d) => debug!(product = %id, definition = %d, "resolved product definition"),
                None => debug!(product = %id, "product has no definition"),
            }

            if let Some(d) = definition {
                index.by_definition.entry(d).or_insert(id);
            }
            index.products.insert(
                id,
                ProductInfo {
                    product: id,
                    name: product.name.clone(),
                    formation,
                    definition,
                },
            );
        }

        index
    }

    pub fn get(&self, product: EntityRef) -> Option<&ProductInfo> {
        self.products.get(&product)
    }

    pub fn contains(&self, product: EntityRef) -> bool {
        self.products.contains_key(&product)
    }

    /// The product a definition belongs to.
    pub fn product_for_definition(&self, definition: EntityRef) -> Option<EntityRef> {
        self.by_definition.get(&definition).copied()
    }

    /// Products in file order.
    pub fn products(&self) -> impl Iterator<Item = &ProductInfo> {
        self.products.values()
    }

    /// Product identities in file order.
    pub fn product_refs(&self) -> impl Iterator<Item = EntityRef> + '_ {
        self.products.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

/// Walks product -> formation -> definition through sharings.
struct DefinitionResolver<'a, G: ?Sized> {
    graph: &'a G,
    /// formation -> first definition in file order, built on first fallback
    scanned: Option<FxHashMap<EntityRef, EntityRef>>,
}

impl<'a, G: EntityGraph + ?Sized> DefinitionResolver<'a, G> {
    fn new(graph: &'a G) -> Self {
        Self {
            graph,
            scanned: None,
        }
    }

    fn formation_of(&self, product: EntityRef) -> Option<EntityRef> {
        self.graph.sharings(product).iter().copied().find(|&s| {
            matches!(
                self.graph.entity(s),
                Some(StepEntity::ProductDefinitionFormation(f)) if f.of_product == Some(product)
            )
        })
    }

    fn definition_of(&mut self, formation: EntityRef) -> Option<EntityRef> {
        let direct = self.graph.sharings(formation).iter().copied().find(|&s| {
            matches!(
                self.graph.entity(s),
                Some(StepEntity::ProductDefinition(pd)) if pd.formation == Some(formation)
            )
        });
        if direct.is_some() {
            return direct;
        }

        // Sharings can be incomplete; fall back to scanning every definition.
        let graph = self.graph;
        let scanned = self.scanned.get_or_insert_with(|| {
            let mut map = FxHashMap::default();
            for &id in graph.entity_refs() {
                if let Some(StepEntity::ProductDefinition(pd)) = graph.entity(id) {
                    if let Some(f) = pd.formation {
                        map.entry(f).or_insert(id);
                    }
                }
            }
            map
        });
        let found = scanned.get(&formation).copied();
        if let Some(d) = found {
            debug!(formation = %formation, definition = %d, "definition found by scan");
        }
        found
    }
}
