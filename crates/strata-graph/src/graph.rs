//! Read-only entity graph with reference queries in both directions.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tracing::debug;

use crate::entity::{EntityRef, StepEntity};
use crate::error::{GraphError, Result};
use crate::p21::{parse_data_section, EntityInstance};

type RefList = SmallVec<[EntityRef; 4]>;

/// Query interface over a typed entity graph.
///
/// `sharings(id)` are the entities that reference `id`; `shareds(id)` are the
/// entities `id` references. Implementations are immutable for the duration
/// of an extraction.
pub trait EntityGraph {
    /// Every entity identity, in a stable order (file order for Part 21 input).
    fn entity_refs(&self) -> &[EntityRef];

    /// Fetch an entity by identity.
    fn entity(&self, id: EntityRef) -> Option<&StepEntity>;

    /// Entities that reference `id`.
    fn sharings(&self, id: EntityRef) -> &[EntityRef];

    /// Entities referenced by `id`.
    fn shareds(&self, id: EntityRef) -> &[EntityRef];

    /// Number of entities.
    fn len(&self) -> usize {
        self.entity_refs().len()
    }

    /// Whether the graph holds no entities.
    fn is_empty(&self) -> bool {
        self.entity_refs().is_empty()
    }
}

/// Entity graph built from Part 21 instances.
#[derive(Debug, Default)]
pub struct StepGraph {
    order: Vec<EntityRef>,
    entities: FxHashMap<EntityRef, StepEntity>,
    shareds: FxHashMap<EntityRef, RefList>,
    sharings: FxHashMap<EntityRef, RefList>,
}

impl StepGraph {
    /// Build a graph from raw instances. Instance numbers must be unique.
    pub fn new(instances: &[EntityInstance]) -> Result<Self> {
        let mut graph = Self {
            order: Vec::with_capacity(instances.len()),
            entities: FxHashMap::default(),
            shareds: FxHashMap::default(),
            sharings: FxHashMap::default(),
        };

        for instance in instances {
            let id = EntityRef(instance.id);
            if graph.entities.contains_key(&id) {
                return Err(GraphError::parse(format!("duplicate instance {}", id)));
            }
            graph.order.push(id);
            graph.entities.insert(id, StepEntity::from_instance(instance));

            let refs: RefList = instance.references().into_iter().map(EntityRef).collect();
            for target in &refs {
                graph.sharings.entry(*target).or_default().push(id);
            }
            graph.shareds.insert(id, refs);
        }

        debug!(
            entities = graph.order.len(),
            edges = graph.shareds.values().map(|r| r.len()).sum::<usize>(),
            "built entity graph"
        );

        Ok(graph)
    }

    /// Parse Part 21 text and build its graph.
    pub fn from_p21(text: &str) -> Result<Self> {
        let instances = parse_data_section(text)?;
        Self::new(&instances)
    }

    /// Parse Part 21 bytes. Non-UTF-8 bytes are replaced rather than rejected.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::from_p21(&String::from_utf8_lossy(data))
    }

    /// Iterate over entities in file order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityRef, &StepEntity)> + '_ {
        self.order
            .iter()
            .filter_map(move |id| self.entities.get(id).map(|e| (*id, e)))
    }
}

impl EntityGraph for StepGraph {
    fn entity_refs(&self) -> &[EntityRef] {
        &self.order
    }

    fn entity(&self, id: EntityRef) -> Option<&StepEntity> {
        self.entities.get(&id)
    }

    fn sharings(&self, id: EntityRef) -> &[EntityRef] {
        self.sharings.get(&id).map(|r| r.as_slice()).unwrap_or(&[])
    }

    fn shareds(&self, id: EntityRef) -> &[EntityRef] {
        self.shareds.get(&id).map(|r| r.as_slice()).unwrap_or(&[])
    }
}
