//! Part 21 fixture builder for tests.
//!
//! Emits the entity chains a CAD exporter writes for parts and assemblies:
//! `PRODUCT <- FORMATION <- DEFINITION <- SHAPE <- SDR -> SHAPE_REPRESENTATION`
//! per part, and `NAUO <- PDS <- CDSR -> RRWT -> ITEM_DEFINED_TRANSFORMATION`
//! per placed occurrence.

use std::collections::BTreeMap;

use glam::DVec3;
use strata_graph::{EntityRef, StepGraph};

const APPLICATION_CONTEXT: u64 = 1;
const PRODUCT_CONTEXT: u64 = 2;
const DEFINITION_CONTEXT: u64 = 3;
const REPRESENTATION_CONTEXT: u64 = 4;
const Z_DIRECTION: u64 = 6;
const X_DIRECTION: u64 = 7;
const ORIGIN_PLACEMENT: u64 = 8;

/// Entity identities of one fixture part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Part {
    pub product: EntityRef,
    pub formation: EntityRef,
    pub definition: EntityRef,
    pub shape: EntityRef,
}

#[derive(Debug)]
enum Record {
    Line(String),
    /// Representation whose item list can still grow.
    Representation { type_name: String, items: Vec<u64> },
}

#[derive(Debug)]
pub(crate) struct StepFixture {
    records: BTreeMap<u64, Record>,
    next_id: u64,
}

impl StepFixture {
    pub fn new() -> Self {
        let mut fixture = Self {
            records: BTreeMap::new(),
            next_id: 1,
        };
        fixture.raw("APPLICATION_CONTEXT('core data for automotive mechanical design processes')");
        fixture.raw(&format!("PRODUCT_CONTEXT('',#{},'mechanical')", APPLICATION_CONTEXT));
        fixture.raw(&format!(
            "PRODUCT_DEFINITION_CONTEXT('part definition',#{},'design')",
            APPLICATION_CONTEXT
        ));
        fixture.raw("REPRESENTATION_CONTEXT('','3D')");
        fixture.raw("CARTESIAN_POINT('',(0.,0.,0.))");
        fixture.raw("DIRECTION('',(0.,0.,1.))");
        fixture.raw("DIRECTION('',(1.,0.,0.))");
        fixture.raw(&format!("AXIS2_PLACEMENT_3D('',#5,#{},#{})", Z_DIRECTION, X_DIRECTION));
        fixture
    }

    /// Add an arbitrary entity body, e.g. `CLOSED_SHELL('',())`.
    pub fn raw(&mut self, body: &str) -> EntityRef {
        let id = self.allocate();
        self.records.insert(id, Record::Line(body.to_string()));
        EntityRef(id)
    }

    /// A product with its formation, definition, and an empty shape.
    pub fn product(&mut self, name: &str) -> Part {
        let product = self.raw(&format!(
            "PRODUCT('{}','{}','',(#{}))",
            name, name, PRODUCT_CONTEXT
        ));
        let formation = self.raw(&format!("PRODUCT_DEFINITION_FORMATION('','',{})", product));
        let definition = self.raw(&format!(
            "PRODUCT_DEFINITION('design','',{},#{})",
            formation, DEFINITION_CONTEXT
        ));
        let definition_shape = self.raw(&format!("PRODUCT_DEFINITION_SHAPE('','',{})", definition));
        let shape = self.representation("SHAPE_REPRESENTATION", vec![ORIGIN_PLACEMENT]);
        self.raw(&format!("SHAPE_DEFINITION_REPRESENTATION({},{})", definition_shape, shape));

        Part {
            product,
            formation,
            definition,
            shape,
        }
    }

    /// A bare product with no formation or definition.
    pub fn lone_product(&mut self, name: &str) -> EntityRef {
        self.raw(&format!("PRODUCT('{}','{}','',(#{}))", name, name, PRODUCT_CONTEXT))
    }

    /// An unattached solid.
    pub fn solid(&mut self, name: &str) -> EntityRef {
        let shell = self.raw("CLOSED_SHELL('',())");
        self.raw(&format!("MANIFOLD_SOLID_BREP('{}',{})", name, shell))
    }

    /// A solid listed directly in the part's shape representation.
    pub fn attach_solid(&mut self, part: &Part, name: &str) -> EntityRef {
        let solid = self.solid(name);
        self.add_items(part.shape, &[solid]);
        solid
    }

    /// Append items to a representation created by this fixture.
    pub fn add_items(&mut self, representation: EntityRef, new_items: &[EntityRef]) {
        if let Some(Record::Representation { items, .. }) = self.records.get_mut(&representation.0) {
            items.extend(new_items.iter().map(|r| r.0));
        }
    }

    /// A B-rep representation holding `solids`, related to the part's shape
    /// without a transformation.
    pub fn brep_representation(&mut self, part: &Part, solids: &[EntityRef]) -> EntityRef {
        let items = std::iter::once(ORIGIN_PLACEMENT)
            .chain(solids.iter().map(|s| s.0))
            .collect();
        let brep = self.representation("ADVANCED_BREP_SHAPE_REPRESENTATION", items);
        self.raw(&format!(
            "SHAPE_REPRESENTATION_RELATIONSHIP('','',{},{})",
            part.shape, brep
        ));
        brep
    }

    /// An occurrence of `child` in `parent` with no placement data.
    pub fn occurrence(&mut self, parent: &Part, child: &Part) -> EntityRef {
        let n = self.next_id;
        self.raw(&format!(
            "NEXT_ASSEMBLY_USAGE_OCCURRENCE('{}','occurrence {}','',{},{},$)",
            n, n, parent.definition, child.definition
        ))
    }

    /// An occurrence of `child` in `parent`, translated by `offset`.
    pub fn placed_occurrence(&mut self, parent: &Part, child: &Part, offset: DVec3) -> EntityRef {
        self.rotated_occurrence(parent, child, offset, DVec3::X)
    }

    /// An occurrence placed at `offset` with its X axis along `x_axis`
    /// (rotation about Z).
    pub fn rotated_occurrence(
        &mut self,
        parent: &Part,
        child: &Part,
        offset: DVec3,
        x_axis: DVec3,
    ) -> EntityRef {
        let occurrence = self.occurrence(parent, child);
        let location = self.raw(&format!(
            "CARTESIAN_POINT('',({:.6},{:.6},{:.6}))",
            offset.x, offset.y, offset.z
        ));
        let reference = self.raw(&format!(
            "DIRECTION('',({:.6},{:.6},{:.6}))",
            x_axis.x, x_axis.y, x_axis.z
        ));
        let placement = self.raw(&format!(
            "AXIS2_PLACEMENT_3D('',{},#{},{})",
            location, Z_DIRECTION, reference
        ));
        let operator = self.raw(&format!(
            "ITEM_DEFINED_TRANSFORMATION('','',#{},{})",
            ORIGIN_PLACEMENT, placement
        ));
        let relationship = self.raw(&format!(
            "( REPRESENTATION_RELATIONSHIP('','',{},{}) \
             REPRESENTATION_RELATIONSHIP_WITH_TRANSFORMATION({}) \
             SHAPE_REPRESENTATION_RELATIONSHIP() )",
            child.shape, parent.shape, operator
        ));
        let definition_shape = self.raw(&format!("PRODUCT_DEFINITION_SHAPE('','',{})", occurrence));
        self.raw(&format!(
            "CONTEXT_DEPENDENT_SHAPE_REPRESENTATION({},{})",
            relationship, definition_shape
        ));
        occurrence
    }

    /// Render the Part 21 file.
    pub fn text(&self) -> String {
        let mut out = String::from(
            "ISO-10303-21;\nHEADER;\nFILE_DESCRIPTION(('fixture'),'2;1');\nENDSEC;\nDATA;\n",
        );
        for (id, record) in &self.records {
            match record {
                Record::Line(body) => out.push_str(&format!("#{}={};\n", id, body)),
                Record::Representation { type_name, items } => {
                    let items: Vec<String> = items.iter().map(|i| format!("#{}", i)).collect();
                    out.push_str(&format!(
                        "#{}={}('',({}),#{});\n",
                        id,
                        type_name,
                        items.join(","),
                        REPRESENTATION_CONTEXT
                    ));
                }
            }
        }
        out.push_str("ENDSEC;\nEND-ISO-10303-21;\n");
        out
    }

    pub fn graph(&self) -> StepGraph {
        StepGraph::from_p21(&self.text()).expect("fixture should parse")
    }

    fn representation(&mut self, type_name: &str, items: Vec<u64>) -> EntityRef {
        let id = self.allocate();
        self.records.insert(
            id,
            Record::Representation {
                type_name: type_name.to_string(),
                items,
            },
        );
        EntityRef(id)
    }

    fn allocate(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}
