//! Typed STEP entities.
//!
//! Raw instances are classified once, when the graph is built. Everything
//! downstream matches on [`StepEntity`] instead of re-testing type names.

use std::fmt;

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::p21::{EntityInstance, StepValue};

/// Stable identity of one entity in the graph: the `#id` of its instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityRef(pub u64);

impl EntityRef {
    /// The raw instance number.
    pub fn index(self) -> u64 {
        self.0
    }
}

impl From<u64> for EntityRef {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A classified STEP entity.
#[derive(Debug, Clone, PartialEq)]
pub enum StepEntity {
    // Product structure
    Product(Product),
    ProductDefinitionFormation(ProductDefinitionFormation),
    ProductDefinition(ProductDefinition),
    ProductDefinitionShape(ProductDefinitionShape),
    NextAssemblyUsageOccurrence(NextAssemblyUsageOccurrence),

    // Representation
    ShapeDefinitionRepresentation(ShapeDefinitionRepresentation),
    ShapeRepresentation(ShapeRepresentation),
    ContextDependentShapeRepresentation(ContextDependentShapeRepresentation),
    RepresentationRelationship(RepresentationRelationship),
    ItemDefinedTransformation(ItemDefinedTransformation),

    // Placement
    Axis2Placement3D(Axis2Placement3D),
    CartesianPoint(CartesianPoint),
    Direction(Direction),

    // Geometry of interest
    SolidModel(SolidModel),

    /// Anything the assembly walk does not need to look inside.
    Other { type_name: String },
}

// ============================================================================
// Product Structure Entities
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub id: EntityRef,
    pub product_id: String,
    pub name: String,
    pub description: String,
    pub frame_of_reference: Vec<EntityRef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductDefinitionFormation {
    pub id: EntityRef,
    pub formation_id: String,
    pub description: String,
    pub of_product: Option<EntityRef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductDefinition {
    pub id: EntityRef,
    pub name: String,
    pub description: String,
    pub formation: Option<EntityRef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductDefinitionShape {
    pub id: EntityRef,
    pub name: String,
    pub description: String,
    /// A product definition, or an assembly occurrence for placed instances.
    pub definition: Option<EntityRef>,
}

/// Edge entity: `relating` uses `related` as a component.
#[derive(Debug, Clone, PartialEq)]
pub struct NextAssemblyUsageOccurrence {
    pub id: EntityRef,
    pub occurrence_id: String,
    pub name: String,
    pub relating_product_definition: Option<EntityRef>,
    pub related_product_definition: Option<EntityRef>,
    pub reference_designator: Option<String>,
}

// ============================================================================
// Representation Entities
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ShapeDefinitionRepresentation {
    pub id: EntityRef,
    pub definition: Option<EntityRef>,
    pub used_representation: Option<EntityRef>,
}

/// Subtype of a shape representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeRepresentationKind {
    Plain,
    AdvancedBrep,
    FacetedBrep,
    ManifoldSurface,
    GeometricallyBoundedSurface,
    GeometricallyBoundedWireframe,
    Tessellated,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShapeRepresentation {
    pub id: EntityRef,
    pub kind: ShapeRepresentationKind,
    pub name: String,
    pub items: Vec<EntityRef>,
    pub context: Option<EntityRef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContextDependentShapeRepresentation {
    pub id: EntityRef,
    pub representation_relation: Option<EntityRef>,
    pub represented_product_relation: Option<EntityRef>,
}

/// `REPRESENTATION_RELATIONSHIP` and its shape subtype, optionally
/// combined with `REPRESENTATION_RELATIONSHIP_WITH_TRANSFORMATION`.
#[derive(Debug, Clone, PartialEq)]
pub struct RepresentationRelationship {
    pub id: EntityRef,
    pub name: String,
    pub rep_1: Option<EntityRef>,
    pub rep_2: Option<EntityRef>,
    pub transformation_operator: Option<EntityRef>,
}

impl RepresentationRelationship {
    /// Whether the relationship crosses into another coordinate context.
    pub fn has_transformation(&self) -> bool {
        self.transformation_operator.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemDefinedTransformation {
    pub id: EntityRef,
    pub name: String,
    /// Placement in the source context.
    pub transform_item_1: Option<EntityRef>,
    /// Placement in the target context.
    pub transform_item_2: Option<EntityRef>,
}

// ============================================================================
// Placement Entities
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Axis2Placement3D {
    pub id: EntityRef,
    pub name: String,
    pub location: Option<EntityRef>,
    pub axis: Option<EntityRef>,
    pub ref_direction: Option<EntityRef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CartesianPoint {
    pub id: EntityRef,
    pub name: String,
    pub coords: DVec3,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Direction {
    pub id: EntityRef,
    pub name: String,
    pub ratios: DVec3,
}

// ============================================================================
// Solid Models
// ============================================================================

/// Concrete subtype of `SOLID_MODEL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SolidModelKind {
    ManifoldSolidBrep,
    FacetedBrep,
    BrepWithVoids,
    ExtrudedAreaSolid,
    RevolvedAreaSolid,
    SweptDiskSolid,
    CsgSolid,
    SolidReplica,
}

impl SolidModelKind {
    fn from_type_name(type_name: &str) -> Option<Self> {
        let kind = match type_name {
            "MANIFOLD_SOLID_BREP" => Self::ManifoldSolidBrep,
            "FACETED_BREP" => Self::FacetedBrep,
            "BREP_WITH_VOIDS" => Self::BrepWithVoids,
            "EXTRUDED_AREA_SOLID" => Self::ExtrudedAreaSolid,
            "REVOLVED_AREA_SOLID" => Self::RevolvedAreaSolid,
            "SWEPT_DISK_SOLID" => Self::SweptDiskSolid,
            "CSG_SOLID" => Self::CsgSolid,
            "SOLID_REPLICA" => Self::SolidReplica,
            _ => return None,
        };
        Some(kind)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolidModel {
    pub id: EntityRef,
    pub kind: SolidModelKind,
    pub name: String,
}

// ============================================================================
// Value Extraction Helpers
// ============================================================================

/// Extract a string from a StepValue.
pub fn extract_string(value: &StepValue) -> String {
    match value {
        StepValue::String(s) => s.clone(),
        _ => String::new(),
    }
}

/// Extract a real from a StepValue.
pub fn extract_real(value: &StepValue) -> f64 {
    match value {
        StepValue::Real(r) => *r,
        StepValue::Integer(i) => *i as f64,
        StepValue::Typed { value, .. } => extract_real(value),
        _ => 0.0,
    }
}

/// Extract a reference from a StepValue.
pub fn extract_ref(value: &StepValue) -> Option<EntityRef> {
    match value {
        StepValue::Reference(r) => Some(EntityRef(*r)),
        _ => None,
    }
}

/// Extract a list of references from a StepValue.
pub fn extract_ref_list(value: &StepValue) -> Vec<EntityRef> {
    match value {
        StepValue::List(items) => items.iter().filter_map(extract_ref).collect(),
        _ => Vec::new(),
    }
}

/// Extract coordinates from a list StepValue. Missing components are zero.
pub fn extract_coords(value: &StepValue) -> DVec3 {
    match value {
        StepValue::List(items) => DVec3::new(
            items.first().map(extract_real).unwrap_or(0.0),
            items.get(1).map(extract_real).unwrap_or(0.0),
            items.get(2).map(extract_real).unwrap_or(0.0),
        ),
        _ => DVec3::ZERO,
    }
}

fn string_at(params: &[StepValue], index: usize) -> String {
    params.get(index).map(extract_string).unwrap_or_default()
}

fn ref_at(params: &[StepValue], index: usize) -> Option<EntityRef> {
    params.get(index).and_then(extract_ref)
}

fn refs_at(params: &[StepValue], index: usize) -> Vec<EntityRef> {
    params.get(index).map(extract_ref_list).unwrap_or_default()
}

fn shape_representation_kind(type_name: &str) -> Option<ShapeRepresentationKind> {
    let kind = match type_name {
        "SHAPE_REPRESENTATION" => ShapeRepresentationKind::Plain,
        "ADVANCED_BREP_SHAPE_REPRESENTATION" => ShapeRepresentationKind::AdvancedBrep,
        "FACETED_BREP_SHAPE_REPRESENTATION" => ShapeRepresentationKind::FacetedBrep,
        "MANIFOLD_SURFACE_SHAPE_REPRESENTATION" => ShapeRepresentationKind::ManifoldSurface,
        "GEOMETRICALLY_BOUNDED_SURFACE_SHAPE_REPRESENTATION" => {
            ShapeRepresentationKind::GeometricallyBoundedSurface
        }
        "GEOMETRICALLY_BOUNDED_WIREFRAME_SHAPE_REPRESENTATION" => {
            ShapeRepresentationKind::GeometricallyBoundedWireframe
        }
        "TESSELLATED_SHAPE_REPRESENTATION" => ShapeRepresentationKind::Tessellated,
        _ => return None,
    };
    Some(kind)
}

// ============================================================================
// Entity Conversion
// ============================================================================

impl StepEntity {
    /// Classify a raw instance.
    pub fn from_instance(instance: &EntityInstance) -> Self {
        let params = instance.params.as_slice();
        let id = EntityRef(instance.id);

        // Complex relationship instances flatten to (name, description, rep_1, rep_2, operator).
        if instance.has_type("REPRESENTATION_RELATIONSHIP")
            || instance.has_type("SHAPE_REPRESENTATION_RELATIONSHIP")
        {
            let transformation_operator =
                if instance.has_type("REPRESENTATION_RELATIONSHIP_WITH_TRANSFORMATION") {
                    ref_at(params, 4)
                } else {
                    None
                };
            return StepEntity::RepresentationRelationship(RepresentationRelationship {
                id,
                name: string_at(params, 0),
                rep_1: ref_at(params, 2),
                rep_2: ref_at(params, 3),
                transformation_operator,
            });
        }

        if let Some(kind) = instance
            .type_names
            .iter()
            .find_map(|t| SolidModelKind::from_type_name(t))
        {
            return StepEntity::SolidModel(SolidModel {
                id,
                kind,
                name: string_at(params, 0),
            });
        }

        if let Some(kind) = shape_representation_kind(&instance.type_name) {
            return StepEntity::ShapeRepresentation(ShapeRepresentation {
                id,
                kind,
                name: string_at(params, 0),
                items: refs_at(params, 1),
                context: ref_at(params, 2),
            });
        }

        match instance.type_name.as_str() {
            "PRODUCT" => StepEntity::Product(Product {
                id,
                product_id: string_at(params, 0),
                name: string_at(params, 1),
                description: string_at(params, 2),
                frame_of_reference: refs_at(params, 3),
            }),
            "PRODUCT_DEFINITION_FORMATION"
            | "PRODUCT_DEFINITION_FORMATION_WITH_SPECIFIED_SOURCE" => {
                StepEntity::ProductDefinitionFormation(ProductDefinitionFormation {
                    id,
                    formation_id: string_at(params, 0),
                    description: string_at(params, 1),
                    of_product: ref_at(params, 2),
                })
            }
            "PRODUCT_DEFINITION" | "PRODUCT_DEFINITION_WITH_ASSOCIATED_DOCUMENTS" => {
                StepEntity::ProductDefinition(ProductDefinition {
                    id,
                    name: string_at(params, 0),
                    description: string_at(params, 1),
                    formation: ref_at(params, 2),
                })
            }
            "PRODUCT_DEFINITION_SHAPE" => StepEntity::ProductDefinitionShape(ProductDefinitionShape {
                id,
                name: string_at(params, 0),
                description: string_at(params, 1),
                definition: ref_at(params, 2),
            }),
            "NEXT_ASSEMBLY_USAGE_OCCURRENCE" => {
                // (id, name, description, relating, related, reference_designator)
                let reference_designator = match params.get(5) {
                    Some(StepValue::String(s)) => Some(s.clone()),
                    _ => None,
                };
                StepEntity::NextAssemblyUsageOccurrence(NextAssemblyUsageOccurrence {
                    id,
                    occurrence_id: string_at(params, 0),
                    name: string_at(params, 1),
                    relating_product_definition: ref_at(params, 3),
                    related_product_definition: ref_at(params, 4),
                    reference_designator,
                })
            }
            "SHAPE_DEFINITION_REPRESENTATION" => {
                StepEntity::ShapeDefinitionRepresentation(ShapeDefinitionRepresentation {
                    id,
                    definition: ref_at(params, 0),
                    used_representation: ref_at(params, 1),
                })
            }
            "CONTEXT_DEPENDENT_SHAPE_REPRESENTATION" => {
                StepEntity::ContextDependentShapeRepresentation(ContextDependentShapeRepresentation {
                    id,
                    representation_relation: ref_at(params, 0),
                    represented_product_relation: ref_at(params, 1),
                })
            }
            "ITEM_DEFINED_TRANSFORMATION" => {
                StepEntity::ItemDefinedTransformation(ItemDefinedTransformation {
                    id,
                    name: string_at(params, 0),
                    transform_item_1: ref_at(params, 2),
                    transform_item_2: ref_at(params, 3),
                })
            }
            "AXIS2_PLACEMENT_3D" => StepEntity::Axis2Placement3D(Axis2Placement3D {
                id,
                name: string_at(params, 0),
                location: ref_at(params, 1),
                axis: ref_at(params, 2),
                ref_direction: ref_at(params, 3),
            }),
            "CARTESIAN_POINT" => StepEntity::CartesianPoint(CartesianPoint {
                id,
                name: string_at(params, 0),
                coords: params.get(1).map(extract_coords).unwrap_or(DVec3::ZERO),
            }),
            "DIRECTION" => StepEntity::Direction(Direction {
                id,
                name: string_at(params, 0),
                ratios: params.get(1).map(extract_coords).unwrap_or(DVec3::Z),
            }),
            _ => StepEntity::Other {
                type_name: instance.type_name.clone(),
            },
        }
    }

    /// The STEP type this entity was classified from (primary type for complex instances).
    pub fn type_label(&self) -> &str {
        match self {
            StepEntity::Product(_) => "PRODUCT",
            StepEntity::ProductDefinitionFormation(_) => "PRODUCT_DEFINITION_FORMATION",
            StepEntity::ProductDefinition(_) => "PRODUCT_DEFINITION",
            StepEntity::ProductDefinitionShape(_) => "PRODUCT_DEFINITION_SHAPE",
            StepEntity::NextAssemblyUsageOccurrence(_) => "NEXT_ASSEMBLY_USAGE_OCCURRENCE",
            StepEntity::ShapeDefinitionRepresentation(_) => "SHAPE_DEFINITION_REPRESENTATION",
            StepEntity::ShapeRepresentation(_) => "SHAPE_REPRESENTATION",
            StepEntity::ContextDependentShapeRepresentation(_) => {
                "CONTEXT_DEPENDENT_SHAPE_REPRESENTATION"
            }
            StepEntity::RepresentationRelationship(_) => "REPRESENTATION_RELATIONSHIP",
            StepEntity::ItemDefinedTransformation(_) => "ITEM_DEFINED_TRANSFORMATION",
            StepEntity::Axis2Placement3D(_) => "AXIS2_PLACEMENT_3D",
            StepEntity::CartesianPoint(_) => "CARTESIAN_POINT",
            StepEntity::Direction(_) => "DIRECTION",
            StepEntity::SolidModel(_) => "SOLID_MODEL",
            StepEntity::Other { type_name } => type_name,
        }
    }

    pub fn is_product(&self) -> bool {
        matches!(self, StepEntity::Product(_))
    }

    pub fn is_solid_model(&self) -> bool {
        matches!(self, StepEntity::SolidModel(_))
    }

    pub fn is_shape_representation(&self) -> bool {
        matches!(self, StepEntity::ShapeRepresentation(_))
    }

    pub fn as_product(&self) -> Option<&Product> {
        match self {
            StepEntity::Product(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_product_definition(&self) -> Option<&ProductDefinition> {
        match self {
            StepEntity::ProductDefinition(pd) => Some(pd),
            _ => None,
        }
    }

    pub fn as_occurrence(&self) -> Option<&NextAssemblyUsageOccurrence> {
        match self {
            StepEntity::NextAssemblyUsageOccurrence(o) => Some(o),
            _ => None,
        }
    }

    /// Human-readable name, when the entity kind carries one.
    pub fn name(&self) -> Option<&str> {
        let name = match self {
            StepEntity::Product(p) => &p.name,
            StepEntity::ProductDefinition(pd) => &pd.name,
            StepEntity::ProductDefinitionShape(pds) => &pds.name,
            StepEntity::NextAssemblyUsageOccurrence(o) => &o.name,
            StepEntity::ShapeRepresentation(r) => &r.name,
            StepEntity::RepresentationRelationship(r) => &r.name,
            StepEntity::ItemDefinedTransformation(t) => &t.name,
            StepEntity::Axis2Placement3D(a) => &a.name,
            StepEntity::CartesianPoint(p) => &p.name,
            StepEntity::Direction(d) => &d.name,
            StepEntity::SolidModel(s) => &s.name,
            _ => return None,
        };
        Some(name.as_str())
    }
}
