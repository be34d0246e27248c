//! Local transforms of assembly occurrences.
//!
//! The placement of an occurrence is not stored on the occurrence itself.
//! It is reached through the shape of the occurrence:
//!
//! ```text
//! NAUO <- PRODUCT_DEFINITION_SHAPE <- CONTEXT_DEPENDENT_SHAPE_REPRESENTATION
//!                                          |
//!                                          v
//!                          REPRESENTATION_RELATIONSHIP_WITH_TRANSFORMATION
//!                                          |
//!                                          v
//!                               ITEM_DEFINED_TRANSFORMATION
//! ```

use glam::DMat4;
use strata_graph::{EntityGraph, EntityRef, PlacementResolver, StepEntity};
use tracing::debug;

/// Find the transformation operator that places `occurrence`.
pub fn occurrence_operator<G: EntityGraph + ?Sized>(
    graph: &G,
    occurrence: EntityRef,
) -> Option<EntityRef> {
    let shapes = graph.sharings(occurrence).iter().copied().filter(|&s| {
        matches!(
            graph.entity(s),
            Some(StepEntity::ProductDefinitionShape(pds)) if pds.definition == Some(occurrence)
        )
    });

    for shape in shapes {
        for &user in graph.sharings(shape) {
            let Some(StepEntity::ContextDependentShapeRepresentation(cdsr)) = graph.entity(user) else {
                continue;
            };
            if cdsr.represented_product_relation != Some(shape) {
                continue;
            }
            let operator = cdsr
                .representation_relation
                .and_then(|r| match graph.entity(r) {
                    Some(StepEntity::RepresentationRelationship(rel)) => rel.transformation_operator,
                    _ => None,
                });
            if operator.is_some() {
                return operator;
            }
        }
    }
    None
}

/// Transform of a child relative to its parent, for the edge carried by
/// `occurrence`. Missing or degenerate placement data yields identity.
pub fn local_transform<G>(graph: &G, occurrence: Option<EntityRef>) -> DMat4
where
    G: EntityGraph + PlacementResolver + ?Sized,
{
    let Some(occurrence) = occurrence else {
        return DMat4::IDENTITY;
    };

    let resolved = occurrence_operator(graph, occurrence)
        .and_then(|op| graph.relative_transform(op))
        .filter(|m| m.is_finite());

    match resolved {
        Some(m) => m,
        None => {
            debug!(occurrence = %occurrence, "no placement for occurrence, using identity");
            DMat4::IDENTITY
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StepFixture;
    use glam::DVec3;

    #[test]
    fn test_translated_occurrence() {
        let mut fixture = StepFixture::new();
        let a = fixture.product("A");
        let b = fixture.product("B");
        let ab = fixture.placed_occurrence(&a, &b, DVec3::new(10.0, 0.0, 5.0));
        let graph = fixture.graph();

        assert!(occurrence_operator(&graph, ab).is_some());
        let m = local_transform(&graph, Some(ab));
        assert!(m.abs_diff_eq(DMat4::from_translation(DVec3::new(10.0, 0.0, 5.0)), 1e-9));
    }

    #[test]
    fn test_rotated_occurrence() {
        let mut fixture = StepFixture::new();
        let a = fixture.product("A");
        let b = fixture.product("B");
        let ab = fixture.rotated_occurrence(&a, &b, DVec3::ZERO, DVec3::Y);
        let graph = fixture.graph();

        let m = local_transform(&graph, Some(ab));
        assert!(m.transform_vector3(DVec3::X).abs_diff_eq(DVec3::Y, 1e-9));
        assert!(m.transform_vector3(DVec3::Y).abs_diff_eq(-DVec3::X, 1e-9));
    }

    #[test]
    fn test_occurrence_without_placement_is_identity() {
        let mut fixture = StepFixture::new();
        let a = fixture.product("A");
        let b = fixture.product("B");
        let ab = fixture.occurrence(&a, &b);
        let graph = fixture.graph();

        assert_eq!(occurrence_operator(&graph, ab), None);
        assert_eq!(local_transform(&graph, Some(ab)), DMat4::IDENTITY);
        assert_eq!(local_transform(&graph, None), DMat4::IDENTITY);
    }

    #[test]
    fn test_dangling_operator_is_identity() {
        let mut fixture = StepFixture::new();
        let a = fixture.product("A");
        let b = fixture.product("B");
        let ab = fixture.occurrence(&a, &b);
        let relationship = fixture.raw(&format!(
            "( REPRESENTATION_RELATIONSHIP('','',{},{}) \
             REPRESENTATION_RELATIONSHIP_WITH_TRANSFORMATION(#9999) \
             SHAPE_REPRESENTATION_RELATIONSHIP() )",
            b.shape, a.shape
        ));
        let shape = fixture.raw(&format!("PRODUCT_DEFINITION_SHAPE('','',{})", ab));
        fixture.raw(&format!("CONTEXT_DEPENDENT_SHAPE_REPRESENTATION({},{})", relationship, shape));
        let graph = fixture.graph();

        assert_eq!(occurrence_operator(&graph, ab), Some(EntityRef(9999)));
        assert_eq!(local_transform(&graph, Some(ab)), DMat4::IDENTITY);
    }
}
