//! Placement resolution: axis placements and item-defined transformations
//! to rigid transforms.

use glam::{DMat4, DVec3};

use crate::entity::{EntityRef, StepEntity};
use crate::graph::{EntityGraph, StepGraph};

/// Resolves placement entities into transforms.
///
/// Returns `None` whenever the entity is missing, of the wrong kind, or
/// degenerate; callers decide on the fallback.
pub trait PlacementResolver {
    /// Frame of an `AXIS2_PLACEMENT_3D`, as a local-to-parent transform.
    fn placement(&self, id: EntityRef) -> Option<DMat4>;

    /// Transform of an `ITEM_DEFINED_TRANSFORMATION`, mapping its source
    /// placement onto its target placement.
    fn relative_transform(&self, operator: EntityRef) -> Option<DMat4>;
}

impl StepGraph {
    /// Get a cartesian point by ID.
    pub fn point(&self, id: EntityRef) -> Option<DVec3> {
        match self.entity(id)? {
            StepEntity::CartesianPoint(p) => Some(p.coords),
            _ => None,
        }
    }

    /// Get a normalized direction by ID. Zero-length directions are rejected.
    pub fn direction(&self, id: EntityRef) -> Option<DVec3> {
        match self.entity(id)? {
            StepEntity::Direction(d) => d.ratios.try_normalize(),
            _ => None,
        }
    }
}

/// Build an orthonormal frame from an axis and an optional reference direction.
///
/// The reference direction is projected onto the plane normal to the axis;
/// when it is missing or parallel to the axis an arbitrary perpendicular is used.
pub fn frame_from_axes(origin: DVec3, axis: DVec3, ref_direction: Option<DVec3>) -> DMat4 {
    let z_axis = axis.try_normalize().unwrap_or(DVec3::Z);
    let project = |v: DVec3| (v - z_axis * z_axis.dot(v)).try_normalize();

    let x_axis = ref_direction
        .and_then(project)
        .or_else(|| {
            let arbitrary = if z_axis.x.abs() < 0.9 { DVec3::X } else { DVec3::Y };
            project(arbitrary)
        })
        .unwrap_or(DVec3::X);
    let y_axis = z_axis.cross(x_axis);

    DMat4::from_cols(
        x_axis.extend(0.0),
        y_axis.extend(0.0),
        z_axis.extend(0.0),
        origin.extend(1.0),
    )
}

impl PlacementResolver for StepGraph {
    fn placement(&self, id: EntityRef) -> Option<DMat4> {
        let placement = match self.entity(id)? {
            StepEntity::Axis2Placement3D(p) => p,
            _ => return None,
        };

        let origin = self.point(placement.location?)?;
        let axis = placement
            .axis
            .and_then(|a| self.direction(a))
            .unwrap_or(DVec3::Z);
        let ref_direction = placement.ref_direction.and_then(|r| self.direction(r));

        Some(frame_from_axes(origin, axis, ref_direction))
    }

    fn relative_transform(&self, operator: EntityRef) -> Option<DMat4> {
        let transform = match self.entity(operator)? {
            StepEntity::ItemDefinedTransformation(t) => t,
            _ => return None,
        };
        let source = self.placement(transform.transform_item_1?)?;
        let target = self.placement(transform.transform_item_2?)?;

        // Maps points from the source frame into the target frame.
        Some(target * source.inverse())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: DMat4, b: DMat4) -> bool {
        a.abs_diff_eq(b, 1e-9)
    }

    const PLACEMENTS: &str = r#"DATA;
#1=CARTESIAN_POINT('origin',(0.,0.,0.));
#2=DIRECTION('z',(0.,0.,1.));
#3=DIRECTION('x',(1.,0.,0.));
#4=AXIS2_PLACEMENT_3D('',#1,#2,#3);
#5=CARTESIAN_POINT('offset',(10.,20.,30.));
#6=DIRECTION('x rotated',(0.,1.,0.));
#7=AXIS2_PLACEMENT_3D('',#5,#2,#6);
#8=ITEM_DEFINED_TRANSFORMATION('','',#4,#7);
#9=AXIS2_PLACEMENT_3D('',#5,$,$);
#10=ITEM_DEFINED_TRANSFORMATION('','',#4,#99);
#11=DIRECTION('zero',(0.,0.,0.));
#12=AXIS2_PLACEMENT_3D('',#1,#11,#3);
ENDSEC;
"#;

    #[test]
    fn test_identity_placement() {
        let graph = StepGraph::from_p21(PLACEMENTS).unwrap();
        assert!(approx_eq(graph.placement(EntityRef(4)).unwrap(), DMat4::IDENTITY));
    }

    #[test]
    fn test_rotated_translated_placement() {
        let graph = StepGraph::from_p21(PLACEMENTS).unwrap();
        let m = graph.placement(EntityRef(7)).unwrap();
        let p = m.transform_point3(DVec3::X);
        assert!(p.abs_diff_eq(DVec3::new(10.0, 21.0, 30.0), 1e-9));
    }

    #[test]
    fn test_defaulted_axes() {
        let graph = StepGraph::from_p21(PLACEMENTS).unwrap();
        let m = graph.placement(EntityRef(9)).unwrap();
        assert!(approx_eq(m, DMat4::from_translation(DVec3::new(10.0, 20.0, 30.0))));
    }

    #[test]
    fn test_degenerate_axis_falls_back_to_z() {
        let graph = StepGraph::from_p21(PLACEMENTS).unwrap();
        assert!(approx_eq(graph.placement(EntityRef(12)).unwrap(), DMat4::IDENTITY));
    }

    #[test]
    fn test_relative_transform() {
        let graph = StepGraph::from_p21(PLACEMENTS).unwrap();
        let m = graph.relative_transform(EntityRef(8)).unwrap();
        let expected = graph.placement(EntityRef(7)).unwrap();
        assert!(approx_eq(m, expected));
    }

    #[test]
    fn test_missing_target_placement() {
        let graph = StepGraph::from_p21(PLACEMENTS).unwrap();
        assert!(graph.relative_transform(EntityRef(10)).is_none());
        assert!(graph.relative_transform(EntityRef(4)).is_none());
    }

    #[test]
    fn test_frame_is_orthonormal_with_skewed_reference() {
        let m = frame_from_axes(DVec3::ZERO, DVec3::Z, Some(DVec3::new(1.0, 0.0, 1.0)));
        let x = m.x_axis.truncate();
        let y = m.y_axis.truncate();
        let z = m.z_axis.truncate();
        assert!((x.length() - 1.0).abs() < 1e-12);
        assert!(x.dot(z).abs() < 1e-12);
        assert!(y.dot(z).abs() < 1e-12);
        assert!(x.abs_diff_eq(DVec3::X, 1e-12));
    }
}
