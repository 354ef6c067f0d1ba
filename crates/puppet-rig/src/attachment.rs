//! Slot attachments: textured quads, triangle meshes and clipping polygons

use glam::{Affine2, Vec2};
use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::skeleton::Skeleton;

/// Triangle list for the four corners of a region, in corner order
/// bottom-left, upper-left, upper-right, bottom-right.
pub const QUAD_TRIANGLES: [u16; 6] = [0, 1, 2, 2, 3, 0];

/// Reference to a packed region inside a texture atlas page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtlasRegion {
    /// Atlas page (texture file) name, e.g. `skeleton.png`
    pub page: String,
    /// Region name inside the page
    pub name: String,
}

/// The content a slot shows for the current skin and pose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Attachment {
    Region(RegionAttachment),
    Mesh(MeshAttachment),
    Clipping(ClippingAttachment),
}

impl Attachment {
    pub fn name(&self) -> &str {
        match self {
            Self::Region(a) => &a.name,
            Self::Mesh(a) => &a.name,
            Self::Clipping(a) => &a.name,
        }
    }

    /// Atlas region for renderable attachments; clipping polygons have none.
    pub fn region(&self) -> Option<&AtlasRegion> {
        match self {
            Self::Region(a) => a.region.as_ref(),
            Self::Mesh(a) => a.region.as_ref(),
            Self::Clipping(_) => None,
        }
    }

    pub fn path(&self) -> Option<&str> {
        match self {
            Self::Region(a) => a.path.as_deref(),
            Self::Mesh(a) => a.path.as_deref(),
            Self::Clipping(_) => None,
        }
    }

    pub fn is_clipping(&self) -> bool {
        matches!(self, Self::Clipping(_))
    }

    /// Attachment-level tint (white for clipping polygons).
    pub fn color(&self) -> Color {
        match self {
            Self::Region(a) => a.color,
            Self::Mesh(a) => a.color,
            Self::Clipping(_) => Color::WHITE,
        }
    }
}

fn one() -> f32 {
    1.0
}

fn full_quad_uvs() -> [Vec2; 4] {
    [
        Vec2::new(0.0, 1.0),
        Vec2::new(0.0, 0.0),
        Vec2::new(1.0, 0.0),
        Vec2::new(1.0, 1.0),
    ]
}

/// A textured quad placed relative to the slot's bone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionAttachment {
    pub name: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub region: Option<AtlasRegion>,
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    /// Rotation in degrees
    #[serde(default)]
    pub rotation: f32,
    #[serde(default = "one")]
    pub scale_x: f32,
    #[serde(default = "one")]
    pub scale_y: f32,
    pub width: f32,
    pub height: f32,
    /// UVs in corner order (BL, UL, UR, BR)
    #[serde(default = "full_quad_uvs")]
    pub uvs: [Vec2; 4],
    #[serde(default)]
    pub color: Color,
}

impl RegionAttachment {
    /// Corners in the bone's local space.
    pub fn local_corners(&self) -> [Vec2; 4] {
        let half_w = self.width * 0.5 * self.scale_x;
        let half_h = self.height * 0.5 * self.scale_y;
        let local = Affine2::from_angle_translation(
            self.rotation.to_radians(),
            Vec2::new(self.x, self.y),
        );
        [
            local.transform_point2(Vec2::new(-half_w, -half_h)),
            local.transform_point2(Vec2::new(-half_w, half_h)),
            local.transform_point2(Vec2::new(half_w, half_h)),
            local.transform_point2(Vec2::new(half_w, -half_h)),
        ]
    }

    /// Write the four world-space corners into `out` (cleared first).
    pub fn compute_world_vertices(&self, bone_world: &Affine2, out: &mut Vec<Vec2>) {
        out.clear();
        out.extend(
            self.local_corners()
                .iter()
                .map(|p| bone_world.transform_point2(*p)),
        );
    }
}

/// One bone's contribution to a weighted mesh vertex.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoneInfluence {
    /// Index into the skeleton's bone list
    pub bone: usize,
    /// Vertex position in that bone's local space
    pub x: f32,
    pub y: f32,
    pub weight: f32,
}

/// Vertex positions of a mesh or clipping polygon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VertexData {
    /// Positions local to the slot's bone
    Local(Vec<Vec2>),
    /// Per-vertex bind weights over arbitrary bones
    Weighted(Vec<Vec<BoneInfluence>>),
}

impl VertexData {
    pub fn vertex_count(&self) -> usize {
        match self {
            Self::Local(v) => v.len(),
            Self::Weighted(v) => v.len(),
        }
    }

    pub fn bone_indices(&self) -> impl Iterator<Item = usize> + '_ {
        let weighted: &[Vec<BoneInfluence>] = match self {
            Self::Local(_) => &[],
            Self::Weighted(v) => v,
        };
        weighted.iter().flatten().map(|influence| influence.bone)
    }

    /// Transform into world space. Local vertices follow the slot's bone;
    /// weighted vertices blend every influencing bone's world transform.
    pub fn compute_world_vertices(
        &self,
        skeleton: &Skeleton,
        slot_bone: usize,
        out: &mut Vec<Vec2>,
    ) {
        out.clear();
        match self {
            Self::Local(points) => {
                let world = skeleton.bone_world(slot_bone);
                out.extend(points.iter().map(|p| world.transform_point2(*p)));
            }
            Self::Weighted(vertices) => {
                out.extend(vertices.iter().map(|influences| {
                    influences.iter().fold(Vec2::ZERO, |acc, inf| {
                        let world = skeleton.bone_world(inf.bone);
                        acc + world.transform_point2(Vec2::new(inf.x, inf.y)) * inf.weight
                    })
                }));
            }
        }
    }
}

/// An arbitrary triangle mesh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshAttachment {
    pub name: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub region: Option<AtlasRegion>,
    pub vertices: VertexData,
    pub uvs: Vec<Vec2>,
    pub triangles: Vec<u16>,
    #[serde(default)]
    pub color: Color,
}

impl MeshAttachment {
    /// Number of floats needed for the world-space `x, y` pairs.
    pub fn world_vertices_length(&self) -> usize {
        self.vertices.vertex_count() * 2
    }
}

/// A polygon masking every slot drawn after it until `end_slot` is reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClippingAttachment {
    pub name: String,
    /// Last slot (inclusive) affected by the clip; `None` clips to the end
    #[serde(default)]
    pub end_slot: Option<String>,
    pub vertices: VertexData,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad(width: f32, height: f32) -> RegionAttachment {
        RegionAttachment {
            name: "quad".into(),
            path: None,
            region: None,
            x: 0.0,
            y: 0.0,
            rotation: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            width,
            height,
            uvs: full_quad_uvs(),
            color: Color::WHITE,
        }
    }

    #[test]
    fn test_region_corner_order() {
        let corners = quad(4.0, 2.0).local_corners();
        assert_eq!(corners[0], Vec2::new(-2.0, -1.0));
        assert_eq!(corners[1], Vec2::new(-2.0, 1.0));
        assert_eq!(corners[2], Vec2::new(2.0, 1.0));
        assert_eq!(corners[3], Vec2::new(2.0, -1.0));
    }

    #[test]
    fn test_region_world_vertices_follow_bone() {
        let mut out = Vec::new();
        let bone = Affine2::from_translation(Vec2::new(10.0, 5.0));
        quad(2.0, 2.0).compute_world_vertices(&bone, &mut out);
        assert_eq!(out.len(), 4);
        assert_eq!(out[0], Vec2::new(9.0, 4.0));
        assert_eq!(out[2], Vec2::new(11.0, 6.0));
    }

    #[test]
    fn test_region_rotation() {
        let mut region = quad(2.0, 2.0);
        region.rotation = 90.0;
        let corners = region.local_corners();
        // (-1,-1) rotated by 90 degrees lands on (1,-1)
        assert!((corners[0] - Vec2::new(1.0, -1.0)).length() < 1e-5);
    }

    #[test]
    fn test_world_vertices_length() {
        let mesh = MeshAttachment {
            name: "m".into(),
            path: None,
            region: None,
            vertices: VertexData::Local(vec![Vec2::ZERO; 5]),
            uvs: vec![Vec2::ZERO; 5],
            triangles: vec![0, 1, 2],
            color: Color::WHITE,
        };
        assert_eq!(mesh.world_vertices_length(), 10);
    }
}
