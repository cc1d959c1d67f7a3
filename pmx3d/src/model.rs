use crate::Error;

/// Bit assignments of the 16-bit bone flag word.
///
/// The flag word fully determines which optional fields follow a bone's
/// fixed prefix in the stream; [`Bone`] keeps the raw word alongside the
/// decoded fields.
pub mod bone_flag {
    /// Tail carries a connection-target bone index instead of an offset vector.
    pub const CONNECTION: u16 = 1 << 0;
    pub const ROTATABLE: u16 = 1 << 1;
    pub const MOVABLE: u16 = 1 << 2;
    pub const DISPLAY: u16 = 1 << 3;
    pub const CAN_OPERATE: u16 = 1 << 4;
    /// Tail carries an IK block (target, iterations, limit angle, links).
    pub const INV_KINEMATICS: u16 = 1 << 5;
    pub const ADD_LOCAL_DEFORM: u16 = 1 << 7;
    /// Tail carries an inherit parent index + rate (shared with `ADD_MOVEMENT`).
    pub const ADD_ROTATION: u16 = 1 << 8;
    pub const ADD_MOVEMENT: u16 = 1 << 9;
    /// Tail carries a fixed-axis vector.
    pub const FIXED_AXIS: u16 = 1 << 10;
    /// Tail carries local X and Z axis vectors.
    pub const LOCAL_AXIS: u16 = 1 << 11;
    pub const PHYSICAL_TRANSFORM: u16 = 1 << 12;
    /// Tail carries an external-parent key.
    pub const EXTERNAL_PARENT: u16 = 1 << 13;
}

/// Bit assignments of the material drawing-mode flags byte.
pub mod draw_mode {
    pub const BOTH_FACES: u8 = 1 << 0;
    pub const GROUND_SHADOW: u8 = 1 << 1;
    pub const SELF_SHADOW_MAP: u8 = 1 << 2;
    pub const SELF_SHADOW: u8 = 1 << 3;
    pub const EDGE: u8 = 1 << 4;
}

/// The four model-info strings that open a PMX file.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ModelInfo {
    pub name: String,
    pub name_global: String,
    pub comment: String,
    pub comment_global: String,
}

/// View into the shared extra-UV arena held by a [`Vertex`].
///
/// A (start, length) pair rather than a slice, so the arena can be owned by
/// the model without self-references.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ExtraUvRange {
    pub(crate) start: usize,
    pub(crate) len: usize,
}

impl ExtraUvRange {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Contiguous backing store for every vertex's extra-UV quadruples.
///
/// Allocated once per vertex list, filled append-only in vertex decode order.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ExtraUvStore {
    channels: usize,
    data: Vec<[f32; 4]>,
}

impl ExtraUvStore {
    pub(crate) fn with_capacity(channels: usize, vertex_count: usize) -> Self {
        Self {
            channels,
            data: Vec::with_capacity(channels * vertex_count),
        }
    }

    pub(crate) fn push(&mut self, quad: [f32; 4]) {
        self.data.push(quad);
    }

    pub(crate) fn len(&self) -> usize {
        self.data.len()
    }

    /// Extra-UV channel count per vertex (0..=4, fixed for the whole file).
    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn get(&self, range: ExtraUvRange) -> &[[f32; 4]] {
        &self.data[range.start..range.start + range.len]
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Bdef1 {
    pub bone: Option<usize>,
}

#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Bdef2 {
    pub bones: [Option<usize>; 2],
    pub weight1: f32,
}

impl Bdef2 {
    /// The second weight is not stored in the file; it is always `1 - weight1`.
    pub fn weight2(&self) -> f32 {
        1.0 - self.weight1
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Bdef4 {
    pub bones: [Option<usize>; 4],
    /// Stored verbatim; the format does not require the four to sum to 1.
    pub weights: [f32; 4],
}

#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Sdef {
    pub bones: [Option<usize>; 2],
    pub weight1: f32,
    pub c: [f32; 3],
    pub r0: [f32; 3],
    pub r1: [f32; 3],
}

impl Sdef {
    pub fn weight2(&self) -> f32 {
        1.0 - self.weight1
    }
}

/// Skinning weight of one vertex, one of the format's four layouts.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Weight {
    Bdef1(Bdef1),
    Bdef2(Bdef2),
    Bdef4(Bdef4),
    Sdef(Sdef),
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    /// Resolve through [`Model::extra_uvs`] or [`ExtraUvStore::get`].
    pub extra_uv: ExtraUvRange,
    pub weight: Weight,
    pub edge_scale: f32,
}

/// A material's secondary toon shading lookup.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Toon {
    /// Reference into the texture list (`None` = no toon texture).
    Texture(Option<usize>),
    /// Selector into the runtime's inbuilt toon palette.
    Inbuilt(u8),
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Material {
    pub name: String,
    pub name_global: String,
    pub diffuse: [f32; 4],
    pub specular: [f32; 3],
    pub specular_strength: f32,
    pub ambient: [f32; 3],
    /// Raw drawing-mode flags byte; see [`draw_mode`].
    pub draw_mode: u8,
    pub edge_color: [f32; 4],
    pub edge_size: f32,
    pub texture: Option<usize>,
    pub environment: Option<usize>,
    pub environment_mode: u8,
    pub toon: Toon,
    pub memo: String,
    /// Face-list entries this material covers (3x its triangle count),
    /// contiguous from the running face cursor. Not re-validated.
    pub face_count: i32,
}

impl Material {
    pub fn draws_both_faces(&self) -> bool {
        self.draw_mode & draw_mode::BOTH_FACES != 0
    }

    pub fn casts_ground_shadow(&self) -> bool {
        self.draw_mode & draw_mode::GROUND_SHADOW != 0
    }

    pub fn casts_self_shadow(&self) -> bool {
        self.draw_mode & draw_mode::SELF_SHADOW != 0
    }

    pub fn receives_self_shadow(&self) -> bool {
        self.draw_mode & draw_mode::SELF_SHADOW_MAP != 0
    }

    pub fn has_edge(&self) -> bool {
        self.draw_mode & draw_mode::EDGE != 0
    }
}

/// Where a bone's display connection points: either another bone or an
/// explicit offset from the bone's own position. Selected by the
/// `CONNECTION` flag bit, mutually exclusive.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Connection {
    Bone(Option<usize>),
    Offset([f32; 3]),
}

/// Additional-transform source, present when `ADD_ROTATION` or
/// `ADD_MOVEMENT` is set.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Inherit {
    pub parent: Option<usize>,
    pub rate: f32,
}

#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct LocalAxes {
    pub x: [f32; 3],
    pub z: [f32; 3],
}

#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct AngleLimit {
    pub lower: [f32; 3],
    pub upper: [f32; 3],
}

/// One bone of an inverse-kinematics chain.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct IkLink {
    pub bone: Option<usize>,
    pub limit: Option<AngleLimit>,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Ik {
    pub target: Option<usize>,
    pub iterations: i32,
    pub limit_angle: f32,
    pub links: Vec<IkLink>,
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Bone {
    pub name: String,
    pub name_global: String,
    pub position: [f32; 3],
    /// `None` = root bone (stored as -1).
    pub parent: Option<usize>,
    pub transform_level: i32,
    /// Raw 16-bit flag word; see [`bone_flag`]. The decoded optional fields
    /// below are exactly the ones the word declares present.
    pub flags: u16,
    pub connection: Connection,
    pub inherit: Option<Inherit>,
    pub fixed_axis: Option<[f32; 3]>,
    pub local_axes: Option<LocalAxes>,
    pub external_parent_key: Option<i32>,
    pub ik: Option<Ik>,
}

impl Bone {
    pub fn is_rotatable(&self) -> bool {
        self.flags & bone_flag::ROTATABLE != 0
    }

    pub fn is_movable(&self) -> bool {
        self.flags & bone_flag::MOVABLE != 0
    }

    pub fn is_visible(&self) -> bool {
        self.flags & bone_flag::DISPLAY != 0
    }

    pub fn is_operable(&self) -> bool {
        self.flags & bone_flag::CAN_OPERATE != 0
    }

    pub fn inherits_rotation(&self) -> bool {
        self.flags & bone_flag::ADD_ROTATION != 0
    }

    pub fn inherits_translation(&self) -> bool {
        self.flags & bone_flag::ADD_MOVEMENT != 0
    }

    pub fn inherit_is_local(&self) -> bool {
        self.flags & bone_flag::ADD_LOCAL_DEFORM != 0
    }

    pub fn transforms_after_physics(&self) -> bool {
        self.flags & bone_flag::PHYSICAL_TRANSFORM != 0
    }
}

/// A fully decoded PMX model.
///
/// Lists own their records; record identity is the decode-order index, and
/// every cross-list reference (material -> texture, bone -> bone, weight ->
/// bone) is such an index, never validated for in-range-ness.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Model {
    pub version: f32,
    pub info: ModelInfo,
    pub vertices: Vec<Vertex>,
    pub extra_uv_store: ExtraUvStore,
    /// Vertex indices; every 3 consecutive entries form one triangle.
    pub faces: Vec<u32>,
    /// Texture file paths.
    pub textures: Vec<String>,
    pub materials: Vec<Material>,
    pub bones: Vec<Bone>,
}

impl Model {
    /// Decode a complete model from PMX bytes.
    ///
    /// Decoding is one forward pass over the slice; reaching its end before
    /// the bone list completes fails the whole decode (no partial model).
    pub fn from_pmx_bytes(bytes: &[u8]) -> Result<Self, Error> {
        crate::binary::decode(bytes)
    }

    /// Extra-UV quadruples of one vertex (empty when the file declares no
    /// extra UV channels).
    pub fn extra_uvs(&self, vertex: &Vertex) -> &[[f32; 4]] {
        self.extra_uv_store.get(vertex.extra_uv)
    }

    /// Triangles of the face list, three vertex indices each. The trailing
    /// 0..2 entries of a non-multiple-of-3 list are not yielded.
    pub fn triangles(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        self.faces.chunks_exact(3).map(|c| [c[0], c[1], c[2]])
    }
}
