//! PMX binary model decoder.
//!
//! The decoder is IO-free: it operates on an in-memory byte slice in one
//! forward-only pass, no backtracking. Stages run in a fixed order (header,
//! info, index widths, model info, vertices, faces, textures, materials,
//! bones); the early stages populate the [`DecodeContext`] every later stage
//! reads — string encoding before any string field, index widths before any
//! index field. A short read or an out-of-domain selector anywhere aborts the
//! whole decode.

use crate::encoding::utf16_units_to_utf8;
use crate::model::{
    AngleLimit, Bdef1, Bdef2, Bdef4, Bone, Connection, ExtraUvRange, ExtraUvStore, Ik, IkLink,
    Inherit, LocalAxes, Material, Model, ModelInfo, Sdef, Toon, Vertex, Weight, bone_flag,
};
use crate::version::PMX_MAGIC;
use crate::{Error, Stage};
use byteorder::{ByteOrder, LittleEndian};
use log::{debug, trace, warn};
use std::fmt;

const WEIGHT_BDEF1: u8 = 0;
const WEIGHT_BDEF2: u8 = 1;
const WEIGHT_BDEF4: u8 = 2;
const WEIGHT_SDEF: u8 = 3;

const TOON_TEXTURE: u8 = 0;
const TOON_INBUILT: u8 = 1;

/// String encoding of every length-prefixed string field in the file,
/// declared once in the info stage.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Encoding {
    Utf16,
    Utf8,
}

/// Index categories, in the order their widths appear in the stream.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum IndexKind {
    Vertex,
    Texture,
    Material,
    Bone,
    Morph,
    Rigid,
}

impl IndexKind {
    /// File order of the index-width table.
    pub const ALL: [Self; 6] = [
        Self::Vertex,
        Self::Texture,
        Self::Material,
        Self::Bone,
        Self::Morph,
        Self::Rigid,
    ];
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Vertex => "vertex",
            Self::Texture => "texture",
            Self::Material => "material",
            Self::Bone => "bone",
            Self::Morph => "morph",
            Self::Rigid => "rigid",
        };
        f.write_str(name)
    }
}

/// Byte width of one index category. Only 1, 2 and 4 are representable;
/// the width table is validated when it is read.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum IndexWidth {
    One,
    Two,
    Four,
}

impl IndexWidth {
    pub fn bytes(self) -> usize {
        match self {
            Self::One => 1,
            Self::Two => 2,
            Self::Four => 4,
        }
    }

    fn from_byte(value: u8, kind: IndexKind, offset: usize) -> Result<Self, Error> {
        match value {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            4 => Ok(Self::Four),
            _ => Err(Error::InvalidIndexWidth {
                kind,
                value,
                offset,
            }),
        }
    }
}

/// Per-category index widths, one entry per [`IndexKind`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct IndexWidths {
    pub vertex: IndexWidth,
    pub texture: IndexWidth,
    pub material: IndexWidth,
    pub bone: IndexWidth,
    pub morph: IndexWidth,
    pub rigid: IndexWidth,
}

impl IndexWidths {
    pub fn get(&self, kind: IndexKind) -> IndexWidth {
        match kind {
            IndexKind::Vertex => self.vertex,
            IndexKind::Texture => self.texture,
            IndexKind::Material => self.material,
            IndexKind::Bone => self.bone,
            IndexKind::Morph => self.morph,
            IndexKind::Rigid => self.rigid,
        }
    }
}

/// Shared decode context, built from the info and index-width stages and
/// immutable afterwards. Passed by reference into every later reader.
#[derive(Copy, Clone, Debug)]
pub struct DecodeContext {
    pub encoding: Encoding,
    pub extra_uv_count: u8,
    pub index_widths: IndexWidths,
}

struct BinaryInput<'a> {
    bytes: &'a [u8],
    cursor: usize,
    stage: Stage,
    /// Placeholder counter for empty string fields, shared by every string
    /// in the session; increments in decode order.
    unnamed_count: u32,
}

impl<'a> BinaryInput<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            cursor: 0,
            stage: Stage::Header,
            unnamed_count: 0,
        }
    }

    fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.cursor)
    }

    fn begin_stage(&mut self, stage: Stage) {
        self.stage = stage;
        trace!("stage {stage} at byte {}", self.cursor);
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], Error> {
        let remaining = self.remaining();
        if remaining < n {
            return Err(Error::Truncated {
                stage: self.stage,
                offset: self.cursor,
                needed: n - remaining,
            });
        }
        let bytes = &self.bytes[self.cursor..self.cursor + n];
        self.cursor += n;
        Ok(bytes)
    }

    fn read_u8(&mut self) -> Result<u8, Error> {
        Ok(self.take(1)?[0])
    }

    fn read_u16(&mut self) -> Result<u16, Error> {
        Ok(LittleEndian::read_u16(self.take(2)?))
    }

    fn read_u32(&mut self) -> Result<u32, Error> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    fn read_i32(&mut self) -> Result<i32, Error> {
        Ok(LittleEndian::read_i32(self.take(4)?))
    }

    fn read_f32(&mut self) -> Result<f32, Error> {
        Ok(LittleEndian::read_f32(self.take(4)?))
    }

    fn read_vec2(&mut self) -> Result<[f32; 2], Error> {
        Ok([self.read_f32()?, self.read_f32()?])
    }

    fn read_vec3(&mut self) -> Result<[f32; 3], Error> {
        Ok([self.read_f32()?, self.read_f32()?, self.read_f32()?])
    }

    fn read_vec4(&mut self) -> Result<[f32; 4], Error> {
        Ok([
            self.read_f32()?,
            self.read_f32()?,
            self.read_f32()?,
            self.read_f32()?,
        ])
    }

    /// Read one index of the given category, sign-extended to `i32`. The
    /// byte width comes from the context's width table; the value is never
    /// range-checked against the sibling list.
    fn read_index(&mut self, ctx: &DecodeContext, kind: IndexKind) -> Result<i32, Error> {
        match ctx.index_widths.get(kind) {
            IndexWidth::One => Ok(i32::from(self.take(1)?[0] as i8)),
            IndexWidth::Two => Ok(i32::from(LittleEndian::read_i16(self.take(2)?))),
            IndexWidth::Four => self.read_i32(),
        }
    }

    /// Nullable index: negative (conventionally -1) maps to `None`.
    fn read_opt_index(
        &mut self,
        ctx: &DecodeContext,
        kind: IndexKind,
    ) -> Result<Option<usize>, Error> {
        let value = self.read_index(ctx, kind)?;
        Ok((value >= 0).then_some(value as usize))
    }

    /// Read one length-prefixed string. An empty length field yields the
    /// `unnamed<N>` placeholder with the session counter post-incremented.
    fn read_string(&mut self, encoding: Encoding) -> Result<String, Error> {
        let offset = self.cursor;
        let length = self.read_u32()?;
        if length == 0 {
            let n = self.unnamed_count;
            self.unnamed_count += 1;
            return Ok(format!("unnamed{n}"));
        }
        if encoding == Encoding::Utf16 && length % 2 != 0 {
            return Err(Error::OddUtf16Length { length, offset });
        }
        let bytes = self.take(length as usize)?;
        let decoded = match encoding {
            Encoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Encoding::Utf16 => {
                let units: Vec<u16> = bytes.chunks_exact(2).map(LittleEndian::read_u16).collect();
                String::from_utf8_lossy(&utf16_units_to_utf8(&units)).into_owned()
            }
        };
        Ok(decoded)
    }
}

fn read_header(input: &mut BinaryInput<'_>) -> Result<f32, Error> {
    let mut magic = [0u8; 4];
    magic.copy_from_slice(input.take(4)?);
    let version = input.read_f32()?;
    if magic != PMX_MAGIC {
        // Accepted as-is; the signature is not load-bearing for decoding.
        warn!("unexpected signature {magic:02x?}");
    }
    debug!("version {version}");
    Ok(version)
}

fn read_info(input: &mut BinaryInput<'_>) -> Result<(Encoding, u8), Error> {
    let record_count = input.read_u8()?;
    debug!("record count marker {record_count}");

    let offset = input.cursor;
    let encoding = match input.read_u8()? {
        0 => Encoding::Utf16,
        1 => Encoding::Utf8,
        value => return Err(Error::InvalidEncoding { value, offset }),
    };

    let offset = input.cursor;
    let extra_uv_count = input.read_u8()?;
    if extra_uv_count > 4 {
        return Err(Error::InvalidExtraUvCount {
            value: extra_uv_count,
            offset,
        });
    }

    debug!("encoding {encoding:?}, extra UV channels {extra_uv_count}");
    Ok((encoding, extra_uv_count))
}

fn read_index_widths(input: &mut BinaryInput<'_>) -> Result<IndexWidths, Error> {
    let mut widths = [IndexWidth::One; 6];
    for (slot, kind) in widths.iter_mut().zip(IndexKind::ALL) {
        let offset = input.cursor;
        *slot = IndexWidth::from_byte(input.read_u8()?, kind, offset)?;
        trace!("{kind} index width: {} byte(s)", slot.bytes());
    }
    let [vertex, texture, material, bone, morph, rigid] = widths;
    Ok(IndexWidths {
        vertex,
        texture,
        material,
        bone,
        morph,
        rigid,
    })
}

fn read_model_info(input: &mut BinaryInput<'_>, ctx: &DecodeContext) -> Result<ModelInfo, Error> {
    let info = ModelInfo {
        name: input.read_string(ctx.encoding)?,
        name_global: input.read_string(ctx.encoding)?,
        comment: input.read_string(ctx.encoding)?,
        comment_global: input.read_string(ctx.encoding)?,
    };
    debug!("model {:?} ({:?})", info.name, info.name_global);
    Ok(info)
}

fn read_weight(input: &mut BinaryInput<'_>, ctx: &DecodeContext) -> Result<Weight, Error> {
    let offset = input.cursor;
    match input.read_u8()? {
        WEIGHT_BDEF1 => Ok(Weight::Bdef1(Bdef1 {
            bone: input.read_opt_index(ctx, IndexKind::Bone)?,
        })),
        WEIGHT_BDEF2 => Ok(Weight::Bdef2(Bdef2 {
            bones: [
                input.read_opt_index(ctx, IndexKind::Bone)?,
                input.read_opt_index(ctx, IndexKind::Bone)?,
            ],
            weight1: input.read_f32()?,
        })),
        WEIGHT_BDEF4 => Ok(Weight::Bdef4(Bdef4 {
            bones: [
                input.read_opt_index(ctx, IndexKind::Bone)?,
                input.read_opt_index(ctx, IndexKind::Bone)?,
                input.read_opt_index(ctx, IndexKind::Bone)?,
                input.read_opt_index(ctx, IndexKind::Bone)?,
            ],
            weights: input.read_vec4()?,
        })),
        WEIGHT_SDEF => Ok(Weight::Sdef(Sdef {
            bones: [
                input.read_opt_index(ctx, IndexKind::Bone)?,
                input.read_opt_index(ctx, IndexKind::Bone)?,
            ],
            weight1: input.read_f32()?,
            c: input.read_vec3()?,
            r0: input.read_vec3()?,
            r1: input.read_vec3()?,
        })),
        value => Err(Error::InvalidWeightKind { value, offset }),
    }
}

fn read_vertices(
    input: &mut BinaryInput<'_>,
    ctx: &DecodeContext,
) -> Result<(Vec<Vertex>, ExtraUvStore), Error> {
    let count = input.read_u32()? as usize;
    debug!("vertex count {count}");

    let channels = ctx.extra_uv_count as usize;
    let mut store = ExtraUvStore::with_capacity(channels, count);
    let mut vertices = Vec::with_capacity(count);
    for _ in 0..count {
        let position = input.read_vec3()?;
        let normal = input.read_vec3()?;
        let uv = input.read_vec2()?;

        let start = store.len();
        for _ in 0..channels {
            store.push(input.read_vec4()?);
        }
        let extra_uv = ExtraUvRange {
            start,
            len: channels,
        };

        let weight = read_weight(input, ctx)?;
        let edge_scale = input.read_f32()?;
        vertices.push(Vertex {
            position,
            normal,
            uv,
            extra_uv,
            weight,
            edge_scale,
        });
    }
    Ok((vertices, store))
}

fn read_faces(input: &mut BinaryInput<'_>, ctx: &DecodeContext) -> Result<Vec<u32>, Error> {
    let count = input.read_u32()? as usize;
    debug!("face count {count}");

    let mut faces = Vec::with_capacity(count);
    for _ in 0..count {
        faces.push(input.read_index(ctx, IndexKind::Vertex)? as u32);
    }
    Ok(faces)
}

fn read_textures(input: &mut BinaryInput<'_>, ctx: &DecodeContext) -> Result<Vec<String>, Error> {
    let count = input.read_u32()? as usize;
    debug!("texture count {count}");

    let mut textures = Vec::with_capacity(count);
    for i in 0..count {
        let path = input.read_string(ctx.encoding)?;
        trace!("texture {i}: {path:?}");
        textures.push(path);
    }
    Ok(textures)
}

fn read_materials(
    input: &mut BinaryInput<'_>,
    ctx: &DecodeContext,
) -> Result<Vec<Material>, Error> {
    let count = input.read_u32()? as usize;
    debug!("material count {count}");

    let mut materials = Vec::with_capacity(count);
    for i in 0..count {
        let name = input.read_string(ctx.encoding)?;
        let name_global = input.read_string(ctx.encoding)?;
        let diffuse = input.read_vec4()?;
        let specular = input.read_vec3()?;
        let specular_strength = input.read_f32()?;
        let ambient = input.read_vec3()?;
        let draw_mode = input.read_u8()?;
        let edge_color = input.read_vec4()?;
        let edge_size = input.read_f32()?;
        let texture = input.read_opt_index(ctx, IndexKind::Texture)?;
        let environment = input.read_opt_index(ctx, IndexKind::Texture)?;
        let environment_mode = input.read_u8()?;

        let offset = input.cursor;
        let toon = match input.read_u8()? {
            TOON_TEXTURE => Toon::Texture(input.read_opt_index(ctx, IndexKind::Texture)?),
            TOON_INBUILT => Toon::Inbuilt(input.read_u8()?),
            value => return Err(Error::InvalidToonKind { value, offset }),
        };

        let memo = input.read_string(ctx.encoding)?;
        let face_count = input.read_i32()?;
        trace!("material {i}: {name:?}, texture {texture:?}, {face_count} face entries");

        materials.push(Material {
            name,
            name_global,
            diffuse,
            specular,
            specular_strength,
            ambient,
            draw_mode,
            edge_color,
            edge_size,
            texture,
            environment,
            environment_mode,
            toon,
            memo,
            face_count,
        });
    }
    Ok(materials)
}

fn read_bone(input: &mut BinaryInput<'_>, ctx: &DecodeContext) -> Result<Bone, Error> {
    let name = input.read_string(ctx.encoding)?;
    let name_global = input.read_string(ctx.encoding)?;
    let position = input.read_vec3()?;
    let parent = input.read_opt_index(ctx, IndexKind::Bone)?;
    let transform_level = input.read_i32()?;
    let flags = input.read_u16()?;

    // Every optional field below is declared by the flag word; nothing else
    // decides presence.
    let connection = if flags & bone_flag::CONNECTION != 0 {
        Connection::Bone(input.read_opt_index(ctx, IndexKind::Bone)?)
    } else {
        Connection::Offset(input.read_vec3()?)
    };

    let inherit = if flags & (bone_flag::ADD_ROTATION | bone_flag::ADD_MOVEMENT) != 0 {
        Some(Inherit {
            parent: input.read_opt_index(ctx, IndexKind::Bone)?,
            rate: input.read_f32()?,
        })
    } else {
        None
    };

    let fixed_axis = if flags & bone_flag::FIXED_AXIS != 0 {
        Some(input.read_vec3()?)
    } else {
        None
    };

    let local_axes = if flags & bone_flag::LOCAL_AXIS != 0 {
        Some(LocalAxes {
            x: input.read_vec3()?,
            z: input.read_vec3()?,
        })
    } else {
        None
    };

    let external_parent_key = if flags & bone_flag::EXTERNAL_PARENT != 0 {
        Some(input.read_i32()?)
    } else {
        None
    };

    let ik = if flags & bone_flag::INV_KINEMATICS != 0 {
        let target = input.read_opt_index(ctx, IndexKind::Bone)?;
        let iterations = input.read_i32()?;
        let limit_angle = input.read_f32()?;
        let link_count = input.read_i32()?.max(0) as usize;
        let mut links = Vec::with_capacity(link_count);
        for _ in 0..link_count {
            let bone = input.read_opt_index(ctx, IndexKind::Bone)?;
            let limit = if input.read_u8()? == 1 {
                Some(AngleLimit {
                    lower: input.read_vec3()?,
                    upper: input.read_vec3()?,
                })
            } else {
                None
            };
            links.push(IkLink { bone, limit });
        }
        Some(Ik {
            target,
            iterations,
            limit_angle,
            links,
        })
    } else {
        None
    };

    Ok(Bone {
        name,
        name_global,
        position,
        parent,
        transform_level,
        flags,
        connection,
        inherit,
        fixed_axis,
        local_axes,
        external_parent_key,
        ik,
    })
}

fn read_bones(input: &mut BinaryInput<'_>, ctx: &DecodeContext) -> Result<Vec<Bone>, Error> {
    let count = input.read_u32()? as usize;
    debug!("bone count {count}");

    let mut bones = Vec::with_capacity(count);
    for i in 0..count {
        let bone = read_bone(input, ctx)?;
        trace!("bone {i}: {:?}, flags {:#06x}", bone.name, bone.flags);
        bones.push(bone);
    }
    Ok(bones)
}

pub(crate) fn decode(bytes: &[u8]) -> Result<Model, Error> {
    let mut input = BinaryInput::new(bytes);

    input.begin_stage(Stage::Header);
    let version = read_header(&mut input)?;

    input.begin_stage(Stage::Info);
    let (encoding, extra_uv_count) = read_info(&mut input)?;

    input.begin_stage(Stage::IndexWidths);
    let index_widths = read_index_widths(&mut input)?;

    let ctx = DecodeContext {
        encoding,
        extra_uv_count,
        index_widths,
    };

    input.begin_stage(Stage::ModelInfo);
    let info = read_model_info(&mut input, &ctx)?;

    input.begin_stage(Stage::Vertices);
    let (vertices, extra_uv_store) = read_vertices(&mut input, &ctx)?;

    input.begin_stage(Stage::Faces);
    let faces = read_faces(&mut input, &ctx)?;

    input.begin_stage(Stage::Textures);
    let textures = read_textures(&mut input, &ctx)?;

    input.begin_stage(Stage::Materials);
    let materials = read_materials(&mut input, &ctx)?;

    input.begin_stage(Stage::Bones);
    let bones = read_bones(&mut input, &ctx)?;

    Ok(Model {
        version,
        info,
        vertices,
        extra_uv_store,
        faces,
        textures,
        materials,
        bones,
    })
}
