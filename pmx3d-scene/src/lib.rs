//! Scene-script emitter for decoded PMX models.
//!
//! Renders a [`pmx3d::Model`] into the JavaScript scene that the companion
//! JS engine (`GameEngine.js` / `Renderer.js`) loads directly: mesh arrays,
//! material table, bone dictionary with hierarchy, per-face-corner skinning
//! weights and the texture loading chain. The emitter consumes the model as
//! a read-only tree and performs no decoding or validation of its own; it is
//! meant to run on a fully successful decode.

#![forbid(unsafe_code)]

use log::debug;
use pmx3d::{Model, Weight};
use std::fmt::{self, Write};

/// Knobs of the emitted scene.
#[derive(Clone, Debug)]
pub struct SceneOptions {
    /// JS identifier of the game object; mesh/material/texture variables are
    /// derived from it (`<name>Mesh`, `<name>Mat<i>`, `<name>Tex<i>`).
    pub object_name: String,
    pub resolution: (u32, u32),
    /// Prefix of texture paths in the emitted `new Texture(...)` calls.
    pub resource_dir: String,
    /// Initial object position.
    pub position: [f32; 3],
}

impl Default for SceneOptions {
    fn default() -> Self {
        Self {
            object_name: "model".to_string(),
            resolution: (480, 270),
            resource_dir: "./resource/".to_string(),
            position: [0.0, 0.0, 8.0],
        }
    }
}

/// Emit the whole scene script into a string.
pub fn scene_script(model: &Model, options: &SceneOptions) -> String {
    let mut out = String::new();
    write_scene(&mut out, model, options).expect("writing to a String does not fail");
    out
}

/// Emit the whole scene script into `out`.
pub fn write_scene<W: Write>(out: &mut W, model: &Model, options: &SceneOptions) -> fmt::Result {
    let obj = identifier(&options.object_name);
    let mesh = format!("{obj}Mesh");
    let mat = format!("{obj}Mat");
    let tex = format!("{obj}Tex");
    debug!(
        "scene script for {:?}: {} vertices, {} materials, {} bones",
        model.info.name,
        model.vertices.len(),
        model.materials.len(),
        model.bones.len()
    );

    write_prelude(out, options)?;

    writeln!(out, "const {obj} = GameObject.instantiate();")?;
    writeln!(out, "const {mesh} = {obj}.renderer.mesh = new Mesh();")?;
    writeln!(out)?;

    write_mesh_arrays(out, model, &mesh)?;
    write_materials(out, model, &obj, &mat)?;

    let (order, slot_of) = texture_slots(model);
    for i in 0..order.len() {
        writeln!(out, "let {tex}{i} = null;")?;
    }
    writeln!(out)?;

    write_bones(out, model, &mesh)?;
    write_weights(out, model, &mesh)?;

    writeln!(out, "{mesh}.collider = new BoxCollider({mesh});")?;
    writeln!(out, "{mesh}.boneVisible = false;")?;
    writeln!(out, "{obj}.renderer.wireFrameMode = false;")?;
    writeln!(out)?;
    writeln!(out, "let rotation = Vector3.zero;")?;
    let [px, py, pz] = options.position;
    writeln!(
        out,
        "let position = {obj}.transform.position = new Vector3({px},{py},{pz});"
    )?;
    writeln!(out)?;

    write_update_function(out, &obj, &mesh)?;
    write_texture_chain(out, model, options, &mat, &tex, &order, &slot_of)
}

/// Engine imports and canvas setup.
fn write_prelude<W: Write>(out: &mut W, options: &SceneOptions) -> fmt::Result {
    out.write_str(
        "import {GameEngine, Transform, Camera, GameObject, CircleCollider, BoxCollider, KeyCode, Bone} from \"./GameEngine.js\";\n\
         import {Vector2, Vector3, Vector4} from \"./MyMath.js\";\n\
         import * as MyMath from \"./MyMath.js\";\n\
         import {Renderer, Texture, Mesh, Weight, Color, Material} from \"./Renderer.js\";\n\n",
    )?;
    out.write_str("GameEngine.canvas = document.getElementById(\"canvas\");\n")?;
    let (w, h) = options.resolution;
    writeln!(out, "GameEngine.setResolution({w}, {h});")?;
    out.write_str("Camera.mainCamera.screenSize = GameEngine.getResolution();\n\n")
}

fn write_mesh_arrays<W: Write>(out: &mut W, model: &Model, mesh: &str) -> fmt::Result {
    writeln!(out, "{mesh}.vertices = [")?;
    for vertex in &model.vertices {
        let [x, y, z] = vertex.position;
        writeln!(out, "\tnew Vector3({x},{y},{z}),")?;
    }
    writeln!(out, "];")?;

    // Each triangle's corners are listed twice; the runtime draws the
    // doubled run as front and back faces.
    writeln!(out, "{mesh}.indices = [")?;
    for [a, b, c] in model.triangles() {
        writeln!(out, "\t{a}, {b}, {c}, {a}, {b}, {c},")?;
    }
    writeln!(out, "];")?;

    writeln!(out, "{mesh}.uvs = [")?;
    for vertex in &model.vertices {
        let [u, v] = vertex.uv;
        writeln!(out, "\tnew Vector2({u},{v}),")?;
    }
    out.write_str("];\n\n")
}

fn write_materials<W: Write>(out: &mut W, model: &Model, obj: &str, mat: &str) -> fmt::Result {
    for i in 0..model.materials.len() {
        writeln!(out, "const {mat}{i} = new Material();")?;
    }
    writeln!(out)?;

    for (i, material) in model.materials.iter().enumerate() {
        if material.face_count > 0 {
            writeln!(out, "{mat}{i}.triangleCount = {};", material.face_count / 3)?;
        }
    }
    writeln!(out)?;

    write!(out, "{obj}.renderer.materials = [")?;
    for i in 0..model.materials.len() {
        if i > 0 {
            out.write_str(", ")?;
        }
        write!(out, "{mat}{i}")?;
    }
    out.write_str("];\n\n")
}

fn write_bones<W: Write>(out: &mut W, model: &Model, mesh: &str) -> fmt::Result {
    writeln!(out, "{mesh}.bones = {{")?;
    for bone in &model.bones {
        let [x, y, z] = bone.position;
        writeln!(
            out,
            "\t\"{}\" : new Bone(new Vector3({x},{y},{z})),",
            js_string(&bone.name_global)
        )?;
    }
    writeln!(out, "}};")?;
    writeln!(out)?;

    writeln!(out, "//#region Bone Hierarchy")?;
    writeln!(out)?;
    for bone in &model.bones {
        // Negative parent marks a root bone; it gets no assignment.
        let Some(parent) = bone.parent.and_then(|p| model.bones.get(p)) else {
            continue;
        };
        writeln!(
            out,
            "\t{mesh}.bones[\"{}\"].parent = {mesh}.bones[\"{}\"]",
            js_string(&bone.name_global),
            js_string(&parent.name_global)
        )?;
    }
    writeln!(out)?;
    out.write_str("//#endregion\n\n")
}

fn write_weights<W: Write>(out: &mut W, model: &Model, mesh: &str) -> fmt::Result {
    writeln!(out, "{mesh}.weights = [")?;
    for corners in model.triangles() {
        out.write_str("\t")?;
        for corner in corners {
            write_corner_weight(out, model, corner)?;
            out.write_str(", ")?;
        }
        writeln!(out)?;
    }
    out.write_str("];\n\n")
}

/// One `new Weight([...names], [...weights])` for a face corner. SDEF is
/// emitted as its two-bone blend; the target runtime has no use for the
/// spherical correction vectors.
fn write_corner_weight<W: Write>(out: &mut W, model: &Model, vertex_index: u32) -> fmt::Result {
    let Some(vertex) = model.vertices.get(vertex_index as usize) else {
        return out.write_str("new Weight([], [])");
    };
    let name = |index| js_string(bone_name(model, index));
    match &vertex.weight {
        Weight::Bdef1(w) => {
            write!(out, "new Weight([\"{}\"], [1])", name(w.bone))
        }
        Weight::Bdef2(w) => write!(
            out,
            "new Weight([\"{}\", \"{}\"], [{}, {}])",
            name(w.bones[0]),
            name(w.bones[1]),
            w.weight1,
            w.weight2()
        ),
        Weight::Bdef4(w) => write!(
            out,
            "new Weight([\"{}\", \"{}\", \"{}\", \"{}\"], [{}, {}, {}, {}])",
            name(w.bones[0]),
            name(w.bones[1]),
            name(w.bones[2]),
            name(w.bones[3]),
            w.weights[0],
            w.weights[1],
            w.weights[2],
            w.weights[3]
        ),
        Weight::Sdef(w) => write!(
            out,
            "new Weight([\"{}\", \"{}\"], [{}, {}])",
            name(w.bones[0]),
            name(w.bones[1]),
            w.weight1,
            w.weight2()
        ),
    }
}

fn write_update_function<W: Write>(out: &mut W, obj: &str, mesh: &str) -> fmt::Result {
    writeln!(out, "// update function example")?;
    writeln!(out, "{obj}.update = ()=>{{")?;
    out.write_str(
        "\tconst deltaTime     = GameEngine.deltaTime;\n\
         \tconst rotSpeed      = deltaTime * 360;\n\
         \tconst moveSpeed     = deltaTime * 40;\n\
         \tlet   rotationDirty = false;\n\
         \tlet   positionDirty = false;\n\n",
    )?;
    writeln!(
        out,
        "\tif(GameEngine.getKeyUp(KeyCode.Alpha1)) {obj}.renderer.wireFrameMode = !{obj}.renderer.wireFrameMode;"
    )?;
    writeln!(
        out,
        "\tif(GameEngine.getKeyUp(KeyCode.Alpha2)) {mesh}.boneVisible = !{mesh}.boneVisible;"
    )?;
    writeln!(out)?;
    out.write_str(
        "\tif (GameEngine.getKey(KeyCode.Left))  { rotation.y += rotSpeed; rotationDirty = true; }\n\
         \tif (GameEngine.getKey(KeyCode.Right)) { rotation.y -= rotSpeed; rotationDirty = true; }\n\
         \tif (GameEngine.getKey(KeyCode.Up))    { rotation.x += rotSpeed; rotationDirty = true; }\n\
         \tif (GameEngine.getKey(KeyCode.Down))  { rotation.x -= rotSpeed; rotationDirty = true; }\n\n",
    )?;
    out.write_str(
        "\tif (GameEngine.getKey(KeyCode.W)) { position.z += moveSpeed; positionDirty = true; }\n\
         \tif (GameEngine.getKey(KeyCode.S)) { position.z -= moveSpeed; positionDirty = true; }\n\
         \tif (GameEngine.getKey(KeyCode.A)) { position.y -= moveSpeed; positionDirty = true; }\n\
         \tif (GameEngine.getKey(KeyCode.D)) { position.y += moveSpeed; positionDirty = true; }\n\n",
    )?;
    writeln!(out, "\tif(positionDirty) {{")?;
    writeln!(out, "\t\t{obj}.transform.position = position;")?;
    writeln!(out, "\t}}")?;
    writeln!(out, "\tif(rotationDirty) {{")?;
    writeln!(out, "\t\t{obj}.transform.localRotation = rotation;")?;
    writeln!(out, "\t}}")?;
    out.write_str(
        "\tGameEngine.drawText(`deltaTime: ${deltaTime}`, 20, 20);\n\
         \tGameEngine.drawText(`position : ${position}`, 20, 30);\n\
         \tGameEngine.drawText(`rotation : ${rotation}`, 20, 40);\n",
    )?;
    writeln!(
        out,
        "\tGameEngine.drawText(`boneVisible : ${{{mesh}.boneVisible}}`, 20, 50);"
    )?;
    writeln!(
        out,
        "\tGameEngine.drawText(`wireFrameMode : ${{{obj}.renderer.wireFrameMode}}`, 20, 60);"
    )?;
    out.write_str("};\n\n")
}

/// Nested texture loading chain. Each texture's `onload` callback loads the
/// next one; the innermost callback wires `mainTex` per material and starts
/// the engine, so initialization waits for every texture.
fn write_texture_chain<W: Write>(
    out: &mut W,
    model: &Model,
    options: &SceneOptions,
    mat: &str,
    tex: &str,
    order: &[usize],
    slot_of: &[Option<usize>],
) -> fmt::Result {
    if order.is_empty() {
        return writeln!(out, "GameEngine.initialize();");
    }

    for (depth, &tex_index) in order.iter().enumerate() {
        writeln!(
            out,
            "{}{tex}{depth} = new Texture(\"{}{}\", ()=>{{",
            "\t".repeat(depth),
            options.resource_dir,
            js_string(&model.textures[tex_index])
        )?;
    }

    let tab = "\t".repeat(order.len());
    for (i, material) in model.materials.iter().enumerate() {
        let slot = material
            .texture
            .and_then(|t| slot_of.get(t).copied().flatten());
        if let Some(slot) = slot {
            writeln!(out, "{tab}{mat}{i}.mainTex = {tex}{slot};")?;
        }
    }
    writeln!(out, "{tab}GameEngine.initialize();")?;

    for depth in (0..order.len()).rev() {
        writeln!(out, "{}}});", "\t".repeat(depth))?;
    }
    Ok(())
}

/// Deduplicated textures in first-use order over the material list, plus the
/// texture-index -> compact-slot mapping. Textures no material references
/// are not loaded.
fn texture_slots(model: &Model) -> (Vec<usize>, Vec<Option<usize>>) {
    let mut slot_of = vec![None; model.textures.len()];
    let mut order = Vec::new();
    for material in &model.materials {
        let Some(t) = material.texture else {
            continue;
        };
        if let Some(slot) = slot_of.get_mut(t) {
            if slot.is_none() {
                *slot = Some(order.len());
                order.push(t);
            }
        }
    }
    (order, slot_of)
}

/// Global name of a referenced bone, or empty when the reference is none or
/// out of range — the emitter never validates the model.
fn bone_name(model: &Model, index: Option<usize>) -> &str {
    index
        .and_then(|i| model.bones.get(i))
        .map(|b| b.name_global.as_str())
        .unwrap_or("")
}

/// Minimal JS string-literal escaping for names and paths.
fn js_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Coerce an arbitrary model name into a JS identifier.
fn identifier(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            out.push(c);
        } else {
            out.push('_');
        }
    }
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

#[cfg(test)]
mod script_tests;
