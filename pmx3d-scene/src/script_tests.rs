use crate::{SceneOptions, scene_script};
use pmx3d::{
    Bdef1, Bdef2, Bone, Connection, ExtraUvRange, ExtraUvStore, Material, Model, ModelInfo, Toon,
    Vertex, Weight,
};

fn vertex(weight: Weight) -> Vertex {
    Vertex {
        position: [0.0; 3],
        normal: [0.0, 1.0, 0.0],
        uv: [0.0; 2],
        extra_uv: ExtraUvRange::default(),
        weight,
        edge_scale: 1.0,
    }
}

fn bone(name: &str, parent: Option<usize>) -> Bone {
    Bone {
        name: name.to_string(),
        name_global: name.to_string(),
        position: [0.0; 3],
        parent,
        transform_level: 0,
        flags: 0,
        connection: Connection::Offset([0.0; 3]),
        inherit: None,
        fixed_axis: None,
        local_axes: None,
        external_parent_key: None,
        ik: None,
    }
}

fn material(name: &str, texture: Option<usize>, face_count: i32) -> Material {
    Material {
        name: name.to_string(),
        name_global: name.to_string(),
        diffuse: [1.0; 4],
        specular: [0.0; 3],
        specular_strength: 1.0,
        ambient: [0.5; 3],
        draw_mode: 0,
        edge_color: [0.0, 0.0, 0.0, 1.0],
        edge_size: 1.0,
        texture,
        environment: None,
        environment_mode: 0,
        toon: Toon::Inbuilt(0),
        memo: String::new(),
        face_count,
    }
}

fn sample_model() -> Model {
    Model {
        version: 2.0,
        info: ModelInfo {
            name: "sample".into(),
            name_global: "sample".into(),
            comment: String::new(),
            comment_global: String::new(),
        },
        vertices: vec![
            vertex(Weight::Bdef1(Bdef1 { bone: Some(0) })),
            vertex(Weight::Bdef2(Bdef2 {
                bones: [Some(0), Some(1)],
                weight1: 0.25,
            })),
            vertex(Weight::Bdef1(Bdef1 { bone: Some(1) })),
        ],
        extra_uv_store: ExtraUvStore::default(),
        faces: vec![0, 1, 2],
        textures: vec!["body.png".into(), "face.png".into()],
        materials: vec![
            material("skin", Some(1), 3),
            material("cloth", Some(0), 0),
            material("hair", Some(1), 6),
        ],
        bones: vec![bone("root", None), bone("arm", Some(0))],
    }
}

fn script() -> String {
    let options = SceneOptions {
        object_name: "miku".into(),
        ..SceneOptions::default()
    };
    scene_script(&sample_model(), &options)
}

#[test]
fn declares_object_and_mesh() {
    let js = script();
    assert!(js.contains("const miku = GameObject.instantiate();"));
    assert!(js.contains("const mikuMesh = miku.renderer.mesh = new Mesh();"));
    assert!(js.contains("GameEngine.setResolution(480, 270);"));
}

#[test]
fn triangle_indices_are_doubled() {
    let js = script();
    assert!(js.contains("\t0, 1, 2, 0, 1, 2,\n"));
}

#[test]
fn bone_dictionary_and_hierarchy() {
    let js = script();
    assert!(js.contains("\t\"root\" : new Bone(new Vector3(0,0,0)),"));
    assert!(js.contains("\tmikuMesh.bones[\"arm\"].parent = mikuMesh.bones[\"root\"]"));
    // Root bones get no parent assignment.
    assert!(!js.contains("bones[\"root\"].parent"));
}

#[test]
fn weights_resolve_bone_names() {
    let js = script();
    assert!(js.contains("new Weight([\"root\"], [1])"));
    assert!(js.contains("new Weight([\"root\", \"arm\"], [0.25, 0.75])"));
}

#[test]
fn material_triangle_counts_skip_empty_materials() {
    let js = script();
    assert!(js.contains("mikuMat0.triangleCount = 1;"));
    assert!(!js.contains("mikuMat1.triangleCount"));
    assert!(js.contains("mikuMat2.triangleCount = 2;"));
    assert!(js.contains("miku.renderer.materials = [mikuMat0, mikuMat1, mikuMat2];"));
}

#[test]
fn textures_load_deduplicated_in_first_use_order() {
    let js = script();
    assert!(js.contains("let mikuTex0 = null;"));
    assert!(js.contains("let mikuTex1 = null;"));
    // Material 0 references texture 1 first, so face.png claims slot 0.
    assert!(js.contains("mikuTex0 = new Texture(\"./resource/face.png\", ()=>{"));
    assert!(js.contains("\tmikuTex1 = new Texture(\"./resource/body.png\", ()=>{"));
    assert!(js.contains("\t\tmikuMat0.mainTex = mikuTex0;"));
    assert!(js.contains("\t\tmikuMat1.mainTex = mikuTex1;"));
    assert!(js.contains("\t\tmikuMat2.mainTex = mikuTex0;"));
    // The engine starts from the innermost callback, after every texture.
    assert!(js.contains("\t\tGameEngine.initialize();"));
}

#[test]
fn model_without_textures_still_initializes() {
    let mut model = sample_model();
    model.textures.clear();
    for material in &mut model.materials {
        material.texture = None;
    }
    let js = scene_script(&model, &SceneOptions::default());
    assert!(js.contains("GameEngine.initialize();"));
    assert!(!js.contains("new Texture("));
}

#[test]
fn object_name_is_coerced_to_an_identifier() {
    let options = SceneOptions {
        object_name: "my model!".into(),
        ..SceneOptions::default()
    };
    let js = scene_script(&sample_model(), &options);
    assert!(js.contains("const my_model_ = GameObject.instantiate();"));
}
