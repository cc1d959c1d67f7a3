use pmx3d::{Model, Weight};
use serde_json::json;
use std::path::PathBuf;

fn main() {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let mut positional = Vec::<String>::new();
    let mut full = false;
    for arg in &args {
        match arg.as_str() {
            "--full" => full = true,
            other => positional.push(other.to_string()),
        }
    }

    let path = positional
        .first()
        .map(PathBuf::from)
        .expect("usage: model_dump <model.pmx> [--full]");
    let bytes = std::fs::read(&path).expect("read pmx");
    let model = Model::from_pmx_bytes(&bytes).expect("decode pmx");

    if full {
        println!("{}", serde_json::to_string(&model).expect("json"));
        return;
    }

    let mut weight_kinds = [0usize; 4];
    for vertex in &model.vertices {
        let slot = match vertex.weight {
            Weight::Bdef1(_) => 0,
            Weight::Bdef2(_) => 1,
            Weight::Bdef4(_) => 2,
            Weight::Sdef(_) => 3,
        };
        weight_kinds[slot] += 1;
    }

    let out = json!({
        "version": model.version,
        "name": model.info.name,
        "nameGlobal": model.info.name_global,
        "counts": {
            "vertices": model.vertices.len(),
            "faces": model.faces.len(),
            "triangles": model.faces.len() / 3,
            "textures": model.textures.len(),
            "materials": model.materials.len(),
            "bones": model.bones.len(),
        },
        "weightKinds": {
            "bdef1": weight_kinds[0],
            "bdef2": weight_kinds[1],
            "bdef4": weight_kinds[2],
            "sdef": weight_kinds[3],
        },
        "extraUvChannels": model.extra_uv_store.channels(),
    });
    println!("{}", serde_json::to_string(&out).expect("json"));
}
