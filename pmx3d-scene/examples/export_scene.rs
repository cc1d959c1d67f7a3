use pmx3d::Model;
use pmx3d_scene::{SceneOptions, scene_script};
use std::path::PathBuf;

fn main() {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let mut positional = Vec::<String>::new();
    let mut object_name: Option<String> = None;

    let mut i = 0usize;
    while i < args.len() {
        match args[i].as_str() {
            "--name" => {
                object_name = args.get(i + 1).cloned();
                i += 2;
            }
            other => {
                positional.push(other.to_string());
                i += 1;
            }
        }
    }

    let input = positional
        .first()
        .map(PathBuf::from)
        .expect("usage: export_scene <model.pmx> [scene.js] [--name objectName]");
    let output = positional.get(1).map(PathBuf::from);

    let bytes = std::fs::read(&input).expect("read pmx");
    let model = Model::from_pmx_bytes(&bytes).expect("decode pmx");

    let mut options = SceneOptions::default();
    if let Some(name) = object_name {
        options.object_name = name;
    }

    let js = scene_script(&model, &options);
    match output {
        Some(path) => std::fs::write(&path, js).expect("write scene script"),
        None => print!("{js}"),
    }
}
