// Compiles the GLSL shaders to SPIR-V with glslc from the Vulkan SDK.
// Missing SDK only warns; the viewer then needs prebuilt shaders/spv.

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

const SHADER_EXTENSIONS: &[&str] = &["vert", "frag", "comp", "geom", "tesc", "tese"];

fn compile_dir(source_dir: &Path, include_dir: &Path, out_dir: &Path, glslc: &str) -> u32 {
    let entries = match std::fs::read_dir(source_dir) {
        Ok(entries) => entries,
        Err(_) => {
            eprintln!("info: no shader directory at {source_dir:?}");
            return 0;
        }
    };

    let mut compiled = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        if !SHADER_EXTENSIONS.contains(&ext) {
            continue;
        }
        let Some(name) = path.file_name() else {
            continue;
        };
        let out_file = out_dir.join(name).with_extension(format!("{ext}.spv"));

        let up_to_date = match (std::fs::metadata(&path), std::fs::metadata(&out_file)) {
            (Ok(src), Ok(dst)) => match (src.modified(), dst.modified()) {
                (Ok(src), Ok(dst)) => src <= dst,
                _ => false,
            },
            _ => false,
        };
        if up_to_date {
            continue;
        }

        let status = Command::new(glslc)
            .arg("-I")
            .arg(include_dir)
            .arg(&path)
            .arg("-o")
            .arg(&out_file)
            .status();
        match status {
            Ok(s) if s.success() => {
                eprintln!("info: compiled {name:?}");
                compiled += 1;
            }
            Ok(s) => {
                eprintln!("error: glslc failed for {path:?} with exit code {:?}", s.code());
                panic!("shader compilation failed");
            }
            Err(e) => {
                eprintln!("error: failed to run glslc for {path:?}: {e}");
                panic!("failed to execute shader compiler");
            }
        }
    }
    compiled
}

fn main() {
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let shader_root = manifest_dir.join("../shaders");
    let source_dir = shader_root.join("src");
    let include_dir = source_dir.join("include");
    let out_dir = shader_root.join("spv");

    println!("cargo:rerun-if-changed=../shaders/src");
    println!("cargo:rerun-if-env-changed=VULKAN_SDK");

    if env::var("SKIP_SHADERS").is_ok() {
        eprintln!("info: skipping shader compilation (SKIP_SHADERS set)");
        return;
    }

    let Ok(sdk) = env::var("VULKAN_SDK") else {
        eprintln!("warning: VULKAN_SDK not set, shader compilation skipped");
        return;
    };
    let glslc = if cfg!(target_os = "windows") {
        format!("{sdk}\\Bin\\glslc.exe")
    } else {
        format!("{sdk}/bin/glslc")
    };
    if !Path::new(&glslc).exists() {
        eprintln!("warning: glslc not found at {glslc}, shader compilation skipped");
        return;
    }

    if let Err(e) = std::fs::create_dir_all(&out_dir) {
        eprintln!("warning: cannot create {out_dir:?}: {e}");
        return;
    }

    let compiled = compile_dir(&source_dir, &include_dir, &out_dir, &glslc);
    if compiled > 0 {
        eprintln!("info: compiled {compiled} shader(s)");
    }
}
